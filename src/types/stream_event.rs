use serde::Deserialize;

use crate::types::MessageRole;

/// One decoded `(role, content)` unit from the response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// The normalized role.
    pub role: MessageRole,

    /// The content carried by the event.  Never empty when produced by the decoder.
    pub content: String,
}

impl StreamEvent {
    /// Create a new `StreamEvent`.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create an assistant event.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a user event.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a system event.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// The JSON object carried on a `data:` line.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct StreamEventPayload {
    /// Free-form role name; absent means assistant.
    #[serde(default)]
    pub role: Option<String>,

    /// The content; absent means empty.
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamEventPayload {
    /// Normalize the payload into an event.  Returns `None` when there is no content.
    pub fn into_event(self) -> Option<StreamEvent> {
        let content = self.content.unwrap_or_default();
        if content.is_empty() {
            return None;
        }
        let role = MessageRole::from_wire(self.role.as_deref().unwrap_or_default());
        Some(StreamEvent { role, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_role_defaults_to_assistant() {
        let payload: StreamEventPayload = serde_json::from_str(r#"{"content": "Hi"}"#).unwrap();
        assert_eq!(payload.into_event(), Some(StreamEvent::assistant("Hi")));
    }

    #[test]
    fn null_fields_are_treated_as_absent() {
        let payload: StreamEventPayload =
            serde_json::from_str(r#"{"role": null, "content": "Hi"}"#).unwrap();
        assert_eq!(payload.into_event(), Some(StreamEvent::assistant("Hi")));
    }

    #[test]
    fn empty_content_yields_nothing() {
        let payload: StreamEventPayload =
            serde_json::from_str(r#"{"role": "user", "content": ""}"#).unwrap();
        assert_eq!(payload.into_event(), None);
        assert_eq!(StreamEventPayload::default().into_event(), None);
    }

    #[test]
    fn role_is_lowercased() {
        let payload: StreamEventPayload =
            serde_json::from_str(r#"{"role": "SYSTEM", "content": "notice"}"#).unwrap();
        assert_eq!(payload.into_event(), Some(StreamEvent::system("notice")));
    }
}

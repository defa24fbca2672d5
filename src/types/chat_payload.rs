use serde::{Deserialize, Serialize};

/// Longest message the single-shot chat endpoint accepts, in characters.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 2000;

/// Body of the single-shot `POST /chat` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// The user's message.
    pub message: String,
}

/// Body of the single-shot `POST /chat` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's complete reply.
    pub response: String,
}

/// Body of the `GET /` health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Human-readable status line.
    pub message: String,
}

/// Error body produced by the chat backend for non-success statuses.
///
/// `detail` is a string for handled errors and a list of objects for
/// request validation failures, so it is kept as raw JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    /// Raw `detail` value, if the body had one.
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorDetail {
    /// A readable rendering of `detail`, if there is one.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_string() {
        let detail: ErrorDetail =
            serde_json::from_str(r#"{"detail": "User message cannot be empty"}"#).unwrap();
        assert_eq!(
            detail.message().as_deref(),
            Some("User message cannot be empty")
        );
    }

    #[test]
    fn error_detail_list_is_rendered_as_json() {
        let detail: ErrorDetail =
            serde_json::from_str(r#"{"detail": [{"loc": ["body", "message"]}]}"#).unwrap();
        assert!(detail.message().unwrap().contains("body"));
    }

    #[test]
    fn error_detail_missing() {
        let detail: ErrorDetail = serde_json::from_str("{}").unwrap();
        assert_eq!(detail.message(), None);
    }
}

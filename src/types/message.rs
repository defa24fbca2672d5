use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque identifier for a message in a conversation.
///
/// Identifiers serialize as plain strings.  Generated identifiers combine the
/// millisecond the process first asked for one with a counter, so they are
/// strictly increasing for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier, distinct from every other generated in this process.
    pub fn generate() -> Self {
        static SESSION_START: OnceLock<i128> = OnceLock::new();
        static SEQUENCE: AtomicU64 = AtomicU64::new(0);
        let start = *SESSION_START
            .get_or_init(|| OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000);
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{start}-{seq:06}"))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Who authored a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User role.
    User,

    /// Assistant role.
    Assistant,

    /// System notices.  These never merge with their neighbours.
    System,
}

impl MessageRole {
    /// Map a role string from the wire onto a role.
    ///
    /// Matching is case-insensitive but otherwise exact.  `"user"` and
    /// `"system"` map to their roles; everything else, including the empty
    /// string and padded names such as `" user "`, is the assistant.
    pub fn from_wire(role: &str) -> Self {
        match role.to_lowercase().as_str() {
            "user" => MessageRole::User,
            "system" => MessageRole::System,
            _ => MessageRole::Assistant,
        }
    }

    /// The lowercase wire name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, used by renderers for keying.
    pub id: MessageId,

    /// The text of the message.
    pub content: String,

    /// The role of the message.
    pub role: MessageRole,
}

impl Message {
    /// Create a new `Message` with a freshly generated identifier.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            content: content.into(),
            role,
        }
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant `Message`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a new system `Message`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Copy this message, keeping its identifier and role but replacing its content.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            content: content.into(),
            role: self.role,
        }
    }
}

use serde::Serialize;

use crate::types::Conversation;

/// Body of `POST /chat/stream`: the entire conversation so far.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStreamRequest<'a> {
    /// Every message in order, newest user turn included.
    pub messages: &'a Conversation,
}

impl<'a> ChatStreamRequest<'a> {
    /// Create a request for `conversation`.
    pub fn new(messages: &'a Conversation) -> Self {
        Self { messages }
    }
}

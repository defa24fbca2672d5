use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::types::{Message, MessageRole};

/// An ordered, immutable list of messages.
///
/// Cloning is cheap: the list and its entries are reference counted.  Every
/// change produces a new `Conversation` that shares the untouched entries with
/// the one it was derived from, so renderers can compare snapshots with
/// [`Conversation::ptr_eq`] and skip work when nothing changed.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Arc<Vec<Arc<Message>>>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last message, if any.
    pub fn tail(&self) -> Option<&Message> {
        self.messages.last().map(Arc::as_ref)
    }

    /// The message at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index).map(Arc::as_ref)
    }

    /// Iterate over the messages in order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().map(Arc::as_ref)
    }

    /// The shared entries backing this conversation.
    pub fn entries(&self) -> &[Arc<Message>] {
        &self.messages
    }

    /// True if both conversations are the very same list.
    pub fn ptr_eq(&self, other: &Conversation) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }

    /// True if any message has `role` and exactly `content`.
    pub fn contains(&self, role: MessageRole, content: &str) -> bool {
        self.iter().any(|m| m.role == role && m.content == content)
    }

    /// A new conversation with `message` appended.
    pub fn appended(&self, message: Message) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(Arc::new(message));
        Self {
            messages: Arc::new(messages),
        }
    }

    /// A new conversation with the tail replaced by `message`.
    ///
    /// On an empty conversation this appends.
    pub(crate) fn with_tail_replaced(&self, message: Message) -> Self {
        let keep = self.messages.len().saturating_sub(1);
        let mut messages = Vec::with_capacity(keep + 1);
        messages.extend(self.messages[..keep].iter().cloned());
        messages.push(Arc::new(message));
        Self {
            messages: Arc::new(messages),
        }
    }
}

impl PartialEq for Conversation {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.iter().eq(other.iter())
    }
}

impl Eq for Conversation {}

impl FromIterator<Message> for Conversation {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: Arc::new(iter.into_iter().map(Arc::new).collect()),
        }
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        messages.into_iter().collect()
    }
}

impl Serialize for Conversation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

//! Folding stream events into a conversation.
//!
//! [`reduce`] is the single place where merge policy lives.  It never mutates
//! its input: it returns a new [`Conversation`] that shares every untouched
//! message with the old one, or the old one itself when nothing changes.

use crate::{Conversation, Message, MessageRole, StreamEvent};

/// Apply one event to a conversation.
///
/// - Assistant events carry the whole reply so far.  When the tail is an
///   assistant message its content is replaced outright; otherwise a new
///   assistant message is appended.
/// - User events are echoes of what the client sent.  An identical user tail,
///   or any earlier user message with exactly this content, makes the event a
///   no-op.  A differing user tail has its content replaced.  Anything else is
///   appended.
/// - System events are always appended.
///
/// ```
/// use chatfold::{Conversation, Message, StreamEvent, reduce};
///
/// let start: Conversation = vec![Message::user("Hi")].into();
/// let next = reduce(&start, &StreamEvent::assistant("Hel"));
/// let next = reduce(&next, &StreamEvent::assistant("Hello"));
/// assert_eq!(next.len(), 2);
/// assert_eq!(next.tail().unwrap().content, "Hello");
///
/// // Echoes of what was already sent change nothing.
/// assert!(reduce(&next, &StreamEvent::user("Hi")).ptr_eq(&next));
/// ```
pub fn reduce(conversation: &Conversation, event: &StreamEvent) -> Conversation {
    match event.role {
        MessageRole::Assistant => reduce_assistant(conversation, &event.content),
        MessageRole::User => reduce_user(conversation, &event.content),
        MessageRole::System => conversation.appended(Message::system(event.content.as_str())),
    }
}

/// Apply every event in order, starting from `conversation`.
pub fn reduce_all<'a, I>(conversation: &Conversation, events: I) -> Conversation
where
    I: IntoIterator<Item = &'a StreamEvent>,
{
    events
        .into_iter()
        .fold(conversation.clone(), |acc, event| reduce(&acc, event))
}

fn reduce_assistant(conversation: &Conversation, content: &str) -> Conversation {
    match conversation.tail() {
        Some(tail) if tail.role == MessageRole::Assistant => {
            conversation.with_tail_replaced(tail.with_content(content))
        }
        _ => conversation.appended(Message::assistant(content)),
    }
}

fn reduce_user(conversation: &Conversation, content: &str) -> Conversation {
    match conversation.tail() {
        Some(tail) if tail.role == MessageRole::User => {
            if tail.content == content {
                conversation.clone()
            } else {
                conversation.with_tail_replaced(tail.with_content(content))
            }
        }
        // Linear scan; the same text sent twice in a session is treated as an echo.
        _ if conversation.contains(MessageRole::User, content) => conversation.clone(),
        _ => conversation.appended(Message::user(content)),
    }
}

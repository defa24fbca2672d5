//! Folds a stream of events into successive conversation snapshots.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::reducer::reduce;
use crate::{Conversation, Error, StreamEvent};

/// A stream wrapper that applies each `StreamEvent` to a `Conversation`.
///
/// Every event that changes the conversation yields the new snapshot.  Events
/// that leave it untouched (duplicate user echoes) are consumed silently.
/// Errors pass through unchanged; the conversation keeps whatever state the
/// last applied event left it in, and is available from
/// [`FoldingStream::conversation`] at any point, including after an error or
/// after the caller stops polling.
pub struct FoldingStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>,
    conversation: Conversation,
}

impl FoldingStream {
    /// Fold `stream` into `conversation`.
    pub fn new<S>(stream: S, conversation: Conversation) -> Self
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            conversation,
        }
    }

    /// The conversation as of the last applied event.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Stop folding and return the conversation as of the last applied event.
    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }
}

impl Stream for FoldingStream {
    type Item = Result<Conversation, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    let next = reduce(&self.conversation, &event);
                    if next.ptr_eq(&self.conversation) {
                        tracing::debug!(role = %event.role, "event left the conversation unchanged");
                        continue;
                    }
                    self.conversation = next.clone();
                    return Poll::Ready(Some(Ok(next)));
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream::{self, StreamExt};

    use super::*;
    use crate::{Message, MessageRole};

    #[tokio::test]
    async fn yields_a_snapshot_per_change() {
        let events = vec![
            Ok(StreamEvent::user("Hi")),
            Ok(StreamEvent::assistant("He")),
            Ok(StreamEvent::assistant("Hello")),
        ];
        let start: Conversation = vec![Message::user("Hi")].into();
        let mut folding = FoldingStream::new(stream::iter(events), start);

        let first = folding.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.tail().unwrap().content, "He");

        let second = folding.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second.tail().unwrap().content, "Hello");
        assert_eq!(first.tail().unwrap().content, "He");

        assert!(folding.next().await.is_none());
        assert!(folding.conversation().ptr_eq(&second));
    }

    #[tokio::test]
    async fn errors_leave_the_conversation_in_place() {
        let events = vec![
            Ok(StreamEvent::assistant("partial")),
            Err(Error::streaming("connection reset", None)),
        ];
        let mut folding = FoldingStream::new(stream::iter(events), Conversation::new());
        assert!(folding.next().await.unwrap().is_ok());
        assert!(folding.next().await.unwrap().unwrap_err().is_transport());
        assert!(folding.next().await.is_none());

        let conversation = folding.into_conversation();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.tail().unwrap().role, MessageRole::Assistant);
        assert_eq!(conversation.tail().unwrap().content, "partial");
    }
}

//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! and drives one streaming turn at a time against a [`Transport`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::chat::config::ChatConfig;
use crate::client::{ChatClient, Transport};
use crate::error::{Error, Result};
use crate::folding_stream::FoldingStream;
use crate::observability::{SESSION_TURN_DURATION, SESSION_TURN_FAILURES, SESSION_TURNS};
use crate::render::Renderer;
use crate::sse::decode_events;
use crate::types::{Conversation, Message, MessageRole};

const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A chat session that owns the conversation and talks to the backend.
///
/// Turns take `&mut self`, so a session never has more than one reply
/// streaming into its conversation.
pub struct ChatSession<T: Transport = ChatClient> {
    transport: T,
    config: ChatConfig,
    conversation: Conversation,
    turns: u64,
    failed_turns: u64,
    interrupted_turns: u64,
    snapshots: u64,
}

/// How a turn that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Number of conversation changes applied during the turn.
    pub snapshots: u64,
    /// True when the turn was cut short by the interrupt flag.
    pub interrupted: bool,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Messages written by the user.
    pub user_messages: usize,
    /// Messages written by the assistant.
    pub assistant_messages: usize,
    /// Notices from the backend.
    pub system_messages: usize,
    /// Turns started.
    pub turns: u64,
    /// Turns that ended in an error.
    pub failed_turns: u64,
    /// Turns stopped by the user.
    pub interrupted_turns: u64,
    /// Conversation snapshots applied across all turns.
    pub snapshots: u64,
}

impl ChatSession<ChatClient> {
    /// Creates a new chat session talking HTTP to the configured endpoint.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = ChatClient::with_options(config.endpoint.clone(), Some(config.timeout))?;
        Ok(Self::with_transport(client, config))
    }
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new chat session over a custom transport.
    pub fn with_transport(transport: T, config: ChatConfig) -> Self {
        Self {
            transport,
            config,
            conversation: Conversation::new(),
            turns: 0,
            failed_turns: 0,
            interrupted_turns: 0,
            snapshots: 0,
        }
    }

    /// Sends a user message and streams the reply into the conversation.
    ///
    /// This method:
    /// 1. Appends the user message and renders with `loading == true`
    /// 2. Sends the whole conversation to the backend
    /// 3. Folds every event into the conversation, rendering each change
    /// 4. Renders once more with `loading == false`, whatever the outcome
    ///
    /// Setting `interrupted` stops the turn after the event being applied, or
    /// abandons the request if the response headers have not arrived yet.
    /// Events already applied stay in the conversation in every case.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank input, and the transport error if
    /// the request fails or the body breaks off.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        interrupted: Arc<AtomicBool>,
    ) -> Result<TurnOutcome> {
        if user_input.trim().is_empty() {
            return Err(Error::validation(
                "User message cannot be empty",
                Some("message".to_string()),
            ));
        }

        SESSION_TURNS.click();
        self.turns += 1;
        let start = Instant::now();

        self.conversation = self.conversation.appended(Message::user(user_input));
        renderer.render(&self.conversation, true);

        let result = self.fold_reply(renderer, &interrupted).await;
        renderer.render(&self.conversation, false);
        SESSION_TURN_DURATION.add(start.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                if outcome.interrupted {
                    self.interrupted_turns += 1;
                    tracing::info!(snapshots = outcome.snapshots, "turn interrupted");
                }
            }
            Err(err) => {
                SESSION_TURN_FAILURES.click();
                self.failed_turns += 1;
                tracing::warn!(error = %err, "turn failed");
            }
        }
        result
    }

    async fn fold_reply(
        &mut self,
        renderer: &mut dyn Renderer,
        interrupted: &AtomicBool,
    ) -> Result<TurnOutcome> {
        let mut outcome = TurnOutcome {
            snapshots: 0,
            interrupted: false,
        };
        let body = tokio::select! {
            biased;
            _ = wait_for_interrupt(interrupted) => {
                outcome.interrupted = true;
                return Ok(outcome);
            }
            body = self.transport.open_stream(&self.conversation) => body?,
        };
        let mut folding = FoldingStream::new(decode_events(body), self.conversation.clone());

        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_interrupt(interrupted) => {
                    outcome.interrupted = true;
                    return Ok(outcome);
                }
                next = folding.next() => next,
            };
            match next {
                Some(Ok(snapshot)) => {
                    self.conversation = snapshot;
                    self.snapshots += 1;
                    outcome.snapshots += 1;
                    renderer.render(&self.conversation, true);
                }
                Some(Err(err)) => return Err(err),
                None => return Ok(outcome),
            }
        }
    }

    /// The conversation as of the last applied event.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the transport the session sends through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns aggregated session statistics.
    pub fn stats(&self) -> SessionStats {
        let count = |role: MessageRole| self.conversation.iter().filter(|m| m.role == role).count();
        SessionStats {
            message_count: self.conversation.len(),
            user_messages: count(MessageRole::User),
            assistant_messages: count(MessageRole::Assistant),
            system_messages: count(MessageRole::System),
            turns: self.turns,
            failed_turns: self.failed_turns,
            interrupted_turns: self.interrupted_turns,
            snapshots: self.snapshots,
        }
    }
}

async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::Relaxed) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

//! Interactive chat front end built on the chatfold client library.
//!
//! This module provides a streaming REPL over a [`Conversation`](crate::Conversation).
//! It supports:
//!
//! - Streaming replies folded into the conversation as they arrive
//! - Ctrl-C to stop a reply without losing what was already received
//! - Slash commands for inspecting the session
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and the optional YAML config file
//! - [`session`]: Conversation ownership and one-turn-at-a-time streaming
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ConfigFile};
pub use session::{ChatSession, SessionStats, TurnOutcome};

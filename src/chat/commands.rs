//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the backend.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics (message count, turns, failures).
    Stats,

    /// Print every message in the conversation.
    History,

    /// Show the current configuration.
    ShowConfig,

    /// Ask the backend whether it is up.
    Health,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use chatfold::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/history").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => no_argument(argument, "/help", ChatCommand::Help),
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => no_argument(argument, "/stats", ChatCommand::Stats),
        "history" => no_argument(argument, "/history", ChatCommand::History),
        "config" => no_argument(argument, "/config", ChatCommand::ShowConfig),
        "health" => no_argument(argument, "/health", ChatCommand::Health),
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn no_argument(argument: Option<&str>, name: &str, command: ChatCommand) -> ChatCommand {
    match argument {
        Some(_) => ChatCommand::Invalid(format!("{} takes no arguments", name)),
        None => command,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /history               Show every message in the conversation
  /stats                 Show session statistics
  /config                Show current configuration
  /health                Check that the chat backend is reachable
  /help                  Show this help message
  /quit                  Exit the chat

Anything else is sent as a message.  Press Ctrl-C to stop a streaming reply."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_help() {
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/HELP"), Some(ChatCommand::Help));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/status"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/health"), Some(ChatCommand::Health));
    }

    #[test]
    fn arguments_are_rejected() {
        assert_eq!(
            parse_command("/history 10"),
            Some(ChatCommand::Invalid(
                "/history takes no arguments".to_string()
            ))
        );
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(
            parse_command("/clear"),
            Some(ChatCommand::Invalid("Unknown command: /clear".to_string()))
        );
        assert_eq!(
            parse_command("/"),
            Some(ChatCommand::Invalid("Unknown command: /".to_string()))
        );
    }

    #[test]
    fn regular_messages_are_not_commands() {
        assert_eq!(parse_command("Hello there"), None);
        assert_eq!(parse_command("what is 1/2?"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for name in ["/history", "/stats", "/config", "/health", "/help", "/quit"] {
            assert!(help.contains(name), "missing {name}");
        }
    }
}

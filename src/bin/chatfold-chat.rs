//! Interactive chat against a streaming chat backend.
//!
//! Every message is sent together with the whole conversation so far; the
//! reply streams back as server-sent events and is folded into the
//! conversation as it arrives.
//!
//! # Usage
//!
//! ```bash
//! # Talk to http://localhost:8000/ (or $CHATFOLD_ENDPOINT)
//! chatfold-chat
//!
//! # Pick the backend explicitly
//! chatfold-chat --endpoint http://chat.internal:8000/
//!
//! # Read settings from a YAML file
//! chatfold-chat --config chatfold.yaml
//!
//! # Disable colors (useful for piping output)
//! chatfold-chat --no-color
//! ```
//!
//! Set `RUST_LOG=chatfold=debug` to see what the client is doing.
//!
//! # Commands
//!
//! - `/help` - Show available commands
//! - `/history` - Show the conversation
//! - `/stats` - Show session statistics
//! - `/config` - Show the configuration
//! - `/health` - Check the backend
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use chatfold::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use chatfold::{ChatClient, MessageRole};

/// Main entry point for the chatfold-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chatfold-chat [OPTIONS]");
    let config = ChatConfig::from_args(args)?;
    let mut renderer =
        PlainTextRenderer::with_color(config.use_color).with_user_echo(config.echo_user);
    let mut session = ChatSession::new(config)?;
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("Chat ({})", session.transport().base_url());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("You: ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                if let Some(cmd) = parse_command(&line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::History => print_history(&session),
                        ChatCommand::ShowConfig => print_config(&session),
                        ChatCommand::Health => match session.transport().health().await {
                            Ok(status) => {
                                renderer.print_info(&format!("Backend up: {}", status.message))
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Backend unreachable: {err}"))
                            }
                        },
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                match session
                    .send_streaming(&line, &mut renderer, interrupted.clone())
                    .await
                {
                    Ok(outcome) if outcome.interrupted => renderer.print_info("[interrupted]"),
                    Ok(_) => {}
                    Err(e) => renderer.print_error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_stats(session: &ChatSession<ChatClient>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!(
        "      Messages: {} ({} user, {} assistant, {} system)",
        stats.message_count, stats.user_messages, stats.assistant_messages, stats.system_messages
    );
    println!(
        "      Turns: {} ({} failed, {} interrupted)",
        stats.turns, stats.failed_turns, stats.interrupted_turns
    );
    println!("      Updates applied: {}", stats.snapshots);
}

fn print_history(session: &ChatSession<ChatClient>) {
    if session.conversation().is_empty() {
        println!("    (no messages yet)");
        return;
    }
    for message in session.conversation().iter() {
        let label = match message.role {
            MessageRole::User => "You",
            MessageRole::Assistant => "Assistant",
            MessageRole::System => "System",
        };
        println!("    [{}] {}: {}", message.id, label, message.content);
    }
}

fn print_config(session: &ChatSession<ChatClient>) {
    let config = session.config();
    println!("    Current Configuration:");
    println!("      Endpoint: {}", session.transport().base_url());
    println!("      Timeout: {}s", config.timeout.as_secs());
    println!("      Colors: {}", if config.use_color { "on" } else { "off" });
    println!("      Echo user messages: {}", if config.echo_user { "on" } else { "off" });
    match config.config_path {
        Some(ref path) => println!("      Config file: {}", path.display()),
        None => println!("      Config file: (none)"),
    }
}

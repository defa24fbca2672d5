//! Output rendering for conversations.
//!
//! A renderer receives the whole conversation plus a loading flag every time
//! the conversation changes, and decides for itself what to redraw.  Nothing a
//! renderer does feeds back into the conversation.

use std::io::{self, Stdout, Write};

use crate::{Conversation, Message, MessageId, MessageRole};

/// ANSI escape code for dim text (used for system notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for system notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for the user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// Trait for rendering a conversation.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Full-screen or graphical front ends
pub trait Renderer: Send {
    /// Show `conversation`.  `loading` is true while a reply is still streaming.
    ///
    /// Called once per change and once more with `loading == false` when the
    /// turn ends, whether it succeeded or failed.
    fn render(&mut self, conversation: &Conversation, loading: bool);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
///
/// Messages are printed as they appear.  Assistant replies arrive as growing
/// snapshots, so only the new suffix is written; a snapshot that rewrites
/// earlier text is printed again in full on a fresh line.  The user's own
/// messages are not echoed by default since the line editor already shows them.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    echo_user: bool,
    // Index of the message currently being written.
    cursor: usize,
    current: Option<MessageId>,
    printed: String,
    silent: bool,
    line_open: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            echo_user: false,
            cursor: 0,
            current: None,
            printed: String::new(),
            silent: false,
            line_open: false,
        }
    }

    /// Also print user messages.
    pub fn with_user_echo(mut self, echo_user: bool) -> Self {
        self.echo_user = echo_user;
        self
    }

    /// Consume the renderer and return its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn label(&self, role: MessageRole) -> String {
        let (color, text) = match role {
            MessageRole::User => (ANSI_GREEN, "You: "),
            MessageRole::Assistant => (ANSI_CYAN, "Assistant: "),
            MessageRole::System => (ANSI_YELLOW, "[system] "),
        };
        if self.use_color {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn write_body(&mut self, role: MessageRole, text: &str) {
        if self.use_color && role == MessageRole::System {
            let _ = write!(self.out, "{ANSI_DIM}{text}{ANSI_RESET}");
        } else {
            let _ = write!(self.out, "{text}");
        }
    }

    fn close_line(&mut self) {
        if self.line_open {
            let _ = writeln!(self.out);
            self.line_open = false;
        }
    }

    fn start_message(&mut self, message: &Message) {
        self.close_line();
        self.current = Some(message.id.clone());
        self.printed = message.content.clone();
        self.silent = message.role == MessageRole::User && !self.echo_user;
        if self.silent {
            return;
        }
        let label = self.label(message.role);
        let _ = write!(self.out, "{label}");
        self.write_body(message.role, &message.content);
        self.line_open = true;
    }

    fn continue_message(&mut self, message: &Message) {
        if message.content == self.printed {
            return;
        }
        if self.silent {
            // The echo differs from what was typed; show the corrected text.
            self.silent = false;
            self.start_message_visible(message);
            return;
        }
        match message.content.strip_prefix(self.printed.as_str()) {
            Some(suffix) => {
                let suffix = suffix.to_string();
                self.write_body(message.role, &suffix);
            }
            None => {
                self.close_line();
                let label = self.label(message.role);
                let _ = write!(self.out, "{label}");
                self.write_body(message.role, &message.content);
                self.line_open = true;
            }
        }
        self.printed = message.content.clone();
    }

    fn start_message_visible(&mut self, message: &Message) {
        self.close_line();
        let label = self.label(message.role);
        let _ = write!(self.out, "{label}");
        self.write_body(message.role, &message.content);
        self.printed = message.content.clone();
        self.line_open = true;
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn render(&mut self, conversation: &Conversation, loading: bool) {
        if self.cursor > conversation.len() {
            self.cursor = conversation.len();
            self.current = None;
        }
        for (index, message) in conversation.iter().enumerate().skip(self.cursor) {
            if self.current.as_ref() == Some(&message.id) {
                self.continue_message(message);
            } else {
                self.start_message(message);
                self.cursor = index;
            }
        }
        if !loading {
            self.close_line();
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.close_line();
        self.flush();
        eprintln!("Error: {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.close_line();
        let _ = writeln!(self.out, "{info}");
        self.flush();
    }
}

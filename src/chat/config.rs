//! Configuration types for the chat application.
//!
//! Command-line arguments are parsed with `arrrg`.  An optional YAML file can
//! supply the same settings; command-line values take precedence over the
//! file, and the file over the `CHATFOLD_ENDPOINT` environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default seconds to wait for a connection and response headers.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the chatfold-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat backend.
    #[arrrg(
        optional,
        "Chat backend base URL (default: $CHATFOLD_ENDPOINT or http://localhost:8000/)",
        "URL"
    )]
    pub endpoint: Option<String>,

    /// Seconds to wait for a connection and response headers.
    #[arrrg(optional, "Connect/header timeout in seconds (default: 60)", "SECONDS")]
    pub timeout: Option<u64>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Print user messages as the conversation confirms them.
    #[arrrg(flag, "Echo user messages in the transcript")]
    pub echo_user: bool,
}

/// Settings read from a YAML configuration file.  Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base URL of the chat backend.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Seconds to wait for a connection and response headers.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Whether to use ANSI colors.
    #[serde(default)]
    pub use_color: Option<bool>,

    /// Whether to echo user messages.
    #[serde(default)]
    pub echo_user: Option<bool>,
}

impl ConfigFile {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read and parse a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            Error::io(
                format!("failed to read config file {}", path.display()),
                err,
            )
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments and the optional config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the chat backend; `None` defers to the environment and the default.
    pub endpoint: Option<String>,

    /// Connect and response-header timeout.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether the renderer prints user messages.
    pub echo_user: bool,

    /// The configuration file the settings came from, if any.
    pub config_path: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: unset (environment, then `http://localhost:8000/`)
    /// - Timeout: 60 seconds
    /// - Color: enabled
    /// - User echo: disabled
    pub fn new() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_color: true,
            echo_user: false,
            config_path: None,
        }
    }

    /// Resolve command-line arguments, loading the config file they name.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => Some(ConfigFile::load(path)?),
            None => None,
        };
        Ok(Self::merge(args, file))
    }

    /// Combine arguments and file settings; arguments win.
    pub fn merge(args: ChatArgs, file: Option<ConfigFile>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::new();
        let use_color = if args.no_color {
            false
        } else {
            file.use_color.unwrap_or(defaults.use_color)
        };
        ChatConfig {
            endpoint: args.endpoint.or(file.endpoint),
            timeout: args
                .timeout
                .or(file.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            use_color,
            echo_user: args.echo_user || file.echo_user.unwrap_or(defaults.echo_user),
            config_path: args.config.map(PathBuf::from),
        }
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets whether user messages are echoed.
    pub fn with_user_echo(mut self, echo_user: bool) -> Self {
        self.echo_user = echo_user;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        Self::merge(args, None)
    }
}

//! Configuration module for chatrelay.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::provider::ProviderKind;
use crate::{RelayError, Result};

/// How the server splits inbound client bytes into chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundFraming {
    /// Every socket read is broadcast as one message.
    #[default]
    Read,
    /// Bytes are accumulated and broadcast one message per `\n`-terminated line.
    Line,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds a new connection has to send its name.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Size of a single socket read.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Inbound message framing.
    #[serde(default)]
    pub inbound_framing: InboundFraming,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_connections() -> usize {
    64
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_read_buffer_size() -> usize {
    1024
}

impl ServerConfig {
    /// Handshake timeout as a duration.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            handshake_timeout_secs: default_handshake_timeout(),
            read_buffer_size: default_read_buffer_size(),
            inbound_framing: InboundFraming::default(),
        }
    }
}

/// Bot participant configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Relay host to connect to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Relay port to connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Completion provider.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model override (provider default when unset).
    #[serde(default)]
    pub model: Option<String>,
    /// Provider base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Maximum tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Lower bound of the thinking delay in seconds.
    #[serde(default = "default_think_min")]
    pub think_min_secs: f64,
    /// Upper bound of the thinking delay in seconds.
    #[serde(default = "default_think_max")]
    pub think_max_secs: f64,
    /// Number of history entries sent with each completion request.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Maximum number of history entries kept in memory.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Maximum bytes per outbound write.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between outbound chunks in milliseconds.
    #[serde(default = "default_chunk_delay")]
    pub chunk_delay_ms: u64,
    /// Completion call timeout in seconds (0 disables the timeout).
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    300
}

fn default_think_min() -> f64 {
    1.0
}

fn default_think_max() -> f64 {
    5.0
}

fn default_history_window() -> usize {
    5
}

fn default_history_capacity() -> usize {
    100
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_delay() -> u64 {
    100
}

fn default_reply_timeout() -> u64 {
    60
}

impl BotConfig {
    /// Pause between outbound chunks.
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    /// Completion timeout, or `None` when waits are unbounded.
    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_secs > 0).then(|| Duration::from_secs(self.reply_timeout_secs))
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            think_min_secs: default_think_min(),
            think_max_secs: default_think_max(),
            history_window: default_history_window(),
            history_capacity: default_history_capacity(),
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay(),
            reply_timeout_secs: default_reply_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/chatrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Relay server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Bot configuration.
    #[serde(default)]
    pub bot: BotConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(RelayError::Validation(
                "server.max_connections must be at least 1".to_string(),
            ));
        }
        if self.server.read_buffer_size == 0 {
            return Err(RelayError::Validation(
                "server.read_buffer_size must be at least 1".to_string(),
            ));
        }

        let bot = &self.bot;
        if !bot.think_min_secs.is_finite() || !bot.think_max_secs.is_finite() {
            return Err(RelayError::Validation(format!(
                "bot.think_min_secs ({}) and bot.think_max_secs ({}) must be finite",
                bot.think_min_secs, bot.think_max_secs
            )));
        }
        if !(bot.think_min_secs >= 0.0 && bot.think_min_secs <= bot.think_max_secs) {
            return Err(RelayError::Validation(format!(
                "bot.think_min_secs ({}) must be between 0 and bot.think_max_secs ({})",
                bot.think_min_secs, bot.think_max_secs
            )));
        }
        // A chunk must hold at least one UTF-8 character.
        if bot.chunk_size < 4 {
            return Err(RelayError::Validation(
                "bot.chunk_size must be at least 4 bytes".to_string(),
            ));
        }
        if bot.history_window == 0 || bot.history_capacity < bot.history_window {
            return Err(RelayError::Validation(
                "bot.history_capacity must be at least bot.history_window, which must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

//! Completion providers for bot participants.
//!
//! The bot session only depends on [`ReplyGenerator`]; each provider is a
//! small adapter that turns a persona and recent history into one HTTP call.

mod anthropic;
mod openai;

use std::future::Future;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::bot::HistoryEntry;
use crate::config::BotConfig;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Connect timeout for provider HTTP calls.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// User agent sent to providers.
const USER_AGENT: &str = concat!("chatrelay/", env!("CARGO_PKG_VERSION"));

/// Errors raised by a completion provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Credential environment variable is missing or empty.
    #[error("environment variable {0} is not set")]
    MissingCredential(&'static str),

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Provider answered with a non-success status.
    #[error("API returned status {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No reply arrived in time.
    #[error("no reply within {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.to_string())
    }
}

/// The one capability a bot needs from a language model.
pub trait ReplyGenerator: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Produce the bot's next message.
    fn generate_reply(
        &self,
        persona: &str,
        history: &[HistoryEntry],
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// Supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    #[default]
    #[serde(alias = "chatgpt")]
    #[value(name = "openai", alias = "chatgpt")]
    OpenAi,
    /// Anthropic messages.
    #[serde(alias = "claude")]
    #[value(alias = "claude")]
    Anthropic,
}

impl ProviderKind {
    /// Environment variable holding the API key.
    pub fn credential_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    /// Public API endpoint.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Connection settings shared by the provider adapters.
#[derive(Debug)]
pub struct ProviderSettings {
    /// API key.
    pub api_key: SecretString,
    /// Model identifier.
    pub model: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
}

impl ProviderSettings {
    /// Build settings for `kind` from the bot configuration and the environment.
    ///
    /// Fails when the provider's credential variable is unset.
    pub fn from_env(kind: ProviderKind, config: &BotConfig) -> Result<Self, ProviderError> {
        Self::new(kind, std::env::var(kind.credential_var()).ok(), config)
    }

    /// Build settings for `kind` from the bot configuration and an API key.
    ///
    /// A missing or blank key is reported as the provider's missing credential.
    pub fn new(
        kind: ProviderKind,
        api_key: Option<String>,
        config: &BotConfig,
    ) -> Result<Self, ProviderError> {
        let api_key = match api_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(ProviderError::MissingCredential(kind.credential_var())),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            max_tokens: config.max_tokens,
        })
    }
}

fn http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Http(format!("failed to create HTTP client: {e}")))
}

/// Turn a non-success response into [`ProviderError::Api`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Trim a generated reply, rejecting empty output.
fn clean_reply(text: &str) -> Result<String, ProviderError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "empty completion".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// Provider selected at runtime.
pub enum Provider {
    /// OpenAI adapter.
    OpenAi(OpenAiProvider),
    /// Anthropic adapter.
    Anthropic(AnthropicProvider),
}

impl Provider {
    /// Create the configured provider, reading its credential from the environment.
    pub fn from_config(kind: ProviderKind, config: &BotConfig) -> Result<Self, ProviderError> {
        let settings = ProviderSettings::from_env(kind, config)?;
        Ok(match kind {
            ProviderKind::OpenAi => Provider::OpenAi(OpenAiProvider::new(settings)?),
            ProviderKind::Anthropic => Provider::Anthropic(AnthropicProvider::new(settings)?),
        })
    }
}

impl ReplyGenerator for Provider {
    fn name(&self) -> &str {
        match self {
            Provider::OpenAi(p) => p.name(),
            Provider::Anthropic(p) => p.name(),
        }
    }

    async fn generate_reply(
        &self,
        persona: &str,
        history: &[HistoryEntry],
    ) -> Result<String, ProviderError> {
        match self {
            Provider::OpenAi(p) => p.generate_reply(persona, history).await,
            Provider::Anthropic(p) => p.generate_reply(persona, history).await,
        }
    }
}

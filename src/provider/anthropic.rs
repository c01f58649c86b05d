//! Anthropic messages adapter.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, clean_reply, http_client, ProviderError, ProviderSettings, ReplyGenerator};
use crate::bot::{HistoryEntry, Role};

/// The Anthropic API version header value.
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Turn>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Turn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Build alternating user/assistant turns.
///
/// Consecutive entries with the same role are merged, and the conversation
/// must open with a user turn.
fn build_turns(history: &[HistoryEntry]) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();

    for entry in history {
        let (role, content) = match &entry.role {
            Role::Participant(_) => ("user", entry.prompt_line()),
            Role::Assistant => ("assistant", entry.text.clone()),
        };
        if turns.is_empty() && role == "assistant" {
            continue;
        }
        match turns.last_mut() {
            Some(last) if last.role == role => {
                last.content.push('\n');
                last.content.push_str(&content);
            }
            _ => turns.push(Turn { role, content }),
        }
    }

    turns
}

/// Anthropic provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            settings,
        })
    }
}

impl ReplyGenerator for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate_reply(
        &self,
        persona: &str,
        history: &[HistoryEntry],
    ) -> Result<String, ProviderError> {
        let messages = build_turns(history);
        if messages.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "no participant message to reply to".to_string(),
            ));
        }

        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system: persona,
            messages,
        };
        let url = format!("{}/v1/messages", self.settings.base_url);
        debug!("Requesting completion from {} ({})", url, self.settings.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.settings.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        clean_reply(&text)
    }
}

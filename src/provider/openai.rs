//! OpenAI chat completions adapter.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, clean_reply, http_client, ProviderError, ProviderSettings, ReplyGenerator};
use crate::bot::{HistoryEntry, Role};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn build_messages(persona: &str, history: &[HistoryEntry]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage {
        role: "system",
        content: persona.to_string(),
    });
    for entry in history {
        messages.push(match &entry.role {
            Role::Participant(_) => ChatMessage {
                role: "user",
                content: entry.prompt_line(),
            },
            Role::Assistant => ChatMessage {
                role: "assistant",
                content: entry.text.clone(),
            },
        });
    }
    messages
}

/// OpenAI provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider.
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            settings,
        })
    }
}

impl ReplyGenerator for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_reply(
        &self,
        persona: &str,
        history: &[HistoryEntry],
    ) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: build_messages(persona, history),
            max_tokens: self.settings.max_tokens,
        };
        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        debug!("Requesting completion from {} ({})", url, self.settings.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.settings.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices".to_string()))?;

        clean_reply(&content)
    }
}

//! Anthropic messages API backend

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::error::BackendError;
use crate::backend::prompts::{
    chat_system_prompt, chat_user_prompt, completion_system_prompt, completion_user_prompt,
    display_path,
};
use crate::backend::{Backend, ChatRequest, CompletionRequest, collect_suggestions};

/// Default base URL for the Anthropic API
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";
const COMPLETION_MAX_TOKENS: u32 = 256;
const CHAT_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: Vec<SystemBlock>,
    messages: Vec<UserMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct UserMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl MessagesResponse {
    fn texts(self) -> Vec<String> {
        self.content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect()
    }
}

/// Backend implementation for the Anthropic messages API
pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    chat_model: String,
}

impl AnthropicBackend {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        chat_model: &str,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent("assist-lsp")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            chat_model: chat_model.to_string(),
        })
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<MessagesResponse, BackendError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = body.model, "Sending Anthropic request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Anthropic returned status {}: {}", status, body);
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse Anthropic response: {}", e);
            BackendError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl Backend for AnthropicBackend {
    async fn completion(
        &self,
        request: &CompletionRequest,
        file_path: &str,
        language_id: &str,
        count: usize,
    ) -> Result<Vec<String>, BackendError> {
        // Several suggestions only make sense if they can differ
        let temperature = if count > 1 { 0.4 } else { 0.0 };

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: COMPLETION_MAX_TOKENS,
            system: vec![SystemBlock {
                kind: "text",
                text: completion_system_prompt(language_id),
                cache_control: Some(CacheControl { kind: "ephemeral" }),
            }],
            messages: vec![UserMessage {
                role: "user",
                content: completion_user_prompt(
                    file_path,
                    &request.content_before,
                    &request.content_after,
                ),
            }],
            temperature,
        };

        let body = &body;
        collect_suggestions(count, request.deadline, move |_| async move {
            self.send(body).await.map(MessagesResponse::texts)
        })
        .await
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        file_path: &str,
        language_id: &str,
    ) -> Result<String, BackendError> {
        let body = MessagesRequest {
            model: &self.chat_model,
            max_tokens: CHAT_MAX_TOKENS,
            system: vec![SystemBlock {
                kind: "text",
                text: chat_system_prompt(language_id),
                cache_control: None,
            }],
            messages: vec![UserMessage {
                role: "user",
                content: chat_user_prompt(
                    language_id,
                    display_path(file_path),
                    &request.content,
                    &request.instruction,
                ),
            }],
            temperature: 0.1,
        };

        self.send(&body)
            .await?
            .texts()
            .into_iter()
            .next()
            .ok_or(BackendError::NoCompletion)
    }
}

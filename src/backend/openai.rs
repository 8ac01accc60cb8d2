//! OpenAI responses API backend

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::backend::error::BackendError;
use crate::backend::extract::extract_code_block;
use crate::backend::prompts::{
    chat_system_prompt, chat_user_prompt, completion_system_prompt, completion_user_prompt,
    display_path,
};
use crate::backend::{Backend, ChatRequest, CompletionRequest, collect_suggestions};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: String,
    input: String,
    store: bool,
    service_tier: &'a str,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponsesResponse {
    /// All `output_text` parts of `message` outputs, in order
    fn texts(self) -> Vec<String> {
        self.output
            .into_iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content)
            .filter(|content| content.kind == "output_text")
            .map(|content| content.text)
            .collect()
    }
}

/// Backend implementation for the OpenAI responses API
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    chat_model: String,
}

impl OpenAiBackend {
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

    async fn send(&self, body: &ResponsesRequest<'_>) -> Result<ResponsesResponse, BackendError> {
        let url = format!("{}/responses", self.base_url);
        debug!(model = body.model, "Sending OpenAI request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("OpenAI returned status {}: {}", status, body);
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse OpenAI response: {}", e);
            BackendError::InvalidResponse(e.to_string())
        })
    }

    fn metadata(file_path: &str, language_id: &str) -> serde_json::Value {
        json!({
            "language": language_id,
            "filepath": file_path,
        })
    }
}

#[async_trait::async_trait]
impl Backend for OpenAiBackend {
    async fn completion(
        &self,
        request: &CompletionRequest,
        file_path: &str,
        language_id: &str,
        count: usize,
    ) -> Result<Vec<String>, BackendError> {
        let body = ResponsesRequest {
            model: &self.model,
            instructions: completion_system_prompt(language_id),
            input: completion_user_prompt(
                file_path,
                &request.content_before,
                &request.content_after,
            ),
            store: false,
            service_tier: "priority",
            metadata: Self::metadata(file_path, language_id),
        };

        let body = &body;
        collect_suggestions(count, request.deadline, move |_| async move {
            self.send(body).await.map(ResponsesResponse::texts)
        })
        .await
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        file_path: &str,
        language_id: &str,
    ) -> Result<String, BackendError> {
        let body = ResponsesRequest {
            model: &self.chat_model,
            instructions: chat_system_prompt(language_id),
            input: chat_user_prompt(
                language_id,
                display_path(file_path),
                &request.content,
                &request.instruction,
            ),
            store: false,
            service_tier: "priority",
            metadata: Self::metadata(file_path, language_id),
        };

        let text = self
            .send(&body)
            .await?
            .texts()
            .into_iter()
            .find(|text| !text.is_empty())
            .ok_or(BackendError::NoCompletion)?;

        // The model is asked for bare code but sometimes still fences it
        Ok(extract_code_block(file_path, &text, language_id).unwrap_or(text))
    }
}

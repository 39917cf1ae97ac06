use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app_config::{ProviderConfig, SpeedMode};
use crate::errors::ProviderError;
use crate::providers::{TranslationBackend, status_error};
use crate::translation::protocol::{
    self, SourceBlock, TranslationRequest, TranslationResponse,
};

const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1";

/// OpenRouter client for the OpenAI-compatible chat completions API
pub struct OpenRouterBackend {
    /// HTTP client for API requests
    client: Client,
    /// API key sent as bearer token
    api_key: String,
    /// API base URL
    endpoint: String,
    fast_model: String,
    normal_model: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenRouterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterBackend")
            .field("endpoint", &self.endpoint)
            .field("fast_model", &self.fast_model)
            .field("normal_model", &self.normal_model)
            .finish_non_exhaustive()
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

/// Chat message format
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl OpenRouterBackend {
    /// Create a new OpenRouter client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        fast_model: impl Into<String>,
        normal_model: impl Into<String>,
        timeout: Duration,
        temperature: f32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let endpoint = endpoint.into();
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: if endpoint.is_empty() { DEFAULT_ENDPOINT.to_string() } else { endpoint },
            fast_model: fast_model.into(),
            normal_model: normal_model.into(),
            temperature,
        })
    }

    pub fn from_config(config: &ProviderConfig, temperature: f32) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!("OpenRouter API key is not configured"));
        }
        Self::new(
            config.api_key.clone(),
            config.endpoint.clone(),
            config.fast_model.clone(),
            config.normal_model.clone(),
            Duration::from_secs(config.timeout_secs),
            temperature,
        )
    }

    fn model(&self, speed_mode: SpeedMode) -> &str {
        match speed_mode {
            SpeedMode::Fast => &self.fast_model,
            SpeedMode::Normal => &self.normal_model,
        }
    }

    fn api_url(&self) -> Result<Url, ProviderError> {
        Url::parse(&format!("{}/chat/completions", self.endpoint.trim_end_matches('/')))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid OpenRouter endpoint: {}", e)))
    }

    /// Send a single user message and return the first choice's content
    pub async fn complete(
        &self,
        prompt: String,
        speed_mode: SpeedMode,
        json_output: bool,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.model(speed_mode).to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: self.temperature,
            response_format: json_output.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        debug!("Sending OpenRouter request to model {}", request.model);
        let response = self
            .client
            .post(self.api_url()?)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("OpenRouter API error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse OpenRouter response: {}", e)))?;

        Self::extract_text_from_response(&chat_response)
            .ok_or_else(|| ProviderError::ParseError("OpenRouter response has no choices".to_string()))
    }

    /// Extract the content of the first choice
    pub fn extract_text_from_response(response: &ChatResponse) -> Option<String> {
        response.choices.first().map(|c| c.message.content.clone())
    }
}

#[async_trait]
impl TranslationBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn detect_context(
        &self,
        chunks: &[Vec<SourceBlock>],
        speed_mode: SpeedMode,
    ) -> Result<String, ProviderError> {
        let prompt = protocol::build_context_prompt(chunks);
        let text = self.complete(prompt, speed_mode, false).await?;
        Ok(text.trim().to_string())
    }

    async fn translate_chunk(
        &self,
        request: &TranslationRequest,
        speed_mode: SpeedMode,
    ) -> Result<TranslationResponse, ProviderError> {
        let prompt = protocol::build_translation_prompt(request)?;
        let text = self.complete(prompt, speed_mode, true).await?;
        protocol::parse_translation_response(&text)
    }
}

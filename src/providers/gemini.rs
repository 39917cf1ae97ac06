use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app_config::{ProviderConfig, SpeedMode};
use crate::errors::ProviderError;
use crate::providers::{TranslationBackend, status_error};
use crate::translation::protocol::{
    self, SourceBlock, TranslationRequest, TranslationResponse,
};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client for the `generateContent` API
pub struct GeminiBackend {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL
    endpoint: String,
    /// Model used in fast mode
    fast_model: String,
    /// Model used in normal mode
    normal_model: String,
    /// Temperature for generation
    temperature: f32,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("endpoint", &self.endpoint)
            .field("fast_model", &self.fast_model)
            .field("normal_model", &self.normal_model)
            .finish_non_exhaustive()
    }
}

/// Gemini generateContent request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: String,
}

/// Gemini generateContent response
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: GeminiContent,
}

impl GeminiRequest {
    fn new(prompt: String, temperature: f32, mime_type: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: mime_type.to_string(),
            },
        }
    }
}

impl GeminiBackend {
    /// Create a new Gemini client
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
            return Err(anyhow!("Gemini API key is not configured"));
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

    fn api_url(&self, model: &str) -> Result<Url, ProviderError> {
        let base = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            model
        );
        Url::parse(&base)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid Gemini endpoint: {}", e)))
    }

    /// Send a prompt and return the concatenated text of the first candidate
    pub async fn generate(
        &self,
        prompt: String,
        speed_mode: SpeedMode,
        mime_type: &str,
    ) -> Result<String, ProviderError> {
        let model = self.model(speed_mode);
        let url = self.api_url(model)?;
        let request = GeminiRequest::new(prompt, self.temperature, mime_type);

        debug!("Sending Gemini request to model {}", model);
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Gemini API error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        let gemini_response = response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Gemini response: {}", e)))?;

        Self::extract_text_from_response(&gemini_response)
            .ok_or_else(|| ProviderError::ParseError("Gemini response has no candidates".to_string()))
    }

    /// Extract text from the first candidate of a Gemini response
    pub fn extract_text_from_response(response: &GeminiResponse) -> Option<String> {
        response
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
    }
}

#[async_trait]
impl TranslationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn detect_context(
        &self,
        chunks: &[Vec<SourceBlock>],
        speed_mode: SpeedMode,
    ) -> Result<String, ProviderError> {
        let prompt = protocol::build_context_prompt(chunks);
        let text = self.generate(prompt, speed_mode, "text/plain").await?;
        Ok(text.trim().to_string())
    }

    async fn translate_chunk(
        &self,
        request: &TranslationRequest,
        speed_mode: SpeedMode,
    ) -> Result<TranslationResponse, ProviderError> {
        let prompt = protocol::build_translation_prompt(request)?;
        let text = self.generate(prompt, speed_mode, "application/json").await?;
        protocol::parse_translation_response(&text)
    }
}

/*!
 * Translation backends.
 *
 * This module contains the backend contract used by the pipeline and its
 * implementations:
 * - Gemini: Google `generateContent` API
 * - OpenRouter: OpenAI-compatible chat completions API
 * - Mock: deterministic local double for tests and dry runs
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{SpeedMode, TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::translation::protocol::{SourceBlock, TranslationRequest, TranslationResponse};

/// Common trait for all translation backends
///
/// The pipeline only talks to backends through this trait, so any
/// implementation can be selected at runtime.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Describe the source material from sampled chunks
    ///
    /// Called once per run, before any chunk is translated.
    async fn detect_context(
        &self,
        chunks: &[Vec<SourceBlock>],
        speed_mode: SpeedMode,
    ) -> Result<String, ProviderError>;

    /// Translate one chunk
    ///
    /// The response is returned as the backend produced it; the caller
    /// validates it against the request.
    async fn translate_chunk(
        &self,
        request: &TranslationRequest,
        speed_mode: SpeedMode,
    ) -> Result<TranslationResponse, ProviderError>;
}

/// Build the backend selected in the configuration
pub fn create_backend(config: &TranslationConfig) -> Result<Arc<dyn TranslationBackend>> {
    let provider_config = config.active_provider_or_default();

    let backend: Arc<dyn TranslationBackend> = match config.provider {
        TranslationProvider::Gemini => Arc::new(gemini::GeminiBackend::from_config(
            &provider_config,
            config.common.temperature,
        )?),
        TranslationProvider::OpenRouter => Arc::new(openrouter::OpenRouterBackend::from_config(
            &provider_config,
            config.common.temperature,
        )?),
        TranslationProvider::Mock => {
            let behavior = match provider_config.fail_every {
                Some(0) => return Err(anyhow!("Mock fail_every must be a positive integer")),
                Some(fail_every) => mock::MockBehavior::Intermittent { fail_every },
                None => mock::MockBehavior::Working,
            };
            Arc::new(mock::MockBackend::new(behavior).with_delay_ms(provider_config.delay_ms))
        }
    };

    Ok(backend)
}

/// Map an unsuccessful HTTP status to a provider error
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        code => ProviderError::ApiError {
            status_code: code,
            message: body,
        },
    }
}

pub mod gemini;
pub mod mock;
pub mod openrouter;

/*!
 * Per-chunk translation with bounded retries.
 *
 * A chunk moves through `Pending -> InFlight -> {Succeeded, Retrying, Failed}`,
 * with `Retrying -> InFlight` after a backoff. `Cancelled` is entered from any
 * non-terminal state once the run is aborted. Backend errors and invalid
 * responses both count as failed attempts and are retried the same way.
 */

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};

use crate::app_config::{SpeedMode, TranslationCommonConfig};
use crate::errors::TranslationError;
use crate::providers::TranslationBackend;

use super::chunker::Chunk;
use super::concurrency::CancelSignal;
use super::protocol::{TranslationRequest, validate_response};
use super::stats::AttemptRecorder;

/// Lifecycle state of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    InFlight,
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
}

impl ChunkState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InFlight => "in-flight",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Retry bound and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_retries, base_delay, max_delay }
    }

    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self::new(
            common.retry_max_attempts,
            Duration::from_millis(common.retry_backoff_ms),
            Duration::from_millis(common.retry_backoff_max_ms),
        )
    }

    /// Delay before the given retry (1-based): `min(base * 2^(retry-1), max)`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Total attempts a chunk gets before it fails
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TranslationCommonConfig::default())
    }
}

/// Final result of one chunk
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub chunk: Chunk,
    pub state: ChunkState,
    /// Backend attempts made
    pub attempts: u32,
    /// Validated translations by subtitle index, empty unless succeeded
    pub translations: BTreeMap<usize, Vec<String>>,
    /// Last error seen, if any
    pub last_error: Option<String>,
}

impl ChunkOutcome {
    fn new(chunk: Chunk, state: ChunkState, attempts: u32) -> Self {
        Self {
            chunk,
            state,
            attempts,
            translations: BTreeMap::new(),
            last_error: None,
        }
    }

    /// Outcome of a chunk aborted before it finished
    pub fn cancelled(chunk: Chunk, attempts: u32) -> Self {
        Self::new(chunk, ChunkState::Cancelled, attempts)
    }

    /// Outcome of a chunk whose task died without reporting back
    pub fn failed(chunk: Chunk, reason: impl Into<String>) -> Self {
        let mut outcome = Self::new(chunk, ChunkState::Failed, 0);
        outcome.last_error = Some(reason.into());
        outcome
    }

    pub fn succeeded(&self) -> bool {
        self.state == ChunkState::Succeeded
    }
}

/// Drives one chunk through its state machine against a backend
#[derive(Debug, Clone)]
pub struct ChunkTranslator {
    backend: Arc<dyn TranslationBackend>,
    policy: RetryPolicy,
    speed_mode: SpeedMode,
    recorder: Arc<AttemptRecorder>,
}

impl ChunkTranslator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        policy: RetryPolicy,
        speed_mode: SpeedMode,
        recorder: Arc<AttemptRecorder>,
    ) -> Self {
        Self { backend, policy, speed_mode, recorder }
    }

    pub fn recorder(&self) -> &Arc<AttemptRecorder> {
        &self.recorder
    }

    fn transition(chunk: &Chunk, state: &mut ChunkState, next: ChunkState) {
        debug!("Chunk {}: {} -> {}", chunk.id, state, next);
        *state = next;
    }

    /// Translate a chunk, retrying up to the policy's bound.
    ///
    /// Never returns an error: the outcome's state says how the chunk ended.
    pub async fn translate(&self, chunk: Chunk, request: TranslationRequest, cancel: &CancelSignal) -> ChunkOutcome {
        let mut state = ChunkState::Pending;
        let mut attempts: u32 = 0;
        let mut retries_done: u32 = 0;
        let mut last_error = None;

        if request.blocks.is_empty() {
            debug!("Chunk {} has no text to translate", chunk.id);
            return ChunkOutcome::new(chunk, ChunkState::Succeeded, 0);
        }

        loop {
            if cancel.is_cancelled() {
                Self::transition(&chunk, &mut state, ChunkState::Cancelled);
                break;
            }

            Self::transition(&chunk, &mut state, ChunkState::InFlight);
            attempts += 1;

            let response = tokio::select! {
                response = self.backend.translate_chunk(&request, self.speed_mode) => response,
                _ = cancel.cancelled() => {
                    Self::transition(&chunk, &mut state, ChunkState::Cancelled);
                    break;
                }
            };

            let result = match response {
                Ok(response) => validate_response(&request, response).map_err(TranslationError::from),
                Err(source) => Err(TranslationError::ChunkTranslation { chunk_id: chunk.id, source }),
            };

            let err = match result {
                Ok(translations) => {
                    self.recorder.record_attempt(false);
                    Self::transition(&chunk, &mut state, ChunkState::Succeeded);
                    let mut outcome = ChunkOutcome::new(chunk, state, attempts);
                    outcome.translations = translations;
                    return outcome;
                }
                Err(err) => err,
            };

            self.recorder.record_attempt(true);
            match &err {
                TranslationError::Validation(e) => warn!(
                    "Chunk {} attempt {}/{}: invalid response: {}",
                    chunk.id, attempts, self.policy.max_attempts(), e
                ),
                e => warn!(
                    "Chunk {} attempt {}/{}: backend error: {}",
                    chunk.id, attempts, self.policy.max_attempts(), e
                ),
            }
            last_error = Some(err.to_string());

            if retries_done >= self.policy.max_retries || !err.is_retryable() {
                Self::transition(&chunk, &mut state, ChunkState::Failed);
                self.recorder.record_chunk_failure();
                error!("Chunk {} failed after {} attempts", chunk.id, attempts);
                break;
            }

            retries_done += 1;
            Self::transition(&chunk, &mut state, ChunkState::Retrying);
            let delay = self.policy.backoff(retries_done);
            debug!("Chunk {} retry {} in {:?}", chunk.id, retries_done, delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    Self::transition(&chunk, &mut state, ChunkState::Cancelled);
                    break;
                }
            }
        }

        let mut outcome = ChunkOutcome::new(chunk, state, attempts);
        outcome.last_error = last_error;
        outcome
    }
}

/*!
 * Core translation service implementation.
 *
 * `TranslationService` is the pipeline entry point: it partitions a block
 * sequence into chunks, asks the backend once for a shared context, hands
 * the chunks to the coordinator and merges the successful ones back.
 * Clones share the backend, the concurrency limiter and the statistics
 * tracker, so concurrent runs through clones obey one global cap.
 */

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::app_config::{ContextPolicy, SpeedMode, TranslationCommonConfig, TranslationConfig};
use crate::errors::TranslationError;
use crate::language_utils;
use crate::providers::{self, TranslationBackend};
use crate::subtitle_processor::SubtitleBlock;

use super::chunk_translator::{ChunkState, ChunkTranslator, RetryPolicy};
use super::chunker::{self, Chunk};
use super::concurrency::{CancelSignal, ConcurrencyLimiter};
use super::coordinator::{ChunkCoordinator, ChunkJob, ProgressCallback};
use super::protocol::{SourceBlock, TranslationRequest};
use super::reassembly;
use super::stats::{AttemptRecorder, RequestId, RunStatus, StatsTracker};

/// Translation options for customizing the pipeline
#[derive(Debug, Clone)]
pub struct TranslationOptions {
    /// Maximum number of blocks per chunk
    pub chunk_max_blocks: usize,

    /// Retry bound and backoff schedule
    pub retry: RetryPolicy,

    /// Behaviour when context detection fails
    pub context_policy: ContextPolicy,

    /// Blocks sampled for context detection
    pub context_sample_blocks: usize,
}

impl TranslationOptions {
    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self {
            chunk_max_blocks: common.chunk_max_blocks,
            retry: RetryPolicy::from_config(common),
            context_policy: common.context_policy,
            context_sample_blocks: common.context_sample_blocks,
        }
    }
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self::from_config(&TranslationCommonConfig::default())
    }
}

/// Per-run options
#[derive(Clone)]
pub struct RunOptions {
    /// Statistics record to update, if the run is tracked
    pub request_id: Option<RequestId>,

    /// Abort signal for the run
    pub cancel: CancelSignal,

    /// Progress callback `(completed_chunks, total_chunks)`
    pub progress: Option<ProgressCallback>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            request_id: None,
            cancel: CancelSignal::never(),
            progress: None,
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    /// Blocks with translations written for every successful chunk
    pub blocks: Vec<SubtitleBlock>,
    pub total_attempts: u64,
    pub failed_attempts: u64,
    pub chunks_with_failures: u64,
    pub total_chunks: usize,
    pub status: RunStatus,
}

impl TranslationOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn translated_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_translated()).count()
    }
}

/// Main translation service for subtitle translation
#[derive(Debug, Clone)]
pub struct TranslationService {
    /// Backend every chunk is sent to
    backend: Arc<dyn TranslationBackend>,

    /// Process-wide cap on in-flight chunks
    limiter: ConcurrencyLimiter,

    /// Run statistics shared by all clones
    tracker: Arc<StatsTracker>,

    /// Pipeline options
    pub options: TranslationOptions,
}

impl TranslationService {
    /// Create a new translation service with the given configuration
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let backend = providers::create_backend(config)?;
        let service = Self::with_backend(
            backend,
            TranslationOptions::from_config(&config.common),
            config.common.max_concurrent_translations,
        )?;
        Ok(service)
    }

    /// Create a service around an existing backend
    pub fn with_backend(
        backend: Arc<dyn TranslationBackend>,
        options: TranslationOptions,
        max_concurrent: usize,
    ) -> Result<Self, TranslationError> {
        if options.chunk_max_blocks == 0 {
            return Err(TranslationError::Config(
                "chunk size must be a positive integer".to_string(),
            ));
        }

        Ok(Self {
            backend,
            limiter: ConcurrencyLimiter::new(max_concurrent)?,
            tracker: Arc::new(StatsTracker::new()),
            options,
        })
    }

    /// Statistics of every run made through this service and its clones
    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.tracker
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Translate a block sequence without tracking or cancellation
    pub async fn translate(
        &self,
        blocks: Vec<SubtitleBlock>,
        target_language: &str,
        speed_mode: SpeedMode,
    ) -> Result<TranslationOutcome, TranslationError> {
        self.translate_with_options(blocks, target_language, speed_mode, RunOptions::default())
            .await
    }

    /// Translate a block sequence.
    ///
    /// Chunk failures never surface as errors: they are reported in the
    /// outcome and the affected blocks stay untranslated. Errors are
    /// reserved for context detection failure (with `ContextPolicy::Fail`),
    /// cancellation and configuration problems.
    pub async fn translate_with_options(
        &self,
        mut blocks: Vec<SubtitleBlock>,
        target_language: &str,
        speed_mode: SpeedMode,
        run: RunOptions,
    ) -> Result<TranslationOutcome, TranslationError> {
        let request_id = run.request_id;

        let target_name = match language_utils::resolve_language_name(target_language) {
            Ok(name) => name,
            Err(e) => {
                self.finalize(request_id, RunStatus::Failed);
                return Err(TranslationError::Config(e.to_string()));
            }
        };

        let chunks = match chunker::partition(&blocks, self.options.chunk_max_blocks) {
            Ok(chunks) => chunks,
            Err(e) => {
                self.finalize(request_id, RunStatus::Failed);
                return Err(e);
            }
        };

        if let Some(id) = request_id {
            self.tracker.record_parsed(id, blocks.len(), chunks.len())?;
        }

        let recorder = Arc::new(AttemptRecorder::new(Arc::clone(&self.tracker), request_id));

        if chunks.is_empty() {
            info!("No subtitle blocks to translate");
            self.finalize(request_id, RunStatus::Completed);
            return Ok(Self::outcome(blocks, &recorder, 0, RunStatus::Completed));
        }

        info!(
            "Translating {} blocks in {} chunks to {} with {} ({} mode)",
            blocks.len(),
            chunks.len(),
            target_name,
            self.backend.name(),
            speed_mode
        );

        let context = match self.detect_context(&blocks, &chunks, speed_mode, &run.cancel).await {
            Ok(context) => context,
            Err(e) => {
                self.finalize(request_id, RunStatus::Failed);
                return Err(e);
            }
        };

        let jobs: Vec<ChunkJob> = chunks
            .iter()
            .map(|chunk| ChunkJob {
                chunk: chunk.clone(),
                request: TranslationRequest {
                    context: context.clone(),
                    target_language: target_name.clone(),
                    blocks: chunk.source_blocks(&blocks),
                },
            })
            .collect();

        let translator = ChunkTranslator::new(
            Arc::clone(&self.backend),
            self.options.retry,
            speed_mode,
            Arc::clone(&recorder),
        );
        let coordinator = ChunkCoordinator::new(self.limiter.clone(), translator);
        let outcomes = coordinator.run(jobs, &run.cancel, run.progress.clone()).await;

        let cancelled = outcomes.iter().any(|o| o.state == ChunkState::Cancelled);
        if run.cancel.is_cancelled() || cancelled {
            warn!("Translation run cancelled");
            self.finalize(request_id, RunStatus::Failed);
            return Err(TranslationError::Cancelled);
        }

        let mut written = 0;
        for outcome in outcomes.iter().filter(|o| o.succeeded()) {
            written += reassembly::merge_chunk(&mut blocks, &outcome.chunk, &outcome.translations);
        }

        let status = if outcomes.iter().all(|o| o.succeeded()) {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.finalize(request_id, status);

        let total_chunks = chunks.len();
        match status {
            RunStatus::Completed => info!("Translated {} blocks in {} chunks", written, total_chunks),
            _ => error!(
                "{} of {} chunks failed, {} blocks translated",
                recorder.chunks_with_failures(),
                total_chunks,
                written
            ),
        }

        Ok(Self::outcome(blocks, &recorder, total_chunks, status))
    }

    async fn detect_context(
        &self,
        blocks: &[SubtitleBlock],
        chunks: &[Chunk],
        speed_mode: SpeedMode,
        cancel: &CancelSignal,
    ) -> Result<String, TranslationError> {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        let sample = context_sample(blocks, chunks, self.options.context_sample_blocks);
        let result = tokio::select! {
            result = self.backend.detect_context(&sample, speed_mode) => result,
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
        };

        match (result, self.options.context_policy) {
            (Ok(context), _) => {
                debug!("Detected context: {}", context);
                Ok(context)
            }
            (Err(e), ContextPolicy::Empty) => {
                warn!("Context detection failed, continuing without context: {}", e);
                Ok(String::new())
            }
            (Err(e), ContextPolicy::Fail) => {
                error!("Context detection failed: {}", e);
                Err(TranslationError::ContextDetection(e))
            }
        }
    }

    fn finalize(&self, request_id: Option<RequestId>, status: RunStatus) {
        if let Some(id) = request_id {
            if let Err(e) = self.tracker.finalize(id, status) {
                warn!("Could not finalize {}: {}", id, e);
            }
        }
    }

    fn outcome(
        blocks: Vec<SubtitleBlock>,
        recorder: &AttemptRecorder,
        total_chunks: usize,
        status: RunStatus,
    ) -> TranslationOutcome {
        TranslationOutcome {
            blocks,
            total_attempts: recorder.total_attempts(),
            failed_attempts: recorder.failed_attempts(),
            chunks_with_failures: recorder.chunks_with_failures(),
            total_chunks,
            status,
        }
    }
}

/// Leading blocks shown to the backend for context detection, grouped by chunk
fn context_sample(blocks: &[SubtitleBlock], chunks: &[Chunk], limit: usize) -> Vec<Vec<SourceBlock>> {
    let mut remaining = limit;
    let mut sample = Vec::new();

    for chunk in chunks {
        if remaining == 0 {
            break;
        }
        let mut payload = chunk.source_blocks(blocks);
        if payload.is_empty() {
            continue;
        }
        payload.truncate(remaining);
        remaining -= payload.len();
        sample.push(payload);
    }

    sample
}

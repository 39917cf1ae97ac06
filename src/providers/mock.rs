/*!
 * Mock backend implementation for testing.
 *
 * The mock translates deterministically (`"[<target>] <line>"` for every
 * source line) and can be told to misbehave in the ways real backends do:
 * - `MockBackend::working()` - Always succeeds
 * - `MockBackend::failing()` - Always fails with an API error
 * - `MockBehavior::Intermittent` / `FailFirst` - Fails on selected calls
 * - `MockBehavior::DropIndex` / `ExtraIndex` / `EmptyLines` - Invalid responses
 * - `MockBehavior::PanicOnIndex` - Panics inside the call
 *
 * It also counts calls and records the peak number of overlapping
 * `translate_chunk` calls so tests can observe the concurrency cap.
 */

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::app_config::SpeedMode;
use crate::errors::ProviderError;
use crate::providers::TranslationBackend;
use crate::translation::protocol::{
    SourceBlock, TranslatedBlock, TranslationRequest, TranslationResponse,
};

/// Behavior mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Always fails with an error
    Failing,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Fails the first N requests, then succeeds
    FailFirst { failures: usize },
    /// Omits the given subtitle index from its responses
    DropIndex { index: usize },
    /// Adds an index that was never requested
    ExtraIndex,
    /// Returns no lines for the first block of each chunk
    EmptyLines,
    /// Panics on any request containing the given subtitle index
    PanicOnIndex { index: usize },
}

/// Mock backend for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Behavior mode
    behavior: MockBehavior,
    /// Artificial latency per call
    delay: Duration,
    /// Whether context detection fails
    fail_context: Arc<AtomicBool>,
    /// Translate calls so far
    request_count: Arc<AtomicUsize>,
    /// Context detection calls so far
    context_count: Arc<AtomicUsize>,
    /// Translate calls currently running
    active: Arc<AtomicUsize>,
    /// Highest value `active` has reached
    peak: Arc<AtomicUsize>,
}

/// Decrements the active counter even when the call future is dropped
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            fail_context: Arc::new(AtomicBool::new(false)),
            request_count: Arc::new(AtomicUsize::new(0)),
            context_count: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a failing mock backend that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Set the artificial latency of every call
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    /// Make context detection fail
    pub fn with_context_failure(self) -> Self {
        self.fail_context.store(true, Ordering::SeqCst);
        self
    }

    pub fn translate_calls(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn context_calls(&self) -> usize {
        self.context_count.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping translate calls observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Deterministic translation of one block
    pub fn translate_lines(content: &str, target_language: &str) -> Vec<String> {
        content
            .split('\n')
            .map(|line| format!("[{}] {}", target_language, line))
            .collect()
    }

    fn should_fail(&self, count: usize) -> bool {
        match self.behavior {
            MockBehavior::Failing => true,
            MockBehavior::Intermittent { fail_every } => {
                fail_every > 0 && count % fail_every == fail_every - 1
            }
            MockBehavior::FailFirst { failures } => count < failures,
            _ => false,
        }
    }

    fn build_response(&self, request: &TranslationRequest) -> TranslationResponse {
        let mut translations: Vec<TranslatedBlock> = request
            .blocks
            .iter()
            .map(|b| TranslatedBlock {
                index: b.index,
                lines: Self::translate_lines(&b.content, &request.target_language),
            })
            .collect();

        match self.behavior {
            MockBehavior::DropIndex { index } => translations.retain(|t| t.index != index),
            MockBehavior::ExtraIndex => {
                let extra = request.indices().max().unwrap_or(0) + 1;
                translations.push(TranslatedBlock {
                    index: extra,
                    lines: vec!["[unexpected]".to_string()],
                });
            }
            MockBehavior::EmptyLines => {
                if let Some(first) = translations.first_mut() {
                    first.lines.clear();
                }
            }
            _ => {}
        }

        TranslationResponse { translations }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn detect_context(
        &self,
        chunks: &[Vec<SourceBlock>],
        _speed_mode: SpeedMode,
    ) -> Result<String, ProviderError> {
        self.context_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_context.load(Ordering::SeqCst) {
            return Err(ProviderError::ApiError {
                message: "Simulated context detection failure".to_string(),
                status_code: 500,
            });
        }

        let blocks: usize = chunks.iter().map(Vec::len).sum();
        Ok(format!("Mock context from {} sampled blocks", blocks))
    }

    async fn translate_chunk(
        &self,
        request: &TranslationRequest,
        _speed_mode: SpeedMode,
    ) -> Result<TranslationResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(Arc::clone(&self.active));
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let MockBehavior::PanicOnIndex { index } = self.behavior {
            if request.indices().any(|i| i == index) {
                panic!("Simulated backend panic on index {}", index);
            }
        }

        if self.should_fail(count) {
            debug!("Mock failing request #{}", count + 1);
            return Err(ProviderError::ApiError {
                message: format!("Simulated failure (request #{})", count + 1),
                status_code: 503,
            });
        }

        Ok(self.build_response(request))
    }
}

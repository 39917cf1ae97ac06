/*!
 * End-to-end tests of the chunked translation pipeline against the mock backend
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use subtide::SpeedMode;
use subtide::app_config::ContextPolicy;
use subtide::errors::TranslationError;
use subtide::providers::mock::{MockBackend, MockBehavior};
use subtide::translation::{RunOptions, RunStatus, TranslationService, cancellation};
use crate::common;

#[tokio::test]
async fn test_translate_with250Blocks_shouldTranslateEveryBlockInOrder() {
    common::init_logger();
    let backend = MockBackend::working();
    let service = common::mock_service(backend.clone(), 100, 3, 4);
    let blocks = common::sample_blocks(250);

    let outcome = service.translate(blocks.clone(), "es", SpeedMode::Fast).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.total_chunks, 3);
    assert_eq!(outcome.total_attempts, 3);
    assert_eq!(outcome.failed_attempts, 0);
    assert_eq!(outcome.translated_blocks(), 250);
    assert_eq!(backend.translate_calls(), 3);
    assert_eq!(backend.context_calls(), 1);

    for (original, translated) in blocks.iter().zip(&outcome.blocks) {
        assert_eq!(original.index, translated.index);
        assert_eq!(original.start_ms, translated.start_ms);
        assert_eq!(original.end_ms, translated.end_ms);
        assert_eq!(translated.output_text(), format!("[Spanish] {}", original.content));
    }
}

#[tokio::test]
async fn test_translate_withPersistentlyMissingIndex_shouldFailOnlyThatChunk() {
    common::init_logger();
    let backend = MockBackend::new(MockBehavior::DropIndex { index: 120 });
    let service = common::mock_service(backend.clone(), 100, 2, 4);

    let outcome = service
        .translate(common::sample_blocks(250), "es", SpeedMode::Fast)
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.chunks_with_failures, 1);
    assert_eq!(outcome.failed_attempts, 3);
    assert_eq!(outcome.total_attempts, 5);
    assert_eq!(backend.translate_calls(), 5);

    // The second chunk (blocks 101-200) stays untranslated as a unit
    assert_eq!(outcome.translated_blocks(), 150);
    assert!(outcome.blocks[..100].iter().all(|b| b.is_translated()));
    assert!(outcome.blocks[100..200].iter().all(|b| !b.is_translated()));
    assert!(outcome.blocks[200..].iter().all(|b| b.is_translated()));
}

#[tokio::test]
async fn test_translate_withIntermittentFailures_shouldRecoverThroughRetries() {
    let backend = MockBackend::new(MockBehavior::Intermittent { fail_every: 3 });
    let service = common::mock_service(backend.clone(), 10, 3, 1);

    let outcome = service
        .translate(common::sample_blocks(50), "fr", SpeedMode::Normal)
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.translated_blocks(), 50);
    assert!(outcome.failed_attempts >= 1);
    assert_eq!(outcome.chunks_with_failures, 0);
    assert_eq!(outcome.total_attempts, backend.translate_calls() as u64);
}

#[tokio::test]
async fn test_translate_withContextFailureAndFailPolicy_shouldAbortRun() {
    let backend = MockBackend::working().with_context_failure();
    let service = common::mock_service(backend.clone(), 10, 1, 2);

    let result = service.translate(common::sample_blocks(20), "es", SpeedMode::Fast).await;

    assert!(matches!(result, Err(TranslationError::ContextDetection(_))));
    assert_eq!(backend.translate_calls(), 0);
}

#[tokio::test]
async fn test_translate_withContextFailureAndEmptyPolicy_shouldContinue() {
    let backend = MockBackend::working().with_context_failure();
    let mut options = common::fast_options(10, 1);
    options.context_policy = ContextPolicy::Empty;
    let service = TranslationService::with_backend(Arc::new(backend.clone()), options, 2).unwrap();

    let outcome = service
        .translate(common::sample_blocks(20), "es", SpeedMode::Fast)
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(backend.translate_calls(), 2);
}

#[tokio::test]
async fn test_translate_withEmptyInput_shouldCompleteWithoutBackendCalls() {
    let backend = MockBackend::working();
    let service = common::mock_service(backend.clone(), 10, 1, 2);
    let id = service.stats().create("empty.srt", 0, SpeedMode::Fast);

    let run = RunOptions { request_id: Some(id), ..RunOptions::default() };
    let outcome = service
        .translate_with_options(Vec::new(), "es", SpeedMode::Fast, run)
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.total_chunks, 0);
    assert_eq!(backend.context_calls(), 0);
    assert_eq!(backend.translate_calls(), 0);
    assert_eq!(service.stats().get(id).unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_translate_withUnknownLanguage_shouldFailBeforeBackendCalls() {
    let backend = MockBackend::working();
    let service = common::mock_service(backend.clone(), 10, 1, 2);
    let id = service.stats().create("a.srt", 1, SpeedMode::Fast);

    let run = RunOptions { request_id: Some(id), ..RunOptions::default() };
    let result = service
        .translate_with_options(common::sample_blocks(5), "zz-unknown", SpeedMode::Fast, run)
        .await;

    assert!(matches!(result, Err(TranslationError::Config(_))));
    assert_eq!(backend.context_calls(), 0);
    assert_eq!(service.stats().get(id).unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn test_translate_withTrackedRun_shouldRecordStatistics() {
    let backend = MockBackend::new(MockBehavior::FailFirst { failures: 1 });
    let service = common::mock_service(backend, 5, 2, 1);
    let id = service.stats().create("movie.srt", 1234, SpeedMode::Fast);

    let progress_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&progress_calls);
    let run = RunOptions {
        request_id: Some(id),
        progress: Some(Arc::new(move |completed: usize, total: usize| {
            assert!(completed <= total);
            counter.fetch_add(1, Ordering::SeqCst);
        })),
        ..RunOptions::default()
    };

    let outcome = service
        .translate_with_options(common::sample_blocks(12), "de", SpeedMode::Fast, run)
        .await
        .unwrap();
    assert!(outcome.is_complete());

    let record = service.stats().get(id).unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.total_blocks, 12);
    assert_eq!(record.total_chunks, 3);
    assert_eq!(record.total_attempts, 4);
    assert_eq!(record.failed_attempts, 1);
    assert_eq!(record.chunks_with_failures, 0);
    assert!(record.end_time.is_some());
    assert_eq!(progress_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_translate_whenCancelled_shouldStopAndMarkRunFailed() {
    common::init_logger();
    let backend = MockBackend::working().with_delay_ms(200);
    let service = common::mock_service(backend.clone(), 5, 3, 1);
    let id = service.stats().create("long.srt", 1, SpeedMode::Fast);
    let (handle, signal) = cancellation();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.cancel();
    });

    let run = RunOptions { request_id: Some(id), cancel: signal, progress: None };
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        service.translate_with_options(common::sample_blocks(50), "es", SpeedMode::Fast, run),
    )
    .await
    .expect("cancelled run should return promptly");

    assert!(matches!(result, Err(TranslationError::Cancelled)));
    // Context (200ms) and at most one chunk finished before the cancel at 300ms
    assert!(backend.translate_calls() < 10);
    assert_eq!(service.stats().get(id).unwrap().status, RunStatus::Failed);
    assert_eq!(service.limiter().available(), 1);
}

#[tokio::test]
async fn test_translate_withPanickingChunk_shouldIsolateItAndCountTheAttempt() {
    let backend = MockBackend::new(MockBehavior::PanicOnIndex { index: 5 });
    let service = common::mock_service(backend.clone(), 4, 2, 2);
    let id = service.stats().create("panic.srt", 1, SpeedMode::Fast);

    let run = RunOptions { request_id: Some(id), ..RunOptions::default() };
    let outcome = service
        .translate_with_options(common::sample_blocks(12), "es", SpeedMode::Fast, run)
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.total_chunks, 3);
    assert_eq!(outcome.chunks_with_failures, 1);
    assert_eq!(outcome.translated_blocks(), 8);
    assert!(outcome.blocks[4..8].iter().all(|b| !b.is_translated()));
    assert!(outcome.blocks[..4].iter().chain(&outcome.blocks[8..]).all(|b| b.is_translated()));

    // Every backend call shows up as an attempt, the panicking one as failed
    assert_eq!(outcome.failed_attempts, 1);
    assert_eq!(outcome.total_attempts, backend.translate_calls() as u64);
    assert_eq!(outcome.total_attempts, 3);

    let record = service.stats().get(id).unwrap();
    assert_eq!(record.failed_attempts, 1);
    assert_eq!(record.total_attempts, 3);
    assert_eq!(record.chunks_with_failures, 1);
    assert_eq!(service.limiter().available(), 2);
}

#[tokio::test]
async fn test_translate_withTextlessBlocks_shouldPassThemThroughUnsent() {
    let backend = MockBackend::working();
    let service = common::mock_service(backend.clone(), 2, 0, 2);

    let mut blocks = common::sample_blocks(6);
    blocks[2].content = String::new();
    blocks[4].content = String::new();
    blocks[5].content = "  ".to_string();

    let outcome = service.translate(blocks, "es", SpeedMode::Fast).await.unwrap();

    // The last chunk holds only textless blocks and never reaches the backend
    assert!(outcome.is_complete());
    assert_eq!(outcome.total_chunks, 3);
    assert_eq!(backend.translate_calls(), 2);
    assert_eq!(outcome.total_attempts, 2);
    assert_eq!(outcome.translated_blocks(), 3);
    assert!(!outcome.blocks[2].is_translated());
    assert_eq!(outcome.blocks[2].start_ms, 3000);
    assert_eq!(outcome.blocks[3].output_text(), "[Spanish] Line 4");
}

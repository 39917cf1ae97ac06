/*!
 * Tests for in-memory run statistics
 */

use std::sync::Arc;
use std::thread;

use subtide::SpeedMode;
use subtide::errors::TranslationError;
use subtide::translation::stats::AttemptRecorder;
use subtide::translation::{RequestId, RunStatus, StatsTracker};

#[test]
fn test_create_shouldAllocateIncreasingIdsInProcessingState() {
    let tracker = StatsTracker::new();
    let first = tracker.create("a.srt", 10, SpeedMode::Fast);
    let second = tracker.create("b.srt", 20, SpeedMode::Normal);

    assert!(second > first);

    let record = tracker.get(first).unwrap();
    assert_eq!(record.filename, "a.srt");
    assert_eq!(record.size, 10);
    assert_eq!(record.status, RunStatus::Processing);
    assert!(record.end_time.is_none());
}

#[test]
fn test_finalize_shouldOnlyLeaveProcessingOnce() {
    let tracker = StatsTracker::new();
    let id = tracker.create("a.srt", 1, SpeedMode::Fast);

    assert!(tracker.finalize(id, RunStatus::Completed).unwrap());
    assert!(!tracker.finalize(id, RunStatus::Failed).unwrap());

    let record = tracker.get(id).unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert!(record.end_time.is_some());
}

#[test]
fn test_update_withUnknownRun_shouldFail() {
    let tracker = StatsTracker::new();
    let result = tracker.record_chunk_failure(RequestId(42));
    assert!(matches!(result, Err(TranslationError::UnknownRun(RequestId(42)))));
    assert!(tracker.get(RequestId(42)).is_none());
}

#[test]
fn test_snapshot_shouldFoldAggregateFromRuns() {
    let tracker = StatsTracker::new();
    let a = tracker.create("a.srt", 1, SpeedMode::Fast);
    let b = tracker.create("b.srt", 1, SpeedMode::Fast);

    tracker.record_parsed(a, 250, 3).unwrap();
    tracker.record_parsed(b, 10, 1).unwrap();
    tracker.record_attempt_outcome(a, true).unwrap();
    tracker.record_attempt_outcome(a, true).unwrap();
    tracker.record_attempt_outcome(b, false).unwrap();
    tracker.record_chunk_failure(a).unwrap();

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.runs.len(), 2);
    assert_eq!(snapshot.aggregate.total_files, 2);
    assert_eq!(snapshot.aggregate.total_blocks, 260);
    assert_eq!(snapshot.aggregate.total_chunks, 4);
    assert_eq!(snapshot.aggregate.total_failed_attempts, 2);
    assert_eq!(snapshot.aggregate.total_chunks_with_failures, 1);
    assert_eq!(snapshot.runs[&a].total_attempts, 2);
}

#[test]
fn test_concurrentUpdates_shouldNotLoseCounts() {
    let tracker = Arc::new(StatsTracker::new());
    let id = tracker.create("a.srt", 1, SpeedMode::Fast);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for _ in 0..100 {
                    tracker.record_attempt_outcome(id, true).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracker.get(id).unwrap().failed_attempts, 800);
}

#[test]
fn test_attemptRecorder_shouldFeedTrackedRun() {
    let tracker = Arc::new(StatsTracker::new());
    let id = tracker.create("a.srt", 1, SpeedMode::Fast);
    let recorder = AttemptRecorder::new(Arc::clone(&tracker), Some(id));

    recorder.record_attempt(true);
    recorder.record_attempt(false);
    recorder.record_chunk_failure();

    assert_eq!(recorder.request_id(), Some(id));
    assert_eq!(recorder.total_attempts(), 2);
    assert_eq!(recorder.failed_attempts(), 1);

    let record = tracker.get(id).unwrap();
    assert_eq!(record.total_attempts, 2);
    assert_eq!(record.failed_attempts, 1);
    assert_eq!(record.chunks_with_failures, 1);
}

#[test]
fn test_snapshot_shouldSerializeToJson() {
    let tracker = StatsTracker::new();
    let id = tracker.create("a.srt", 1, SpeedMode::Fast);
    tracker.finalize(id, RunStatus::Failed).unwrap();

    let json = serde_json::to_value(tracker.snapshot()).unwrap();
    assert_eq!(json["runs"]["1"]["status"], "failed");
    assert_eq!(json["aggregate"]["total_files"], 1);
}

/*!
 * In-memory run statistics.
 *
 * Every translation run gets a record keyed by a monotonically allocated
 * request id. Records are guarded individually so concurrent runs only
 * contend on the map lock when a run is created or a snapshot is taken.
 * The aggregate view is always folded from the records, never stored.
 */

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::app_config::SpeedMode;
use crate::errors::TranslationError;

/// Identifier of one translation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Processing => write!(f, "processing"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Statistics of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub request_id: RequestId,
    pub filename: String,
    pub size: u64,
    pub speed_mode: SpeedMode,
    pub total_blocks: usize,
    pub total_chunks: usize,
    pub total_attempts: u64,
    pub failed_attempts: u64,
    pub chunks_with_failures: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
}

/// Totals over every run recorded since the tracker was created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_files: usize,
    pub total_blocks: usize,
    pub total_chunks: usize,
    pub total_failed_attempts: u64,
    pub total_chunks_with_failures: u64,
    pub start_time: DateTime<Utc>,
}

/// Point-in-time copy of all statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub aggregate: AggregateStats,
    pub runs: BTreeMap<RequestId, RunRecord>,
}

/// Thread-safe store of run records
#[derive(Debug)]
pub struct StatsTracker {
    next_id: AtomicU64,
    start_time: DateTime<Utc>,
    runs: RwLock<BTreeMap<RequestId, Arc<Mutex<RunRecord>>>>,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            start_time: Utc::now(),
            runs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a new run in the `processing` state
    pub fn create(&self, filename: &str, size: u64, speed_mode: SpeedMode) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = RunRecord {
            request_id: id,
            filename: filename.to_string(),
            size,
            speed_mode,
            total_blocks: 0,
            total_chunks: 0,
            total_attempts: 0,
            failed_attempts: 0,
            chunks_with_failures: 0,
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Processing,
        };

        self.runs.write().insert(id, Arc::new(Mutex::new(record)));
        debug!("Created stats record {} for {}", id, filename);
        id
    }

    fn record(&self, id: RequestId) -> Result<Arc<Mutex<RunRecord>>, TranslationError> {
        self.runs
            .read()
            .get(&id)
            .cloned()
            .ok_or(TranslationError::UnknownRun(id))
    }

    /// Store block and chunk totals once the input has been partitioned
    pub fn record_parsed(&self, id: RequestId, blocks: usize, chunks: usize) -> Result<(), TranslationError> {
        let record = self.record(id)?;
        let mut record = record.lock();
        record.total_blocks = blocks;
        record.total_chunks = chunks;
        Ok(())
    }

    /// Count one backend translation attempt
    pub fn record_attempt_outcome(&self, id: RequestId, failed: bool) -> Result<(), TranslationError> {
        let record = self.record(id)?;
        let mut record = record.lock();
        record.total_attempts += 1;
        if failed {
            record.failed_attempts += 1;
        }
        Ok(())
    }

    /// Count a chunk that exhausted its attempts
    pub fn record_chunk_failure(&self, id: RequestId) -> Result<(), TranslationError> {
        let record = self.record(id)?;
        record.lock().chunks_with_failures += 1;
        Ok(())
    }

    /// Close a run. Only a run still `processing` changes state.
    ///
    /// Returns whether the transition happened.
    pub fn finalize(&self, id: RequestId, status: RunStatus) -> Result<bool, TranslationError> {
        let record = self.record(id)?;
        let mut record = record.lock();
        if record.status != RunStatus::Processing {
            return Ok(false);
        }
        record.status = status;
        record.end_time = Some(Utc::now());
        debug!("Run {} finalized as {}", id, status);
        Ok(true)
    }

    /// Copy of a single run record
    pub fn get(&self, id: RequestId) -> Option<RunRecord> {
        self.runs.read().get(&id).map(|r| r.lock().clone())
    }

    /// Consistent copy of every run plus the folded aggregate
    pub fn snapshot(&self) -> StatsSnapshot {
        let runs: BTreeMap<RequestId, RunRecord> = self
            .runs
            .read()
            .iter()
            .map(|(id, record)| (*id, record.lock().clone()))
            .collect();

        let aggregate = runs.values().fold(
            AggregateStats {
                total_files: 0,
                total_blocks: 0,
                total_chunks: 0,
                total_failed_attempts: 0,
                total_chunks_with_failures: 0,
                start_time: self.start_time,
            },
            |mut acc, run| {
                acc.total_files += 1;
                acc.total_blocks += run.total_blocks;
                acc.total_chunks += run.total_chunks;
                acc.total_failed_attempts += run.failed_attempts;
                acc.total_chunks_with_failures += run.chunks_with_failures;
                acc
            },
        );

        StatsSnapshot { aggregate, runs }
    }
}

/// Per-run attempt counters that also feed the tracker when the run is tracked
#[derive(Debug)]
pub struct AttemptRecorder {
    tracker: Arc<StatsTracker>,
    request_id: Option<RequestId>,
    total_attempts: AtomicU64,
    failed_attempts: AtomicU64,
    chunks_with_failures: AtomicU64,
}

impl AttemptRecorder {
    pub fn new(tracker: Arc<StatsTracker>, request_id: Option<RequestId>) -> Self {
        Self {
            tracker,
            request_id,
            total_attempts: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            chunks_with_failures: AtomicU64::new(0),
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    pub fn record_attempt(&self, failed: bool) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(id) = self.request_id {
            if let Err(e) = self.tracker.record_attempt_outcome(id, failed) {
                log::warn!("Could not record attempt: {}", e);
            }
        }
    }

    pub fn record_chunk_failure(&self) {
        self.chunks_with_failures.fetch_add(1, Ordering::Relaxed);
        if let Some(id) = self.request_id {
            if let Err(e) = self.tracker.record_chunk_failure(id) {
                log::warn!("Could not record chunk failure: {}", e);
            }
        }
    }

    pub fn total_attempts(&self) -> u64 {
        self.total_attempts.load(Ordering::Relaxed)
    }

    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    pub fn chunks_with_failures(&self) -> u64 {
        self.chunks_with_failures.load(Ordering::Relaxed)
    }
}

/*!
 * Concurrent dispatch of chunks under the shared concurrency cap.
 *
 * Every chunk runs in its own task. A task first waits for a permit from
 * the limiter and keeps it until its chunk reaches a terminal state, so
 * retries and backoff count against the cap. Panics are caught per task
 * and turned into a failed outcome; siblings keep running. Dropping the
 * coordinator's future drops the `JoinSet`, which aborts all tasks and
 * releases their permits.
 */

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info};
use tokio::task::JoinSet;

use super::chunk_translator::{ChunkOutcome, ChunkTranslator};
use super::chunker::Chunk;
use super::concurrency::{CancelSignal, ConcurrencyLimiter};
use super::protocol::TranslationRequest;

/// Callback receiving `(completed_chunks, total_chunks)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// One unit of work: a chunk and the request built for it
#[derive(Debug, Clone)]
pub struct ChunkJob {
    pub chunk: Chunk,
    pub request: TranslationRequest,
}

/// Runs chunk jobs concurrently and collects their outcomes
#[derive(Debug, Clone)]
pub struct ChunkCoordinator {
    limiter: ConcurrencyLimiter,
    translator: ChunkTranslator,
}

impl ChunkCoordinator {
    pub fn new(limiter: ConcurrencyLimiter, translator: ChunkTranslator) -> Self {
        Self { limiter, translator }
    }

    /// Translate all jobs, returning one outcome per job sorted by chunk id
    pub async fn run(
        &self,
        jobs: Vec<ChunkJob>,
        cancel: &CancelSignal,
        progress: Option<ProgressCallback>,
    ) -> Vec<ChunkOutcome> {
        let total = jobs.len();
        let mut pending: BTreeMap<usize, Chunk> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for job in jobs {
            pending.insert(job.chunk.id, job.chunk.clone());

            let limiter = self.limiter.clone();
            let translator = self.translator.clone();
            let cancel = cancel.clone();
            let fallback = job.chunk.clone();

            let work = async move {
                let _permit = match limiter.acquire(&cancel).await {
                    Ok(permit) => permit,
                    Err(_) => return ChunkOutcome::cancelled(job.chunk, 0),
                };
                debug!("Chunk {} acquired a permit", job.chunk.id);
                translator.translate(job.chunk, job.request, &cancel).await
            };

            let recorder = Arc::clone(self.translator.recorder());
            tasks.spawn(async move {
                match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!("Chunk {} task panicked", fallback.id);
                        // The interrupted attempt never reached the translator's bookkeeping
                        recorder.record_attempt(true);
                        recorder.record_chunk_failure();
                        ChunkOutcome::failed(fallback, "chunk task panicked")
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    pending.remove(&outcome.chunk.id);
                    outcomes.push(outcome);
                    if let Some(progress) = &progress {
                        progress(outcomes.len(), total);
                    }
                }
                Err(e) => error!("Chunk task did not complete: {}", e),
            }
        }

        // Tasks that never reported back are counted as failed
        for (_, chunk) in pending {
            self.translator.recorder().record_chunk_failure();
            outcomes.push(ChunkOutcome::failed(chunk, "chunk task aborted"));
        }

        outcomes.sort_by_key(|o| o.chunk.id);

        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        info!("{}/{} chunks translated", succeeded, total);
        outcomes
    }
}

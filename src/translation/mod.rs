/*!
 * Chunked, concurrency-bounded subtitle translation.
 *
 * The pipeline is split into several submodules:
 *
 * - `chunker`: Partitioning of the block sequence into chunks
 * - `protocol`: Request/response contract, validation and prompts
 * - `chunk_translator`: Per-chunk retry state machine
 * - `concurrency`: Global concurrency limiter and cancellation
 * - `coordinator`: Concurrent dispatch of chunks
 * - `reassembly`: Merging chunk results back into the sequence
 * - `stats`: In-memory run statistics
 * - `core`: Service entry point tying the stages together
 */

// Re-export main types for easier usage
pub use self::chunker::{Chunk, partition};
pub use self::concurrency::{CancelSignal, CancellationHandle, ConcurrencyLimiter, cancellation};
pub use self::core::{RunOptions, TranslationOptions, TranslationOutcome, TranslationService};
pub use self::stats::{RequestId, RunRecord, RunStatus, StatsSnapshot, StatsTracker};

// Submodules
pub mod chunk_translator;
pub mod chunker;
pub mod concurrency;
pub mod coordinator;
pub mod core;
pub mod protocol;
pub mod reassembly;
pub mod stats;

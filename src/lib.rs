/*!
 * # subtide - chunked, concurrent subtitle translation
 *
 * A Rust library for translating SRT subtitles with AI backends.
 *
 * ## Features
 *
 * - Split subtitles into bounded-size chunks
 * - Translate chunks concurrently under one process-wide cap:
 *   - Google Gemini
 *   - OpenRouter (OpenAI-compatible)
 *   - Deterministic mock backend
 * - Retry failed chunks with exponential backoff
 * - Validate every response against the requested subtitle indices
 * - Preserve subtitle timing and ordering
 * - In-memory run statistics
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: SRT parsing, block sequence and output writing
 * - `translation`: The translation pipeline:
 *   - `translation::chunker`: Chunk partitioning
 *   - `translation::chunk_translator`: Per-chunk retry state machine
 *   - `translation::coordinator`: Concurrent dispatch
 *   - `translation::stats`: Run statistics
 *   - `translation::core`: Pipeline entry point
 * - `providers`: Translation backends
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: Language code and name handling
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod subtitle_processor;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, SpeedMode};
pub use errors::{ProviderError, SubtitleError, TranslationError, ValidationError};
pub use language_utils::{normalize_to_part2t, resolve_language_name};
pub use providers::TranslationBackend;
pub use subtitle_processor::{SubtitleBlock, SubtitleCollection};
pub use translation::{TranslationOutcome, TranslationService};

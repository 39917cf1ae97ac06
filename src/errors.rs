/*!
 * Error types for the subtide application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

use crate::translation::stats::RequestId;

/// Errors that can occur when talking to a translation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        // Request URLs may carry credentials
        let error = error.without_url();
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// A backend response that does not match the chunk it answers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Indices requested but absent from the response
    #[error("response is missing indices {0:?}")]
    MissingIndices(Vec<usize>),

    /// Indices present in the response that were never requested
    #[error("response contains unexpected indices {0:?}")]
    UnexpectedIndices(Vec<usize>),

    /// The same index appears more than once
    #[error("response contains index {0} more than once")]
    DuplicateIndex(usize),

    /// A translated entry carries no lines
    #[error("translation for index {0} has no lines")]
    EmptyTranslation(usize),
}

/// Errors that can occur while reading or validating subtitle files
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// Only .srt files are accepted
    #[error("Invalid file type, only .srt files are accepted: {}", .0.display())]
    InvalidFileType(PathBuf),

    /// The file exceeds the configured size limit
    #[error("File size {size} bytes exceeds the limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// The file has no content at all
    #[error("File is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    /// The SRT content is malformed
    #[error("Failed to parse subtitles: {0}")]
    Parse(String),

    /// The file could not be read
    #[error("Could not access file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The backend could not produce the shared context for a run
    #[error("Context detection failed: {0}")]
    ContextDetection(#[source] ProviderError),

    /// A chunk translation attempt failed at the backend
    #[error("Chunk {chunk_id} translation failed: {source}")]
    ChunkTranslation {
        chunk_id: usize,
        #[source]
        source: ProviderError,
    },

    /// The backend answered with a response that does not fit the chunk
    #[error("Invalid translation response: {0}")]
    Validation(#[from] ValidationError),

    /// The run was aborted before it finished
    #[error("Translation run was cancelled")]
    Cancelled,

    /// The pipeline was configured with unusable values
    #[error("Configuration error: {0}")]
    Config(String),

    /// A statistics operation referenced a run that does not exist
    #[error("Unknown run: {0}")]
    UnknownRun(RequestId),
}

impl TranslationError {
    /// Whether a chunk-level retry may resolve this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChunkTranslation { .. } | Self::Validation(_))
    }
}

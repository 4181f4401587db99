//! Error types for medir
//!
//! A single crate-wide error enum distinguishes the faults the benchmark
//! recovers from locally (request timeouts, non-200 responses, which become
//! sentinel records) from the faults that abort the run (server lifecycle
//! failures, transport errors, interruption).

use thiserror::Error;

/// Errors that can occur during benchmark orchestration
#[derive(Debug, Error)]
pub enum MedirError {
    /// Server process could not be spawned, signalled, or reaped
    #[error("Server error: {0}")]
    ServerError(String),

    /// Server never became ready within the readiness deadline
    #[error("Server not ready after {0}s")]
    ServerNotReady(u64),

    /// HTTP transport failure other than a timeout
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Generation request exceeded the client timeout
    #[error("Request for '{model}' timed out after {timeout_secs}s")]
    RequestTimeout {
        /// Model key whose generation timed out
        model: String,
        /// Configured client timeout in seconds
        timeout_secs: u64,
    },

    /// Server answered with a non-success HTTP status
    #[error("HTTP status {status} from {endpoint}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// Endpoint path that produced the status
        endpoint: String,
    },

    /// Response body could not be parsed
    #[error("Format error: {reason}")]
    FormatError {
        /// Description of the parse failure
        reason: String,
    },

    /// Results artifact could not be written
    #[error("Persist error: {0}")]
    PersistError(String),

    /// Invalid plan, catalog entry, or flag combination
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Benchmark was interrupted from outside (Ctrl-C)
    #[error("Benchmark interrupted")]
    Interrupted,
}

/// Result type for medir operations
pub type Result<T> = std::result::Result<T, MedirError>;

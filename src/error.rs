//! Error types for transfer-lifecycle
//!
//! The taxonomy mirrors the three failure domains an item can hit:
//! - [`TransferError`] - reported by the engine (I/O, cancellation)
//! - [`Error::Close`] - the destination resource could not be closed
//! - [`FinalizeError`] - content sniffing or publishing the file failed
//!
//! The `Display` of [`Error`] is exactly what ends up in the `err_msg` field of
//! a `fail` event, so the messages are kept short and chainable.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for transfer-lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for transfer-lifecycle
#[derive(Debug, Error)]
pub enum Error {
    /// The destination resource failed to close; fatal for the item
    #[error("close file: {0}")]
    Close(#[source] std::io::Error),

    /// The engine reported a non-cancellation transfer failure
    #[error("progress: {0}")]
    Transfer(#[from] TransferError),

    /// Extension correction or rename failed after a successful transfer
    #[error("post file: {0}")]
    Finalize(#[from] FinalizeError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "temp_suffix")
        key: Option<String>,
    },

    /// Completion store operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Outcome reported by the engine when a transfer ends with an error
#[derive(Debug, Error)]
pub enum TransferError {
    /// The user aborted the transfer; never reported as a failure
    #[error("operation cancelled")]
    Cancelled,

    /// I/O failure while transferring
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other engine failure
    #[error("{0}")]
    Other(String),
}

impl TransferError {
    /// Whether this error is the distinguished user-cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}

/// Post-transfer finalization errors
///
/// In every case the temporary file is left where it was so the user can
/// recover it by hand.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Content sniffing could not read the file
    #[error("detect mime: {source}")]
    Detect {
        /// The temporary file that was being sniffed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Publishing the file under its final name failed
    #[error("rename file: {source}")]
    Rename {
        /// The temporary file
        from: PathBuf,
        /// The final name that was attempted
        to: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The temporary path has no usable file name
    #[error("invalid file name: {}", path.display())]
    InvalidName {
        /// The offending path
        path: PathBuf,
    },
}

/// Completion store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

//! Error taxonomy for the indexing and search engine.
//!
//! Provider unavailability is deliberately not an error: it is a mode,
//! represented by the absence of a vector backend. Per-call embedding
//! failures degrade the affected operation and are logged, never
//! surfaced.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, including an embedding dimension that
    /// disagrees with the stored vector index. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A malformed request from the caller (negative weights, unknown
    /// content type strings).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Index read/write failure in the underlying storage.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// The external record store failed while iterating records for a
    /// bulk reindex.
    #[error("record store error: {0}")]
    Records(anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

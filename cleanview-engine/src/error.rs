//! Error types for cleanview-engine
//!
//! Detection never fails on bad signal input (it yields no detections), so
//! these errors cover persistence, worker processes and edit-list misuse.

use thiserror::Error;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// cleanview-common error (config, interval bounds, atomic writes)
    #[error("Common error: {0}")]
    Common(#[from] cleanview_common::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A detection worker process failed
    #[error("Worker '{name}' failed: {message}")]
    Worker { name: String, message: String },

    /// Edit decision rejected (bad bounds, bad action)
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    /// No edit decision with this id
    #[error("Edit not found: {0}")]
    EditNotFound(String),

    /// Project file could not be used
    #[error("Project error: {0}")]
    Project(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

//! Error types for the hierarchical store.

use plot_common::PlotError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while writing or reading a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A group was created twice.
    #[error("group already exists: {0}")]
    DuplicateGroup(String),

    /// A required node is absent.
    #[error("missing key: {0}")]
    MissingKey(String),

    /// A date, plot or band name cannot be used as a node name.
    #[error("invalid node name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// A node exists but holds the wrong kind of data.
    #[error("invalid store content at {path}: {message}")]
    Format { path: String, message: String },

    /// Zarr format or codec error.
    #[error("Zarr error: {0}")]
    Zarr(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage/IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn zarr(msg: impl ToString) -> Self {
        Self::Zarr(msg.to_string())
    }

    pub fn format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for PlotError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(io) => PlotError::Io(io),
            other => PlotError::Store(other.to_string()),
        }
    }
}

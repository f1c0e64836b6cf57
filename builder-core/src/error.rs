//! Error types for builder operations.

use thiserror::Error;

/// Result type for builder operations.
pub type BuilderResult<T> = Result<T, BuilderError>;

/// Errors that can occur in builder operations.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Canvas not found in state.
    #[error("Canvas not found: {0}")]
    CanvasNotFound(String),

    /// A canvas with this id already exists.
    #[error("Canvas already exists: {0}")]
    CanvasExists(String),

    /// Item not found on any canvas.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Component type is not in the registry.
    #[error("Unknown component type: {0}")]
    UnknownComponentType(String),

    /// The delete hook refused the deletion.
    #[error("Deletion denied for item: {0}")]
    DeleteDenied(String),

    /// State serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuilderError {
    /// Whether this error is a lookup miss (canvas, item or component type).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CanvasNotFound(_) | Self::ItemNotFound(_) | Self::UnknownComponentType(_)
        )
    }
}

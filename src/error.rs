//! Error types for the copper view core

use thiserror::Error;

/// Batch-level failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("batch '{batch}' is full ({capacity} instances)")]
    CapacityExceeded { batch: String, capacity: usize },

    #[error("id '{0}' is already present")]
    DuplicateId(String),

    #[error("batch '{0}' has been disposed")]
    Disposed(String),
}

/// Board-level failures for the mutation surface
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("unknown id '{0}'")]
    UnknownId(String),

    #[error("invalid trace '{id}': {reason}")]
    InvalidTrace { id: String, reason: String },

    #[error("invalid pad size for '{id}': {size:?}")]
    InvalidSize { id: String, size: [f32; 2] },

    #[error("position of '{id}' is not finite: ({x}, {y})")]
    InvalidPosition { id: String, x: f32, y: f32 },

    #[error("rotation of '{id}' is not finite: {rotation}")]
    InvalidRotation { id: String, rotation: f32 },

    #[error("board thickness must be positive, got {0}")]
    InvalidThickness(f32),
}

impl BoardError {
    /// Short machine-readable reason for soft-failure responses
    pub fn reason(&self) -> &'static str {
        match self {
            BoardError::Batch(BatchError::CapacityExceeded { .. }) => "capacity",
            BoardError::Batch(BatchError::DuplicateId(_)) => "duplicate_id",
            BoardError::Batch(BatchError::Disposed(_)) => "disposed",
            BoardError::UnknownId(_) => "unknown_id",
            BoardError::InvalidTrace { .. } => "invalid_trace",
            BoardError::InvalidSize { .. } => "invalid_size",
            BoardError::InvalidPosition { .. } => "invalid_position",
            BoardError::InvalidRotation { .. } => "invalid_rotation",
            BoardError::InvalidThickness(_) => "invalid_thickness",
        }
    }
}

/// Interaction bookkeeping that went out of sync with the batches.
/// These are programming errors and are never silently ignored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InteractionError {
    #[error("batch {0} is not registered")]
    UnknownBatch(u32),

    #[error("slot {slot} is not a live instance of batch {batch}")]
    UnknownInstance { batch: u32, slot: usize },
}

/// One malformed record in a persisted document
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationIssue {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "component {} ('{}'): {}", self.index, id, self.reason),
            None => write!(f, "component {}: {}", self.index, self.reason),
        }
    }
}

/// Import / backup failures. The board is untouched when any of these is returned.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{} malformed component(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Invalid(Vec<ValidationIssue>),

    #[error("document needs {needed} instances in batch '{batch}' but capacity is {capacity}")]
    Capacity { batch: String, needed: usize, capacity: usize },

    #[error("backup decode error: {0}")]
    Backup(#[from] rmp_serde::decode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

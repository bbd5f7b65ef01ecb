//! Error types for model construction.
//!
//! Only fatal conditions live here. "Nothing to show" situations during a
//! rebuild are reported as status text on the view, never as errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    /// Zero or several components without a parent after edge processing.
    #[error("expected exactly one root component, found {found}")]
    MissingRoot { found: usize },

    /// A `specializes` edge with an endpoint that is not a class.
    #[error("only classes can specialize: {from} -> {to}")]
    InvalidSpecialization { from: String, to: String },

    #[error("trace parse error: {0}")]
    TraceParse(String),

    #[error("malformed dataset: {0}")]
    MalformedDataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

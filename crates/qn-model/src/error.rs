//! Error types for model construction and result access.

use thiserror::Error;

/// Errors raised by the model layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Malformed input: dimension mismatch, negative values, empty class
    /// set. Detected at construction, never during a recursion.
    #[error("invalid model: {what}")]
    InvalidModel { what: String },

    /// A result accessor was called before any solver wrote results.
    #[error("model has not been solved yet")]
    NotSolved,
}

pub type ModelResult<T> = Result<T, ModelError>;

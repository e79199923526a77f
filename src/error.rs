//! Pipeline error type

use thiserror::Error;

/// Errors raised by the recolor and classification pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemapError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Invalid variation: {0}")]
    InvalidVariation(String),

    #[error("Invalid animation: {0}")]
    InvalidAnimation(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

//! Error taxonomy for the probability engine.

use thiserror::Error;

/// Failures surfaced by engine computations.
///
/// Insufficient samples and all-zero rate sets are resolved internally by
/// fallback policy and never show up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed or incomplete input, rejected before any computation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested match, team or bin range has no underlying data.
    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }
}

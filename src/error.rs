//! Error types for operator construction and evaluation.

use thiserror::Error;

use crate::tensors::Axis;

/// Errors raised by the divergence operators.
///
/// Every error is fatal for the call that raised it; nothing is retried or
/// partially applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DivError {
    /// A grid step size was zero, negative, or not finite.
    #[error("invalid step size for {axis} axis: {value} (must be finite and > 0)")]
    Configuration { axis: Axis, value: f64 },

    /// A field or gradient did not have the shape the operation requires.
    #[error("{op}: shape mismatch, expected {expected}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: String,
        actual: Vec<usize>,
    },
}

/// Result type for divergence operations.
pub type Result<T> = core::result::Result<T, DivError>;

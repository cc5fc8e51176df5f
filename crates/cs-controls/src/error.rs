//! Error types for controller setup and reporting.

use cs_core::Id;
use thiserror::Error;

/// Result type for control system operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while building or reporting on the control system.
///
/// All of these are setup-phase or reporting failures. Evaluating a controller
/// during a timestep never produces an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Malformed or truncated block in the configuration stream.
    #[error("Configuration format error at line {line} (offset {offset}): {what}")]
    ConfigFormat {
        offset: usize,
        line: usize,
        what: String,
    },

    /// A sensor or controller reference that does not exist.
    #[error("{owner} references unknown {target} {id}")]
    UnresolvedReference {
        owner: String,
        target: &'static str,
        id: Id,
    },

    /// Report header/row mismatch.
    #[error("Report stream error: {what}")]
    ReportShape { what: String },
}

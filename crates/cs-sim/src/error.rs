//! Error types for simulation operations.

use cs_controls::ControlError;
use cs_core::CoreError;
use thiserror::Error;

/// Errors encountered while setting up or stepping a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("Flow model error: {message}")]
    Flow { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

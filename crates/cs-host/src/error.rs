//! Error types for the host boundary.

use cs_sim::SimError;

/// Errors turned into `status: error` responses.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid override: {what}")]
    InvalidOverride { what: &'static str },

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("Simulation panicked: {message}")]
    Panic { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;

impl From<serde_json::Error> for HostError {
    fn from(e: serde_json::Error) -> Self {
        HostError::InvalidRequest(e.to_string())
    }
}

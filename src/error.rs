//! Crate error type

use thiserror::Error;

/// Errors surfaced by the simulation core
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid configuration or a contract violation (unknown gear mode, bad Δt)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Integrator produced a non-finite state component; the run cannot continue
    #[error("integration diverged: {component} = {value} at t = {time:.4}s")]
    IntegrationDiverged {
        component: &'static str,
        value: f64,
        time: f64,
    },

    /// Perception was handed a zero-area or malformed frame
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Encoding or writing an overlay image failed
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    /// Whether the simulation loop must stop on this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimError::InvalidFrame(_))
    }
}

pub type SimResult<T> = Result<T, SimError>;

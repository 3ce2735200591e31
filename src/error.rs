//! Error types for SoundTrace

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoundTraceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scene error: {0}")]
    Scene(String),

    #[error("Optimizer error: {0}")]
    Optimizer(String),
}

pub type Result<T> = std::result::Result<T, SoundTraceError>;

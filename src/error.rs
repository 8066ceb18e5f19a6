//! Error types for marga-plan.

use thiserror::Error;

/// Crate error type.
///
/// Planner *outcomes* (no solution, time exhausted, ...) are not errors:
/// they are reported through [`crate::search::PlanResult`]. This type covers
/// setup and infrastructure failures only.
#[derive(Error, Debug)]
pub enum MargaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<toml::de::Error> for MargaError {
    fn from(e: toml::de::Error) -> Self {
        MargaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MargaError>;

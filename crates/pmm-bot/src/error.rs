//! Error types for the bot binary.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] pmm_core::CoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] pmm_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pmm_telemetry::TelemetryError),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;

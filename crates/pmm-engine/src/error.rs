//! Error types for pmm-engine.

use thiserror::Error;

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Adapter error: {0}")]
    Adapter(#[from] pmm_adapter::AdapterError),

    #[error("Core error: {0}")]
    Core(#[from] pmm_core::CoreError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pmm_telemetry::TelemetryError),

    #[error("Executor not initialized; call initialize() first")]
    NotInitialized,

    #[error("Executor already running")]
    AlreadyRunning,
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

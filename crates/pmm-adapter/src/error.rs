//! Adapter error taxonomy.
//!
//! Every adapter operation returns `Result<_, AdapterError>`. The executor
//! never lets these unwind a tick: each call site classifies the error and
//! updates local state accordingly.

use thiserror::Error;

/// Categorised adapter failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// Network timeout, 5xx, WebSocket disconnect. Retryable; consecutive
    /// occurrences on the reconciliation path feed Safe Mode.
    #[error("Transient adapter failure: {0}")]
    Transient(String),

    /// Venue instruction to back off. Placements pause for the indicated
    /// delay; stream consumption continues.
    #[error("Rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Malformed parameters: price off tick, qty below minimum, bad symbol.
    /// Fatal for the operation; never retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Post-only order would have crossed at submission. Not an error:
    /// the side is cleared and the next tick decides again.
    #[error("Post-only order rejected (would cross)")]
    PostOnlyRejected,

    /// Cancel target no longer exists. Treated as success.
    #[error("Order not found")]
    OrderNotFound,

    /// Account cannot support the order.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Venue-side position limit reached.
    #[error("Position limit: {0}")]
    PositionLimit(String),

    /// Timeout without a reply; the outcome is genuinely unknown and the
    /// next reconciliation tick resolves it.
    #[error("Unknown outcome: {0}")]
    Unknown(String),
}

impl AdapterError {
    /// Failures that count toward the Safe Mode threshold.
    pub fn counts_toward_safe_mode(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Unknown(_))
    }

    /// Failures that pause the engine until operator intervention.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::InsufficientFunds(_) | Self::PositionLimit(_))
    }

    /// The order may exist on the venue despite the failure.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_mode_classification() {
        assert!(AdapterError::Transient("timeout".into()).counts_toward_safe_mode());
        assert!(AdapterError::Unknown("no reply".into()).counts_toward_safe_mode());
        assert!(!AdapterError::PostOnlyRejected.counts_toward_safe_mode());
        assert!(!AdapterError::InvalidRequest("bad px".into()).counts_toward_safe_mode());
    }

    #[test]
    fn test_unhealthy_classification() {
        assert!(AdapterError::InsufficientFunds("margin".into()).is_unhealthy());
        assert!(AdapterError::PositionLimit("cap".into()).is_unhealthy());
        assert!(!AdapterError::Transient("503".into()).is_unhealthy());
    }

    #[test]
    fn test_unknown_outcome() {
        assert!(AdapterError::Unknown("deadline".into()).outcome_unknown());
        assert!(!AdapterError::OrderNotFound.outcome_unknown());
    }
}

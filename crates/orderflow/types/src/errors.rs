//! Error types for the work-order engine

use crate::Hours;

/// Errors surfaced by gated transitions
///
/// Every variant except `Internal` is a caller-correctable failure: the
/// transition aborted with no partial effect and the caller may fix the
/// input and resubmit.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("role '{role}' is not permitted to perform '{action}'")]
    PermissionDenied { role: String, action: String },

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The ledger invariant would be violated. Carries the exact overage
    /// so a client can offer the "file a request for N extra hours" path
    /// without a second round trip.
    #[error("hours budget exceeded by {overage}")]
    BudgetExceeded { overage: Hours },

    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

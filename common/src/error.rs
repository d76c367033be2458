//! Pipeline error taxonomy
//!
//! Only `TransientUpstream` is ever retried internally; everything else
//! propagates to the caller as a typed result. Quality-gate rejection is a
//! business outcome (`GateDecision::Rejected`), not an error, and a cycle
//! with zero surviving signals is a normal `CycleReport`.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Why a request collided with concurrent or prior state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictKind {
    #[error("signal is already executing or executed")]
    AlreadyExecuting,
    #[error("signal status changed concurrently")]
    StaleTransition,
    #[error("signal has expired")]
    SignalExpired,
    #[error("an execution plan already exists for this signal")]
    PlanExists,
    #[error("plan is not awaiting confirmation")]
    PlanNotConfirmable,
    #[error("confirmation token has expired")]
    TokenExpired,
    #[error("confirmation token was already used")]
    TokenReused,
    #[error("confirmation token does not match this plan")]
    TokenMismatch,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upstream scan/generation call kept failing after bounded retries.
    #[error("{stage} upstream call failed after {attempts} attempt(s): {source}")]
    TransientUpstream {
        stage: &'static str,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// Generation payload violated the schema contract; discarded, not retried.
    #[error("malformed generation payload: {detail}")]
    MalformedResponse { detail: String },

    /// Signal cannot be routed to execution in the user's current setup.
    #[error("signal is not executable: {guidance}")]
    CompatibilityBlock { guidance: String },

    /// Equity cannot cover even one share at the signal's stop distance.
    #[error(
        "capital insufficient: per-share risk {risk_per_share} exceeds allowed risk {max_allowed_risk}"
    )]
    CapitalInsufficient {
        risk_per_share: Decimal,
        max_allowed_risk: Decimal,
    },

    /// Double execution attempt, stale state or a bad confirmation token.
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictKind),

    /// Broker collaborator failure, surfaced verbatim and never auto-retried.
    #[error("broker collaborator error: {reason}")]
    BrokerSubmission { reason: String },

    #[error("signal {0} not found")]
    SignalNotFound(Uuid),

    #[error("plan {0} not found")]
    PlanNotFound(Uuid),
}

impl PipelineError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, PipelineError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

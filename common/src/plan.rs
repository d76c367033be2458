//! Execution plan entity and its confirmation state machine

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order type the plan will submit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

/// Single-use token gating the confirm step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationToken {
    pub token: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConfirmationToken {
    pub fn issue(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token: Uuid::new_v4(),
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn matches(&self, presented: Uuid) -> bool {
        self.token == presented
    }
}

/// Time window in which the plan's order may be submitted
///
/// Must fall within market hours; computed by the planner at draft time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ValidityWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// State of an execution plan
///
/// DRAFTED -> AWAITING_CONFIRMATION -> EXECUTING -> {EXECUTED | EXECUTION_FAILED}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanState {
    Drafted,
    AwaitingConfirmation,
    Executing,
    Executed,
    ExecutionFailed,
}

impl PlanState {
    pub fn can_transition_to(self, next: PlanState) -> bool {
        use PlanState::*;
        matches!(
            (self, next),
            (Drafted, AwaitingConfirmation)
                | (AwaitingConfirmation, Executing)
                | (Executing, Executed)
                | (Executing, ExecutionFailed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PlanState::Executed | PlanState::ExecutionFailed)
    }
}

/// The confirmed, broker-bound instantiation of one ACTIVE signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: Uuid,
    /// Exclusive 1:1 owner of the signal for the plan's lifetime
    pub signal_id: Uuid,
    pub broker_account_id: Uuid,
    pub order_type: OrderType,
    pub adjusted_quantity: u64,
    /// Maximum monetary loss if the stop is hit at the planned quantity
    pub capital_at_risk: Decimal,
    pub state: PlanState,
    pub confirmation: Option<ConfirmationToken>,
    pub validity: ValidityWindow,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

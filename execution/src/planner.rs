// Execution Planner
// Assembles the broker-bound plan for a sized signal and drives its
// confirmation state machine

use chrono::{DateTime, Days, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use common::{
    BrokerAccount, ConfirmationToken, ExecutionPlan, OrderType, PlanState, Signal, TimeFrame,
    ValidityWindow,
};

use crate::sizing::Sizing;

/// Configuration for plan assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Confirmation token lifetime (seconds)
    pub token_ttl_secs: u64,
    /// Session open, exchange-local wall clock
    pub market_open: NaiveTime,
    /// Session close, exchange-local wall clock
    pub market_close: NaiveTime,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 300,
            market_open: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            market_close: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
        }
    }
}

pub struct ExecutionPlanner {
    config: PlannerConfig,
}

impl ExecutionPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Assemble a DRAFTED plan for a sized signal.
    pub fn draft(
        &self,
        signal: &Signal,
        sizing: &Sizing,
        account: &BrokerAccount,
        now: DateTime<Utc>,
    ) -> ExecutionPlan {
        let validity = self.validity_window(now);
        // intraday signals inside the session go straight to market; everything
        // else rests as a limit at the entry price
        let order_type = if signal.time_frame == TimeFrame::Intraday && validity.contains(now) {
            OrderType::Market
        } else {
            OrderType::Limit
        };

        debug!(
            signal_id = %signal.id,
            broker = %account.broker,
            quantity = sizing.quantity,
            ?order_type,
            "plan drafted"
        );

        ExecutionPlan {
            id: Uuid::new_v4(),
            signal_id: signal.id,
            broker_account_id: account.id,
            order_type,
            adjusted_quantity: sizing.quantity,
            capital_at_risk: sizing.capital_at_risk,
            state: PlanState::Drafted,
            confirmation: None,
            validity,
            created_at: now,
            executed_at: None,
            failure_reason: None,
        }
    }

    /// Surface a drafted plan for confirmation: issue the single-use token
    /// and move DRAFTED -> AWAITING_CONFIRMATION.
    pub fn offer(&self, plan: &mut ExecutionPlan, now: DateTime<Utc>) -> Uuid {
        let token = ConfirmationToken::issue(
            now,
            Duration::seconds(self.config.token_ttl_secs as i64),
        );
        let presented = token.token;
        plan.confirmation = Some(token);
        plan.state = PlanState::AwaitingConfirmation;
        presented
    }

    /// Next submission window that falls entirely within market hours.
    fn validity_window(&self, now: DateTime<Utc>) -> ValidityWindow {
        let today = now.date_naive();
        let open = today.and_time(self.config.market_open).and_utc();
        let close = today.and_time(self.config.market_close).and_utc();

        if now < open {
            ValidityWindow { start: open, end: close }
        } else if now < close {
            ValidityWindow { start: now, end: close }
        } else {
            let next = today + Days::new(1);
            ValidityWindow {
                start: next.and_time(self.config.market_open).and_utc(),
                end: next.and_time(self.config.market_close).and_utc(),
            }
        }
    }
}

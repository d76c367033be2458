use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::MarketSegment;

/// Trade direction of a signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

/// Holding horizon of a signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeFrame {
    Intraday,
    Swing,
}

/// Lifecycle status of a signal
///
/// Transitions are monotonic: CANDIDATE -> {REJECTED | ACTIVE} ->
/// {EXPIRED | EXECUTING} -> {EXECUTED | EXECUTION_FAILED}. There are no
/// backward transitions; superseded records are status-marked, never deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Candidate,
    Rejected,
    Active,
    Expired,
    Executing,
    Executed,
    ExecutionFailed,
}

impl SignalStatus {
    /// Whether the status lattice allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SignalStatus) -> bool {
        use SignalStatus::*;
        matches!(
            (self, next),
            (Candidate, Rejected)
                | (Candidate, Active)
                | (Active, Expired)
                | (Active, Executing)
                | (Executing, Executed)
                | (Executing, ExecutionFailed)
        )
    }

    pub fn is_terminal(self) -> bool {
        use SignalStatus::*;
        matches!(self, Rejected | Expired | Executed | ExecutionFailed)
    }
}

/// Broker/tier compatibility classification attached to an active signal
///
/// Recorded at cycle time and re-evaluated on every execution-planning
/// attempt, since broker connection state may have changed in between.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Compatibility {
    /// Can be routed to the user's primary broker for live execution
    Executable,
    /// Surfaced to the user as a notification only
    NotifyOnly { reason: String },
    /// Cannot be executed at all in the current configuration
    Blocked { reason: String },
}

impl Compatibility {
    pub fn is_executable(&self) -> bool {
        matches!(self, Compatibility::Executable)
    }

    /// Actionable guidance for the user when not executable.
    pub fn guidance(&self) -> Option<&str> {
        match self {
            Compatibility::Executable => None,
            Compatibility::NotifyOnly { reason } | Compatibility::Blocked { reason } => {
                Some(reason)
            }
        }
    }
}

/// One candidate or active trade idea
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    /// Tenant the signal was generated for; filtering only, tenant
    /// resolution belongs to the surrounding application.
    pub tenant_id: Uuid,
    pub symbol: String,
    pub exchange: String,
    pub action: SignalAction,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_loss: Decimal,
    pub quantity: u64,
    pub time_frame: TimeFrame,
    /// Model confidence, 0 to 100
    pub confidence: f64,
    pub strategy: String,
    pub rationale: String,
    /// Derived: |target - entry| / |entry - stop|
    pub risk_reward_ratio: Decimal,
    /// Derived: |target - entry| * quantity
    pub potential_return: Decimal,
    pub status: SignalStatus,
    pub compatibility: Option<Compatibility>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// Monetary distance between entry and stop for one share.
    pub fn risk_per_share(&self) -> Decimal {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Check the price-ordering invariant for this signal's action.
    ///
    /// BUY: stop < entry < target. SELL: target < entry < stop. HOLD signals
    /// carry no executable price structure and never pass.
    pub fn price_ordering_ok(&self) -> bool {
        match self.action {
            SignalAction::Buy => {
                self.stop_loss < self.entry_price && self.entry_price < self.target_price
            }
            SignalAction::Sell => {
                self.target_price < self.entry_price && self.entry_price < self.stop_loss
            }
            SignalAction::Hold => false,
        }
    }

    /// Recompute the derived fields from the stored prices and quantity.
    ///
    /// Must be called after any price or quantity change so the stored ratio
    /// never drifts from the one validation would compute.
    pub fn recompute_derived(&mut self) {
        self.risk_reward_ratio = Self::risk_reward(
            self.entry_price,
            self.target_price,
            self.stop_loss,
        );
        self.potential_return =
            (self.target_price - self.entry_price).abs() * Decimal::from(self.quantity);
    }

    /// Risk/reward ratio from raw prices; zero when the stop sits on entry.
    pub fn risk_reward(entry: Decimal, target: Decimal, stop: Decimal) -> Decimal {
        let risk = (entry - stop).abs();
        if risk.is_zero() {
            return Decimal::ZERO;
        }
        (target - entry).abs() / risk
    }

    /// Broker segment this signal needs for live execution.
    pub fn required_segment(&self) -> MarketSegment {
        match self.time_frame {
            TimeFrame::Intraday => MarketSegment::Intraday,
            TimeFrame::Swing => MarketSegment::Delivery,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal(action: SignalAction, entry: Decimal, target: Decimal, stop: Decimal) -> Signal {
        let mut s = Signal {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            symbol: "RELIANCE".to_string(),
            exchange: "NSE".to_string(),
            action,
            entry_price: entry,
            target_price: target,
            stop_loss: stop,
            quantity: 100,
            time_frame: TimeFrame::Swing,
            confidence: 80.0,
            strategy: "breakout".to_string(),
            rationale: "test".to_string(),
            risk_reward_ratio: Decimal::ZERO,
            potential_return: Decimal::ZERO,
            status: SignalStatus::Candidate,
            compatibility: None,
            rejection_reason: None,
            created_at: Utc::now(),
            expires_at: None,
        };
        s.recompute_derived();
        s
    }

    #[test]
    fn test_risk_reward_buy() {
        let s = signal(SignalAction::Buy, dec!(100), dec!(106), dec!(98));
        assert_eq!(s.risk_reward_ratio, dec!(3));
        assert_eq!(s.potential_return, dec!(600));
    }

    #[test]
    fn test_price_ordering() {
        assert!(signal(SignalAction::Buy, dec!(100), dec!(106), dec!(98)).price_ordering_ok());
        assert!(signal(SignalAction::Sell, dec!(100), dec!(94), dec!(102)).price_ordering_ok());
        // inverted target for a BUY
        assert!(!signal(SignalAction::Buy, dec!(100), dec!(95), dec!(98)).price_ordering_ok());
        // HOLD never executes
        assert!(!signal(SignalAction::Hold, dec!(100), dec!(106), dec!(98)).price_ordering_ok());
    }

    #[test]
    fn test_status_lattice_is_monotonic() {
        use SignalStatus::*;
        assert!(Candidate.can_transition_to(Active));
        assert!(Candidate.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Executing));
        assert!(Active.can_transition_to(Expired));
        assert!(Executing.can_transition_to(Executed));
        assert!(Executing.can_transition_to(ExecutionFailed));

        // no backward transitions
        assert!(!Active.can_transition_to(Candidate));
        assert!(!Executing.can_transition_to(Active));
        assert!(!Executed.can_transition_to(Executing));
        assert!(!Rejected.can_transition_to(Active));
        assert!(Executed.is_terminal());
        assert!(!Active.is_terminal());
    }

    #[test]
    fn test_required_segment() {
        let mut s = signal(SignalAction::Buy, dec!(100), dec!(106), dec!(98));
        assert_eq!(s.required_segment(), MarketSegment::Delivery);
        s.time_frame = TimeFrame::Intraday;
        assert_eq!(s.required_segment(), MarketSegment::Intraday);
    }

    #[test]
    fn test_expiry() {
        let mut s = signal(SignalAction::Buy, dec!(100), dec!(106), dec!(98));
        assert!(!s.is_expired(Utc::now()));
        s.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        assert!(s.is_expired(Utc::now()));
    }
}

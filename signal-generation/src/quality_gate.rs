// Quality Gate
// Deterministic numeric/logical filter between CANDIDATE and ACTIVE

use rust_decimal::Decimal;
use tracing::debug;

use common::{RiskProfile, Signal};

/// Why the gate rejected a candidate signal
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    RiskRewardTooLow { ratio: Decimal, min: Decimal },
    StopLossTooWide { stop_pct: Decimal, max: Decimal },
    ConfidenceTooLow { confidence: f64, min: f64 },
    InvalidPriceOrdering,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::RiskRewardTooLow { ratio, min } => {
                write!(f, "risk/reward {ratio} below minimum {min}")
            }
            RejectReason::StopLossTooWide { stop_pct, max } => {
                write!(f, "stop distance {stop_pct} of entry exceeds cap {max}")
            }
            RejectReason::ConfidenceTooLow { confidence, min } => {
                write!(f, "confidence {confidence:.1} below minimum {min:.1}")
            }
            RejectReason::InvalidPriceOrdering => {
                write!(f, "entry/target/stop ordering invalid for action")
            }
        }
    }
}

/// Gate verdict; rejection is a business outcome, not an error
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accepted,
    Rejected(RejectReason),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted)
    }
}

/// Pure, deterministic quality gate over a signal and a risk profile
pub struct QualityGate;

impl QualityGate {
    /// Evaluate one candidate. The ratio is recomputed from the stored
    /// prices so the value used here can never drift from the record.
    pub fn evaluate(signal: &Signal, profile: &RiskProfile) -> GateDecision {
        if !signal.price_ordering_ok() {
            return GateDecision::Rejected(RejectReason::InvalidPriceOrdering);
        }

        let ratio = Signal::risk_reward(
            signal.entry_price,
            signal.target_price,
            signal.stop_loss,
        );
        if ratio < profile.min_risk_reward_ratio {
            return GateDecision::Rejected(RejectReason::RiskRewardTooLow {
                ratio,
                min: profile.min_risk_reward_ratio,
            });
        }

        let stop_pct = signal.risk_per_share() / signal.entry_price;
        if stop_pct > profile.max_stop_loss_pct {
            return GateDecision::Rejected(RejectReason::StopLossTooWide {
                stop_pct,
                max: profile.max_stop_loss_pct,
            });
        }

        if signal.confidence < profile.min_confidence {
            return GateDecision::Rejected(RejectReason::ConfidenceTooLow {
                confidence: signal.confidence,
                min: profile.min_confidence,
            });
        }

        debug!(signal_id = %signal.id, ratio = %ratio, "signal passed quality gate");
        GateDecision::Accepted
    }
}

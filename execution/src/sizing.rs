// Risk Sizer
// Bounds position size so a stopped-out trade never loses more than the
// profile's per-trade risk budget

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use common::{PipelineError, Result, RiskProfile, Signal};

/// Result of sizing one signal
#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    pub quantity: u64,
    pub capital_at_risk: Decimal,
    pub potential_return: Decimal,
    /// Whether the quantity was reduced from the signal's original size
    pub reduced: bool,
}

pub struct RiskSizer;

impl RiskSizer {
    /// Compute the risk-bounded quantity for an active, executable signal.
    ///
    /// Pure function of the stored prices, quantity and profile, so
    /// re-running on an unchanged signal always returns the same result.
    /// A quantity that floors to zero means the account cannot carry even
    /// one share at this stop distance; the caller reclassifies the signal
    /// as blocked instead of proceeding.
    pub fn size(signal: &Signal, profile: &RiskProfile) -> Result<Sizing> {
        let per_share = signal.risk_per_share();
        let max_allowed = profile.max_allowed_risk();

        if per_share <= Decimal::ZERO || per_share > max_allowed {
            return Err(PipelineError::CapitalInsufficient {
                risk_per_share: per_share,
                max_allowed_risk: max_allowed,
            });
        }

        let requested_risk = per_share * Decimal::from(signal.quantity);
        let quantity = if requested_risk > max_allowed {
            let floored = (max_allowed / per_share)
                .floor()
                .to_u64()
                .unwrap_or(0);
            info!(
                signal_id = %signal.id,
                requested = signal.quantity,
                sized = floored,
                "quantity reduced to fit risk budget"
            );
            floored
        } else {
            signal.quantity
        };

        if quantity == 0 {
            return Err(PipelineError::CapitalInsufficient {
                risk_per_share: per_share,
                max_allowed_risk: max_allowed,
            });
        }

        let capital_at_risk = per_share * Decimal::from(quantity);
        let potential_return =
            (signal.target_price - signal.entry_price).abs() * Decimal::from(quantity);
        debug!(
            signal_id = %signal.id,
            quantity,
            capital_at_risk = %capital_at_risk,
            "signal sized"
        );

        Ok(Sizing {
            quantity,
            capital_at_risk,
            potential_return,
            reduced: quantity < signal.quantity,
        })
    }
}

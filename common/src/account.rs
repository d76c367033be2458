//! Broker account, risk profile and subscription tier types
//!
//! All of these are owned by external collaborators and consumed read-only
//! by the pipeline.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection state of a linked broker account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    TokenExpired,
}

/// Trading segment a broker account may support
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketSegment {
    Delivery,
    Intraday,
    Futures,
    Options,
}

/// A user's linked broker account (read-only to the pipeline)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub id: Uuid,
    pub broker: String,
    pub supported_segments: Vec<MarketSegment>,
    pub connection_status: ConnectionStatus,
    pub is_primary: bool,
}

impl BrokerAccount {
    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }

    pub fn supports(&self, segment: MarketSegment) -> bool {
        self.supported_segments.contains(&segment)
    }
}

/// Subscription tier with explicit entitlement lookups
///
/// A closed enum rather than runtime capability probing: every gating
/// decision in the pipeline goes through one of the methods below.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubscriptionTier {
    Free,
    Pro,
    Elite,
}

impl SubscriptionTier {
    /// Live broker execution is a paid entitlement.
    pub fn allows_live_execution(self) -> bool {
        matches!(self, SubscriptionTier::Pro | SubscriptionTier::Elite)
    }

    /// Free accounts only see swing signals; intraday is a paid entitlement.
    pub fn allows_time_frame(self, time_frame: crate::signal::TimeFrame) -> bool {
        match self {
            SubscriptionTier::Free => time_frame == crate::signal::TimeFrame::Swing,
            SubscriptionTier::Pro | SubscriptionTier::Elite => true,
        }
    }
}

/// Per-user risk limits (read-only input from the risk collaborator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Total account equity available for sizing
    pub account_equity: Decimal,
    /// Maximum fraction of equity risked on a single trade
    pub max_risk_pct_per_trade: Decimal,
    /// Minimum acceptable risk/reward ratio
    pub min_risk_reward_ratio: Decimal,
    /// Maximum stop-loss distance as a fraction of entry price
    pub max_stop_loss_pct: Decimal,
    /// Minimum acceptable signal confidence (0 to 100)
    pub min_confidence: f64,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self {
            account_equity: dec!(100000),
            max_risk_pct_per_trade: dec!(0.05),
            min_risk_reward_ratio: dec!(2.0),
            max_stop_loss_pct: dec!(0.05),
            min_confidence: 70.0,
        }
    }
}

impl RiskProfile {
    /// Largest monetary loss a single trade may expose.
    pub fn max_allowed_risk(&self) -> Decimal {
        self.account_equity * self.max_risk_pct_per_trade
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::TimeFrame;

    #[test]
    fn test_default_profile() {
        let profile = RiskProfile::default();
        assert_eq!(profile.max_allowed_risk(), dec!(5000));
        assert_eq!(profile.min_confidence, 70.0);
    }

    #[test]
    fn test_tier_entitlements() {
        assert!(!SubscriptionTier::Free.allows_live_execution());
        assert!(SubscriptionTier::Pro.allows_live_execution());
        assert!(SubscriptionTier::Elite.allows_live_execution());

        assert!(SubscriptionTier::Free.allows_time_frame(TimeFrame::Swing));
        assert!(!SubscriptionTier::Free.allows_time_frame(TimeFrame::Intraday));
        assert!(SubscriptionTier::Pro.allows_time_frame(TimeFrame::Intraday));
    }

    #[test]
    fn test_account_support() {
        let account = BrokerAccount {
            id: Uuid::new_v4(),
            broker: "zerodha".to_string(),
            supported_segments: vec![MarketSegment::Delivery, MarketSegment::Intraday],
            connection_status: ConnectionStatus::Connected,
            is_primary: true,
        };
        assert!(account.is_connected());
        assert!(account.supports(MarketSegment::Intraday));
        assert!(!account.supports(MarketSegment::Options));
    }
}

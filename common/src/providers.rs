//! Collaborator provider traits shared across pipeline layers
//!
//! Risk and entitlement data are owned by external services; the traits
//! return `anyhow::Result` so arbitrary collaborator failures travel as
//! error sources and get classified at the call site.

use async_trait::async_trait;
use uuid::Uuid;

use crate::account::{RiskProfile, SubscriptionTier};

#[async_trait]
pub trait RiskProvider: Send + Sync {
    async fn risk_profile(&self, user_id: Uuid) -> anyhow::Result<RiskProfile>;
}

#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    async fn tier(&self, user_id: Uuid) -> anyhow::Result<SubscriptionTier>;
}

/// Fixed-profile provider for tests, demos and local development.
#[derive(Debug, Clone)]
pub struct FixedRiskProvider(pub RiskProfile);

#[async_trait]
impl RiskProvider for FixedRiskProvider {
    async fn risk_profile(&self, _user_id: Uuid) -> anyhow::Result<RiskProfile> {
        Ok(self.0.clone())
    }
}

/// Fixed-tier provider for tests, demos and local development.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntitlements(pub SubscriptionTier);

#[async_trait]
impl EntitlementProvider for FixedEntitlements {
    async fn tier(&self, _user_id: Uuid) -> anyhow::Result<SubscriptionTier> {
        Ok(self.0)
    }
}

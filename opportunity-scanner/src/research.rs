use async_trait::async_trait;

use common::{Opportunity, TimeFrame};

/// External market-research capability
///
/// Implementations wrap whatever discovery service the product runs on
/// (research/LLM-backed). The scanner treats every error as transient and
/// applies its own timeout and retry policy around each call.
#[async_trait]
pub trait MarketResearch: Send + Sync {
    async fn scan(
        &self,
        market: &str,
        time_frame: TimeFrame,
        limit: usize,
    ) -> anyhow::Result<Vec<Opportunity>>;
}

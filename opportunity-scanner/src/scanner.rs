// Opportunity Scanner
// Bounded, retrying wrapper around the market-research collaborator

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{Opportunity, TimeFrame};

use crate::research::MarketResearch;

/// Configuration for the opportunity scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Per-attempt timeout for the research call (seconds)
    pub timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,
    /// Symbol-universe bound per cycle
    pub max_opportunities: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 500,
            max_opportunities: 10,
        }
    }
}

/// Result of one scan stage
///
/// `Degraded` is a per-cycle outcome, not an error: the orchestrator skips
/// the remaining stages and the next scheduled cycle proceeds normally.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Complete(Vec<Opportunity>),
    Degraded { attempts: u32, reason: String },
}

impl ScanOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ScanOutcome::Degraded { .. })
    }
}

/// Scanner stage wrapping the research collaborator
pub struct OpportunityScanner {
    research: Arc<dyn MarketResearch>,
    config: ScannerConfig,
}

impl OpportunityScanner {
    pub fn new(research: Arc<dyn MarketResearch>, config: ScannerConfig) -> Self {
        Self { research, config }
    }

    /// Scan one market/time-frame pair for candidate opportunities.
    pub async fn scan_market(&self, market: &str, time_frame: TimeFrame) -> ScanOutcome {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut attempts = 0;
        let mut last_failure = String::new();

        while attempts <= self.config.max_retries {
            if attempts > 0 {
                let backoff = Duration::from_millis(
                    self.config.retry_base_delay_ms << (attempts - 1),
                );
                debug!(market, attempt = attempts + 1, ?backoff, "retrying scan");
                tokio::time::sleep(backoff).await;
            }
            attempts += 1;

            match tokio::time::timeout(
                timeout,
                self.research
                    .scan(market, time_frame, self.config.max_opportunities),
            )
            .await
            {
                Ok(Ok(mut opportunities)) => {
                    opportunities.truncate(self.config.max_opportunities);
                    info!(
                        market,
                        count = opportunities.len(),
                        "scan completed"
                    );
                    return ScanOutcome::Complete(opportunities);
                }
                Ok(Err(e)) => {
                    warn!(market, attempt = attempts, error = %e, "scan attempt failed");
                    last_failure = e.to_string();
                }
                Err(_) => {
                    warn!(
                        market,
                        attempt = attempts,
                        timeout_secs = self.config.timeout_secs,
                        "scan attempt timed out"
                    );
                    last_failure = format!("timed out after {}s", self.config.timeout_secs);
                }
            }
        }

        warn!(market, attempts, reason = %last_failure, "scan degraded");
        ScanOutcome::Degraded {
            attempts,
            reason: last_failure,
        }
    }
}

// Signal Generator
// Calls the external generation capability per opportunity, validates the
// payload against the schema contract and persists the CANDIDATE signal

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::{
    Opportunity, PipelineError, Result, Signal, SignalAction, SignalStatus, TimeFrame,
};

use crate::store::SignalStore;

/// Asset-class context the generation capability receives alongside the
/// opportunity descriptor
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub tenant_id: Uuid,
    pub market: String,
    pub time_frame: TimeFrame,
    /// Expiry stamped onto the generated signal, set by the orchestrator
    pub expires_at: Option<DateTime<Utc>>,
}

/// External generation capability
///
/// Returns the raw payload; the generator owns schema validation. Transport
/// errors are transient and retried, malformed payloads are not.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    async fn generate(
        &self,
        opportunity: &Opportunity,
        context: &GenerationContext,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Schema contract for a generated signal payload
///
/// Every field is required and unknown fields are rejected; a payload that
/// fails this contract is a generation defect, discarded without retry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalPayload {
    pub action: SignalAction,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_loss: Decimal,
    pub quantity: u64,
    pub time_frame: TimeFrame,
    pub confidence: f64,
    pub strategy: String,
    pub rationale: String,
}

impl SignalPayload {
    fn check_ranges(&self) -> std::result::Result<(), String> {
        if self.entry_price <= Decimal::ZERO
            || self.target_price <= Decimal::ZERO
            || self.stop_loss <= Decimal::ZERO
        {
            return Err("prices must be positive".to_string());
        }
        if self.quantity == 0 {
            return Err("quantity must be at least 1".to_string());
        }
        if !(0.0..=100.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 100]", self.confidence));
        }
        Ok(())
    }
}

/// Configuration for the generation stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Per-attempt timeout for the generation call (seconds)
    pub timeout_secs: u64,
    /// Retries after the first failed attempt (transport errors only)
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }
}

/// Generation stage: one opportunity in, zero or one CANDIDATE signal out
pub struct SignalGenerator {
    capability: Arc<dyn GenerationCapability>,
    store: Arc<dyn SignalStore>,
    config: GeneratorConfig,
}

impl SignalGenerator {
    pub fn new(
        capability: Arc<dyn GenerationCapability>,
        store: Arc<dyn SignalStore>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            capability,
            store,
            config,
        }
    }

    /// Generate and persist a candidate signal for one opportunity.
    ///
    /// The signal is persisted in CANDIDATE status before this returns, so a
    /// crash later in the cycle cannot lose it.
    pub async fn generate_for(
        &self,
        opportunity: &Opportunity,
        context: &GenerationContext,
    ) -> Result<Signal> {
        let payload_value = self.call_with_retry(opportunity, context).await?;
        let payload = Self::validate(payload_value)?;

        let mut signal = Signal {
            id: Uuid::new_v4(),
            tenant_id: context.tenant_id,
            symbol: opportunity.symbol.clone(),
            exchange: opportunity.exchange.clone(),
            action: payload.action,
            entry_price: payload.entry_price,
            target_price: payload.target_price,
            stop_loss: payload.stop_loss,
            quantity: payload.quantity,
            time_frame: payload.time_frame,
            confidence: payload.confidence,
            strategy: payload.strategy,
            rationale: payload.rationale,
            risk_reward_ratio: Decimal::ZERO,
            potential_return: Decimal::ZERO,
            status: SignalStatus::Candidate,
            compatibility: None,
            rejection_reason: None,
            created_at: Utc::now(),
            expires_at: context.expires_at,
        };
        signal.recompute_derived();

        self.store.insert(signal.clone()).await?;
        info!(
            signal_id = %signal.id,
            symbol = %signal.symbol,
            action = ?signal.action,
            confidence = signal.confidence,
            "candidate signal persisted"
        );
        Ok(signal)
    }

    /// Validate a raw payload against the schema contract.
    fn validate(value: serde_json::Value) -> Result<SignalPayload> {
        let payload: SignalPayload =
            serde_json::from_value(value).map_err(|e| PipelineError::MalformedResponse {
                detail: e.to_string(),
            })?;
        payload
            .check_ranges()
            .map_err(|detail| PipelineError::MalformedResponse { detail })?;
        Ok(payload)
    }

    async fn call_with_retry(
        &self,
        opportunity: &Opportunity,
        context: &GenerationContext,
    ) -> Result<serde_json::Value> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut attempts = 0;
        let mut last_err = anyhow::anyhow!("generation never attempted");

        while attempts <= self.config.max_retries {
            if attempts > 0 {
                let backoff =
                    Duration::from_millis(self.config.retry_base_delay_ms << (attempts - 1));
                debug!(symbol = %opportunity.symbol, attempt = attempts + 1, "retrying generation");
                tokio::time::sleep(backoff).await;
            }
            attempts += 1;

            match tokio::time::timeout(timeout, self.capability.generate(opportunity, context))
                .await
            {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    warn!(symbol = %opportunity.symbol, attempt = attempts, error = %e, "generation attempt failed");
                    last_err = e;
                }
                Err(_) => {
                    warn!(
                        symbol = %opportunity.symbol,
                        attempt = attempts,
                        timeout_secs = self.config.timeout_secs,
                        "generation attempt timed out"
                    );
                    last_err =
                        anyhow::anyhow!("timed out after {}s", self.config.timeout_secs);
                }
            }
        }

        Err(PipelineError::TransientUpstream {
            stage: "generation",
            attempts,
            source: last_err,
        })
    }
}

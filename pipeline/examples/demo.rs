//! Example usage of the signal decision pipeline
//!
//! This example demonstrates:
//! 1. Wiring the pipeline with stub collaborators
//! 2. Running one scan/generate/validate cycle
//! 3. Listing the surviving active signals
//! 4. Requesting an execution plan and confirming it

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, Level};
use uuid::Uuid;

use common::{
    BrokerAccount, ConnectionStatus, ExecutionPlan, FixedEntitlements, FixedRiskProvider,
    MarketSegment, NullNotifier, Opportunity, RiskProfile, Signal, SubscriptionTier, TimeFrame,
};
use execution::{BrokerGateway, ExecutionOutcome, InMemoryPlanStore, SubmitOutcome};
use opportunity_scanner::MarketResearch;
use pipeline::{CancelToken, Pipeline, PipelineConfig};
use signal_generation::{GenerationCapability, GenerationContext, InMemorySignalStore};

/// Canned research results standing in for the discovery service
struct DemoResearch;

#[async_trait]
impl MarketResearch for DemoResearch {
    async fn scan(
        &self,
        _market: &str,
        _time_frame: TimeFrame,
        _limit: usize,
    ) -> Result<Vec<Opportunity>> {
        Ok(vec![
            Opportunity {
                symbol: "RELIANCE".to_string(),
                exchange: "NSE".to_string(),
                rationale: "breakout above 20-day range on volume".to_string(),
            },
            Opportunity {
                symbol: "TATASTEEL".to_string(),
                exchange: "NSE".to_string(),
                rationale: "oversold bounce setup".to_string(),
            },
        ])
    }
}

/// Canned payloads standing in for the generation capability
struct DemoGeneration {
    payloads: HashMap<String, serde_json::Value>,
}

#[async_trait]
impl GenerationCapability for DemoGeneration {
    async fn generate(
        &self,
        opportunity: &Opportunity,
        _context: &GenerationContext,
    ) -> Result<serde_json::Value> {
        self.payloads
            .get(&opportunity.symbol)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no payload for {}", opportunity.symbol))
    }
}

/// Broker stub that accepts every order
struct DemoBroker {
    account: BrokerAccount,
}

#[async_trait]
impl BrokerGateway for DemoBroker {
    async fn primary_account(&self, _user_id: Uuid) -> Result<Option<BrokerAccount>> {
        Ok(Some(self.account.clone()))
    }

    async fn submit_order(
        &self,
        plan: &ExecutionPlan,
        signal: &Signal,
    ) -> Result<SubmitOutcome> {
        info!(
            symbol = %signal.symbol,
            quantity = plan.adjusted_quantity,
            "demo broker accepted order"
        );
        Ok(SubmitOutcome::Accepted {
            broker_order_id: format!("demo-{}", plan.id),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Signal Decision Pipeline - Example");
    info!("==================================");

    let payloads = HashMap::from([
        (
            "RELIANCE".to_string(),
            json!({
                "action": "BUY",
                "entry_price": 2900,
                "target_price": 3100,
                "stop_loss": 2840,
                "quantity": 50,
                "time_frame": "SWING",
                "confidence": 84.0,
                "strategy": "breakout",
                "rationale": "range expansion with sector strength"
            }),
        ),
        (
            "TATASTEEL".to_string(),
            json!({
                "action": "BUY",
                "entry_price": 150,
                "target_price": 153,
                "stop_loss": 144,
                "quantity": 500,
                "time_frame": "SWING",
                "confidence": 75.0,
                "strategy": "mean-reversion",
                "rationale": "bounce off support"
            }),
        ),
    ]);

    let account = BrokerAccount {
        id: Uuid::new_v4(),
        broker: "zerodha".to_string(),
        supported_segments: vec![MarketSegment::Delivery, MarketSegment::Intraday],
        connection_status: ConnectionStatus::Connected,
        is_primary: true,
    };

    let signals = Arc::new(InMemorySignalStore::new());
    let pipeline = Pipeline::new(
        Arc::new(DemoResearch),
        Arc::new(DemoGeneration { payloads }),
        signals,
        Arc::new(InMemoryPlanStore::new()),
        Arc::new(DemoBroker { account }),
        Arc::new(FixedRiskProvider(RiskProfile {
            account_equity: rust_decimal_macros::dec!(500000),
            ..RiskProfile::default()
        })),
        Arc::new(FixedEntitlements(SubscriptionTier::Pro)),
        Arc::new(NullNotifier),
        PipelineConfig::default(),
    );

    let tenant = Uuid::new_v4();
    let cancel = CancelToken::new();

    // one batch cycle: RELIANCE survives the gate, TATASTEEL does not
    let report = pipeline
        .run_cycle(tenant, "NSE", TimeFrame::Swing, &cancel)
        .await?;
    info!(
        opportunities = report.opportunities,
        activated = report.activated,
        rejected = report.rejected,
        "cycle report"
    );

    let active = pipeline
        .list_active_signals(tenant, SubscriptionTier::Pro)
        .await?;
    for signal in &active {
        info!(
            symbol = %signal.symbol,
            entry = %signal.entry_price,
            target = %signal.target_price,
            stop = %signal.stop_loss,
            rr = %signal.risk_reward_ratio,
            "active signal"
        );
    }

    // user-confirmed execution of the first active signal
    let offer = pipeline
        .request_execution_plan(active[0].id, tenant)
        .await?;
    info!(
        plan_id = %offer.plan.id,
        quantity = offer.plan.adjusted_quantity,
        capital_at_risk = %offer.plan.capital_at_risk,
        "plan awaiting confirmation"
    );

    match pipeline
        .confirm_execution(offer.plan.id, offer.confirmation_token)
        .await?
    {
        ExecutionOutcome::Executed(plan) => {
            info!(plan_id = %plan.id, executed_at = ?plan.executed_at, "plan executed");
        }
        ExecutionOutcome::Failed { reason, .. } => {
            info!(%reason, "execution failed");
        }
    }

    Ok(())
}

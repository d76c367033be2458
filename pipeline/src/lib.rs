//! Trading Signal Decision Pipeline
//!
//! Wires the stage crates together and exposes the pipeline's external
//! interface to the surrounding application:
//! - the scheduled scan/generate/validate batch (`run_cycle` / `run_forever`)
//! - `list_active_signals`, `request_execution_plan`, `confirm_execution`

pub mod config;
pub mod orchestrator;

pub use config::{load_config, save_config, MarketSpec, PipelineConfig};
pub use orchestrator::{CancelToken, CycleReport, PipelineOrchestrator, Stage, StageOutcome};

use std::sync::Arc;

use uuid::Uuid;

use common::{
    EntitlementProvider, NotificationSink, Result, RiskProvider, Signal, SubscriptionTier,
    TimeFrame,
};
use execution::{
    BrokerGateway, ExecutionOutcome, ExecutionPlanner, ExecutionService, PlanOffer, PlanStore,
};
use opportunity_scanner::{MarketResearch, OpportunityScanner};
use signal_generation::{GenerationCapability, SignalGenerator, SignalStore};

/// One-stop wiring of the whole decision pipeline
pub struct Pipeline {
    orchestrator: PipelineOrchestrator,
    service: ExecutionService,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        research: Arc<dyn MarketResearch>,
        generation: Arc<dyn GenerationCapability>,
        signals: Arc<dyn SignalStore>,
        plans: Arc<dyn PlanStore>,
        broker: Arc<dyn BrokerGateway>,
        risk: Arc<dyn RiskProvider>,
        entitlements: Arc<dyn EntitlementProvider>,
        notifier: Arc<dyn NotificationSink>,
        config: PipelineConfig,
    ) -> Self {
        let scanner = OpportunityScanner::new(research, config.scanner.clone());
        let generator =
            SignalGenerator::new(generation, signals.clone(), config.generation.clone());
        let planner = ExecutionPlanner::new(config.planner.clone());

        let orchestrator = PipelineOrchestrator::new(
            scanner,
            generator,
            signals.clone(),
            risk.clone(),
            entitlements.clone(),
            broker.clone(),
            notifier.clone(),
            config,
        );
        let service = ExecutionService::new(
            signals, plans, broker, risk, entitlements, notifier, planner,
        );

        Self {
            orchestrator,
            service,
        }
    }

    /// Run one batch cycle for a tenant.
    pub async fn run_cycle(
        &self,
        tenant_id: Uuid,
        market: &str,
        time_frame: TimeFrame,
        cancel: &CancelToken,
    ) -> Result<CycleReport> {
        self.orchestrator
            .run_cycle(tenant_id, market, time_frame, cancel)
            .await
    }

    /// Run the scheduled batch loop until cancelled.
    pub async fn run_forever(&self, tenant_id: Uuid, cancel: CancelToken) {
        self.orchestrator.run_forever(tenant_id, cancel).await
    }

    pub async fn list_active_signals(
        &self,
        tenant_id: Uuid,
        tier: SubscriptionTier,
    ) -> Result<Vec<Signal>> {
        self.service.list_active_signals(tenant_id, tier).await
    }

    pub async fn request_execution_plan(
        &self,
        signal_id: Uuid,
        user_id: Uuid,
    ) -> Result<PlanOffer> {
        self.service.request_execution_plan(signal_id, user_id).await
    }

    pub async fn confirm_execution(
        &self,
        plan_id: Uuid,
        confirmation_token: Uuid,
    ) -> Result<ExecutionOutcome> {
        self.service.confirm_execution(plan_id, confirmation_token).await
    }
}

//! Pipeline Orchestrator
//!
//! Sequences the batch stages (scan -> generate -> validate -> classify ->
//! size) for one tenant. Data flows strictly forward; a degraded scan or a
//! cycle with zero surviving signals short-circuits the remaining stages via
//! an explicit per-cycle flag, never via error control flow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::{
    Compatibility, EntitlementProvider, NotificationSink, PipelineError, PipelineEvent, Result,
    RiskProvider, Signal, SignalStatus, TimeFrame,
};
use execution::{BrokerGateway, CompatibilityResolver, RiskSizer};
use opportunity_scanner::{OpportunityScanner, ScanOutcome};
use signal_generation::{GateDecision, GenerationContext, QualityGate, SignalGenerator, SignalStore};

use crate::config::PipelineConfig;

/// Cooperative cancellation flag, checked between stages and iterations.
///
/// Never consulted once a plan has entered EXECUTING; that path is owned by
/// the execution service and runs to completion.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Generate,
    Validate,
    Classify,
    Size,
}

/// How one stage ended within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// Not executed because an earlier stage short-circuited the cycle
    Skipped,
    /// The stage's collaborator kept failing; the cycle ends normally
    Degraded,
}

/// Summary of one pipeline cycle; zero surviving signals is a normal outcome
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub market: String,
    pub time_frame: TimeFrame,
    pub stages: Vec<(Stage, StageOutcome)>,
    pub opportunities: usize,
    pub generated: usize,
    /// Malformed generation payloads, discarded without retry
    pub discarded: usize,
    /// Opportunities whose generation kept failing upstream
    pub failed: usize,
    pub activated: usize,
    pub rejected: usize,
    pub expired: usize,
    pub cancelled: bool,
}

impl CycleReport {
    fn new(market: &str, time_frame: TimeFrame) -> Self {
        Self {
            market: market.to_string(),
            time_frame,
            stages: Vec::new(),
            opportunities: 0,
            generated: 0,
            discarded: 0,
            failed: 0,
            activated: 0,
            rejected: 0,
            expired: 0,
            cancelled: false,
        }
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        self.stages.push((stage, outcome));
    }

    fn skip_remaining(&mut self, from: &[Stage]) {
        for stage in from {
            self.stages.push((*stage, StageOutcome::Skipped));
        }
    }

    pub fn stage_outcome(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, o)| *o)
    }
}

/// Drives the scan/generate/validate batch for a tenant
pub struct PipelineOrchestrator {
    scanner: OpportunityScanner,
    generator: SignalGenerator,
    signals: Arc<dyn SignalStore>,
    risk: Arc<dyn RiskProvider>,
    entitlements: Arc<dyn EntitlementProvider>,
    broker: Arc<dyn BrokerGateway>,
    notifier: Arc<dyn NotificationSink>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scanner: OpportunityScanner,
        generator: SignalGenerator,
        signals: Arc<dyn SignalStore>,
        risk: Arc<dyn RiskProvider>,
        entitlements: Arc<dyn EntitlementProvider>,
        broker: Arc<dyn BrokerGateway>,
        notifier: Arc<dyn NotificationSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            scanner,
            generator,
            signals,
            risk,
            entitlements,
            broker,
            notifier,
            config,
        }
    }

    /// Run one full cycle for a tenant against one market/time-frame pair.
    pub async fn run_cycle(
        &self,
        tenant_id: Uuid,
        market: &str,
        time_frame: TimeFrame,
        cancel: &CancelToken,
    ) -> Result<CycleReport> {
        let mut report = CycleReport::new(market, time_frame);
        let now = Utc::now();

        // expiry sweep runs regardless of how the rest of the cycle fares
        report.expired = self.signals.expire_due(now).await?.len();

        if cancel.is_cancelled() {
            report.cancelled = true;
            report.skip_remaining(&[
                Stage::Scan,
                Stage::Generate,
                Stage::Validate,
                Stage::Classify,
                Stage::Size,
            ]);
            return Ok(report);
        }

        // Stage 1: scan
        let opportunities = match self.scanner.scan_market(market, time_frame).await {
            ScanOutcome::Complete(opportunities) => {
                report.record(Stage::Scan, StageOutcome::Completed);
                opportunities
            }
            ScanOutcome::Degraded { attempts, reason } => {
                warn!(market, attempts, %reason, "scan degraded, skipping cycle");
                report.record(Stage::Scan, StageOutcome::Degraded);
                report.skip_remaining(&[
                    Stage::Generate,
                    Stage::Validate,
                    Stage::Classify,
                    Stage::Size,
                ]);
                return Ok(report);
            }
        };
        report.opportunities = opportunities.len();

        if cancel.is_cancelled() {
            report.cancelled = true;
            report.skip_remaining(&[Stage::Generate, Stage::Validate, Stage::Classify, Stage::Size]);
            return Ok(report);
        }

        // Stage 2: generate, concurrently across opportunities (each one is
        // independent of the others)
        let context = GenerationContext {
            tenant_id,
            market: market.to_string(),
            time_frame,
            expires_at: Some(now + self.signal_ttl(time_frame)),
        };
        let outcomes = join_all(
            opportunities
                .iter()
                .map(|opportunity| self.generator.generate_for(opportunity, &context)),
        )
        .await;

        let mut candidates = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(signal) => candidates.push(signal),
                Err(PipelineError::MalformedResponse { detail }) => {
                    warn!(market, %detail, "generation defect, payload discarded");
                    report.discarded += 1;
                }
                Err(PipelineError::TransientUpstream {
                    stage,
                    attempts,
                    source,
                }) => {
                    warn!(market, stage, attempts, error = %source, "generation gave up");
                    report.failed += 1;
                }
                Err(other) => return Err(other),
            }
        }
        report.generated = candidates.len();
        report.record(Stage::Generate, StageOutcome::Completed);

        // Stage 3: quality gate
        let profile = self.risk.risk_profile(tenant_id).await.map_err(|e| {
            PipelineError::TransientUpstream {
                stage: "risk",
                attempts: 1,
                source: e,
            }
        })?;

        let mut activated: Vec<Signal> = Vec::new();
        for signal in &candidates {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match QualityGate::evaluate(signal, &profile) {
                GateDecision::Accepted => {
                    let active = self
                        .signals
                        .transition(signal.id, SignalStatus::Candidate, SignalStatus::Active)
                        .await?;
                    report.activated += 1;
                    if let Err(e) = self
                        .notifier
                        .publish(PipelineEvent::SignalActivated(active.clone()))
                        .await
                    {
                        warn!(signal_id = %active.id, error = %e, "signal_activated notification failed");
                    }
                    activated.push(active);
                }
                GateDecision::Rejected(reason) => {
                    info!(signal_id = %signal.id, %reason, "signal rejected by quality gate");
                    self.signals.reject(signal.id, reason.to_string()).await?;
                    report.rejected += 1;
                }
            }
        }
        report.record(Stage::Validate, StageOutcome::Completed);

        // explicit short-circuit: nothing survived the gate
        if activated.is_empty() {
            info!(market, "no signals survived the gate, skipping remaining stages");
            report.skip_remaining(&[Stage::Classify, Stage::Size]);
            return Ok(report);
        }

        // Stage 4: compatibility classification (advisory; re-resolved at
        // plan-request time)
        let account = match self.broker.primary_account(tenant_id).await {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "broker lookup failed, classification degraded");
                report.record(Stage::Classify, StageOutcome::Degraded);
                report.skip_remaining(&[Stage::Size]);
                return Ok(report);
            }
        };
        let tier = match self.entitlements.tier(tenant_id).await {
            Ok(tier) => tier,
            Err(e) => {
                warn!(error = %e, "entitlement lookup failed, classification degraded");
                report.record(Stage::Classify, StageOutcome::Degraded);
                report.skip_remaining(&[Stage::Size]);
                return Ok(report);
            }
        };

        let mut classified = Vec::new();
        for signal in &activated {
            let compatibility =
                CompatibilityResolver::classify(signal, account.as_ref(), tier);
            self.signals
                .set_compatibility(signal.id, compatibility.clone())
                .await?;
            classified.push((signal.clone(), compatibility));
        }
        report.record(Stage::Classify, StageOutcome::Completed);

        // Stage 5: risk sizing for executable signals
        for (signal, compatibility) in &classified {
            if !compatibility.is_executable() {
                continue;
            }
            match RiskSizer::size(signal, &profile) {
                Ok(sizing) if sizing.reduced => {
                    self.signals.resize(signal.id, sizing.quantity).await?;
                }
                Ok(_) => {}
                Err(PipelineError::CapitalInsufficient { .. }) => {
                    self.signals
                        .set_compatibility(
                            signal.id,
                            Compatibility::Blocked {
                                reason: "account equity cannot cover the minimum viable position"
                                    .to_string(),
                            },
                        )
                        .await?;
                }
                Err(other) => return Err(other),
            }
        }
        report.record(Stage::Size, StageOutcome::Completed);

        info!(
            market,
            opportunities = report.opportunities,
            activated = report.activated,
            rejected = report.rejected,
            "cycle finished"
        );
        Ok(report)
    }

    /// Periodic batch loop; a failed cycle is logged and the next one
    /// proceeds normally.
    pub async fn run_forever(&self, tenant_id: Uuid, cancel: CancelToken) {
        let interval = Duration::from_secs(self.config.cycle_interval_secs);
        loop {
            for spec in &self.config.markets {
                if cancel.is_cancelled() {
                    info!("pipeline loop cancelled");
                    return;
                }
                match self
                    .run_cycle(tenant_id, &spec.market, spec.time_frame, &cancel)
                    .await
                {
                    Ok(report) => info!(
                        market = %report.market,
                        activated = report.activated,
                        "scheduled cycle completed"
                    ),
                    Err(e) => error!(market = %spec.market, error = %e, "scheduled cycle failed"),
                }
            }
            if cancel.is_cancelled() {
                info!("pipeline loop cancelled");
                return;
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn signal_ttl(&self, time_frame: TimeFrame) -> chrono::Duration {
        match time_frame {
            TimeFrame::Intraday => chrono::Duration::minutes(self.config.intraday_ttl_minutes),
            TimeFrame::Swing => chrono::Duration::hours(self.config.swing_ttl_hours),
        }
    }
}

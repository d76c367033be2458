//! Read-only events handed to the notification fan-out collaborator
//!
//! Delivery and channel formatting are entirely the collaborator's
//! responsibility; the pipeline fires and forgets, logging sink failures.

use async_trait::async_trait;
use tracing::debug;

use crate::plan::ExecutionPlan;
use crate::signal::Signal;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SignalActivated(Signal),
    PlanExecuted(ExecutionPlan),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: PipelineEvent) -> anyhow::Result<()>;
}

/// Sink that drops every event; default wiring for tests and tools.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn publish(&self, event: PipelineEvent) -> anyhow::Result<()> {
        match event {
            PipelineEvent::SignalActivated(signal) => {
                debug!(signal_id = %signal.id, "dropping signal_activated event");
            }
            PipelineEvent::PlanExecuted(plan) => {
                debug!(plan_id = %plan.id, "dropping plan_executed event");
            }
        }
        Ok(())
    }
}

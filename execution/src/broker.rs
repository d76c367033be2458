// Broker collaborator seam
// The pipeline hands a finished plan to the integration layer; order routing
// internals live entirely on the other side of this trait

use async_trait::async_trait;
use uuid::Uuid;

use common::{BrokerAccount, ExecutionPlan, Signal};

/// Broker's answer to an order submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { broker_order_id: String },
    Rejected { reason: String },
}

/// Broker integration collaborator
///
/// `submit_order` is called at most once per signal and its failures are
/// surfaced to the caller verbatim; the pipeline never retries a submission
/// on its own.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    async fn primary_account(&self, user_id: Uuid) -> anyhow::Result<Option<BrokerAccount>>;

    async fn submit_order(
        &self,
        plan: &ExecutionPlan,
        signal: &Signal,
    ) -> anyhow::Result<SubmitOutcome>;
}

// Plan Store
// Persistence seam for execution plans; enforces the one-live-plan-per-signal
// rule and makes token consumption atomic

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use common::{ConflictKind, ExecutionPlan, PipelineError, PlanState, Result};

/// Persistence contract for execution plans
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Persist a new plan. Fails with a conflict if the signal already has a
    /// plan that has not reached a terminal state.
    async fn create(&self, plan: ExecutionPlan) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<ExecutionPlan>>;

    /// Consume the confirmation token and move the plan
    /// AWAITING_CONFIRMATION -> EXECUTING in one atomic step.
    ///
    /// Exactly one of N concurrent callers with the same token wins; the
    /// rest observe the state change as `TokenReused`.
    async fn begin_execution(
        &self,
        id: Uuid,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ExecutionPlan>;

    async fn mark_executed(&self, id: Uuid, at: DateTime<Utc>) -> Result<ExecutionPlan>;

    async fn mark_failed(&self, id: Uuid, reason: String) -> Result<ExecutionPlan>;
}

/// In-memory plan store (for tests, demos and single-node deployments)
#[derive(Default)]
pub struct InMemoryPlanStore {
    plans: DashMap<Uuid, ExecutionPlan>,
    /// signal_id -> latest plan id, used to enforce plan exclusivity
    by_signal: DashMap<Uuid, Uuid>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan_for_signal(&self, signal_id: Uuid) -> Option<ExecutionPlan> {
        let plan_id = *self.by_signal.get(&signal_id)?;
        self.plans.get(&plan_id).map(|p| p.clone())
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn create(&self, plan: ExecutionPlan) -> Result<()> {
        // the index entry lock serialises concurrent creates per signal
        match self.by_signal.entry(plan.signal_id) {
            Entry::Occupied(mut indexed) => {
                let live = self
                    .plans
                    .get(indexed.get())
                    .map(|existing| !existing.state.is_terminal())
                    .unwrap_or(false);
                if live {
                    return Err(ConflictKind::PlanExists.into());
                }
                let plan_id = plan.id;
                self.plans.insert(plan_id, plan);
                indexed.insert(plan_id);
            }
            Entry::Vacant(slot) => {
                let plan_id = plan.id;
                self.plans.insert(plan_id, plan);
                slot.insert(plan_id);
            }
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExecutionPlan>> {
        Ok(self.plans.get(&id).map(|p| p.clone()))
    }

    async fn begin_execution(
        &self,
        id: Uuid,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ExecutionPlan> {
        let mut plan = self
            .plans
            .get_mut(&id)
            .ok_or(PipelineError::PlanNotFound(id))?;

        match plan.state {
            PlanState::AwaitingConfirmation => {}
            PlanState::Executing | PlanState::Executed | PlanState::ExecutionFailed => {
                return Err(ConflictKind::TokenReused.into());
            }
            PlanState::Drafted => return Err(ConflictKind::PlanNotConfirmable.into()),
        }

        let confirmation = plan
            .confirmation
            .as_ref()
            .ok_or(PipelineError::Conflict(ConflictKind::PlanNotConfirmable))?;
        if !confirmation.matches(token) {
            return Err(ConflictKind::TokenMismatch.into());
        }
        if confirmation.is_expired(now) {
            return Err(ConflictKind::TokenExpired.into());
        }

        plan.state = PlanState::Executing;
        debug!(plan_id = %id, "plan entered EXECUTING");
        Ok(plan.clone())
    }

    async fn mark_executed(&self, id: Uuid, at: DateTime<Utc>) -> Result<ExecutionPlan> {
        let mut plan = self
            .plans
            .get_mut(&id)
            .ok_or(PipelineError::PlanNotFound(id))?;
        if !plan.state.can_transition_to(PlanState::Executed) {
            return Err(ConflictKind::StaleTransition.into());
        }
        plan.state = PlanState::Executed;
        plan.executed_at = Some(at);
        Ok(plan.clone())
    }

    async fn mark_failed(&self, id: Uuid, reason: String) -> Result<ExecutionPlan> {
        let mut plan = self
            .plans
            .get_mut(&id)
            .ok_or(PipelineError::PlanNotFound(id))?;
        if !plan.state.can_transition_to(PlanState::ExecutionFailed) {
            return Err(ConflictKind::StaleTransition.into());
        }
        plan.state = PlanState::ExecutionFailed;
        plan.failure_reason = Some(reason);
        Ok(plan.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{ConfirmationToken, OrderType, ValidityWindow};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn plan(signal_id: Uuid, state: PlanState) -> ExecutionPlan {
        let now = Utc::now();
        ExecutionPlan {
            id: Uuid::new_v4(),
            signal_id,
            broker_account_id: Uuid::new_v4(),
            order_type: OrderType::Limit,
            adjusted_quantity: 100,
            capital_at_risk: dec!(1000),
            state,
            confirmation: Some(ConfirmationToken::issue(now, Duration::minutes(5))),
            validity: ValidityWindow {
                start: now,
                end: now + Duration::hours(6),
            },
            created_at: now,
            executed_at: None,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn test_second_live_plan_for_signal_conflicts() {
        let store = InMemoryPlanStore::new();
        let signal_id = Uuid::new_v4();

        store
            .create(plan(signal_id, PlanState::AwaitingConfirmation))
            .await
            .unwrap();
        let err = store
            .create(plan(signal_id, PlanState::AwaitingConfirmation))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conflict(ConflictKind::PlanExists)
        ));
    }

    #[tokio::test]
    async fn test_terminal_plan_allows_replacement() {
        let store = InMemoryPlanStore::new();
        let signal_id = Uuid::new_v4();

        store
            .create(plan(signal_id, PlanState::ExecutionFailed))
            .await
            .unwrap();
        store
            .create(plan(signal_id, PlanState::AwaitingConfirmation))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_token_single_use() {
        let store = InMemoryPlanStore::new();
        let p = plan(Uuid::new_v4(), PlanState::AwaitingConfirmation);
        let token = p.confirmation.as_ref().unwrap().token;
        let id = p.id;
        store.create(p).await.unwrap();

        let executing = store.begin_execution(id, token, Utc::now()).await.unwrap();
        assert_eq!(executing.state, PlanState::Executing);

        let err = store.begin_execution(id, token, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conflict(ConflictKind::TokenReused)
        ));
    }

    #[tokio::test]
    async fn test_wrong_and_expired_tokens_rejected() {
        let store = InMemoryPlanStore::new();
        let p = plan(Uuid::new_v4(), PlanState::AwaitingConfirmation);
        let token = p.confirmation.as_ref().unwrap().token;
        let id = p.id;
        store.create(p).await.unwrap();

        let err = store
            .begin_execution(id, Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conflict(ConflictKind::TokenMismatch)
        ));

        let err = store
            .begin_execution(id, token, Utc::now() + Duration::minutes(6))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conflict(ConflictKind::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_begin_has_one_winner() {
        let store = Arc::new(InMemoryPlanStore::new());
        let p = plan(Uuid::new_v4(), PlanState::AwaitingConfirmation);
        let token = p.confirmation.as_ref().unwrap().token;
        let id = p.id;
        store.create(p).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.begin_execution(id, token, Utc::now()).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

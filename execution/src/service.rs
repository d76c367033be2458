// Execution Service
// The pipeline's user-facing operations: list active signals, request an
// execution plan, confirm execution

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use common::{
    Compatibility, ConflictKind, EntitlementProvider, ExecutionPlan, NotificationSink,
    PipelineError, PipelineEvent, Result, RiskProvider, Signal, SignalStatus, SubscriptionTier,
};
use signal_generation::SignalStore;

use crate::broker::{BrokerGateway, SubmitOutcome};
use crate::compatibility::CompatibilityResolver;
use crate::plan_store::PlanStore;
use crate::planner::ExecutionPlanner;
use crate::sizing::RiskSizer;

/// A plan surfaced for user confirmation
#[derive(Debug, Clone)]
pub struct PlanOffer {
    pub plan: ExecutionPlan,
    pub confirmation_token: Uuid,
}

/// Terminal result of a confirmed execution
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Executed(ExecutionPlan),
    Failed { plan: ExecutionPlan, reason: String },
}

pub struct ExecutionService {
    signals: Arc<dyn SignalStore>,
    plans: Arc<dyn PlanStore>,
    broker: Arc<dyn BrokerGateway>,
    risk: Arc<dyn RiskProvider>,
    entitlements: Arc<dyn EntitlementProvider>,
    notifier: Arc<dyn NotificationSink>,
    planner: ExecutionPlanner,
}

impl ExecutionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        signals: Arc<dyn SignalStore>,
        plans: Arc<dyn PlanStore>,
        broker: Arc<dyn BrokerGateway>,
        risk: Arc<dyn RiskProvider>,
        entitlements: Arc<dyn EntitlementProvider>,
        notifier: Arc<dyn NotificationSink>,
        planner: ExecutionPlanner,
    ) -> Self {
        Self {
            signals,
            plans,
            broker,
            risk,
            entitlements,
            notifier,
            planner,
        }
    }

    /// Active signals visible to one tenant at one subscription tier.
    pub async fn list_active_signals(
        &self,
        tenant_id: Uuid,
        tier: SubscriptionTier,
    ) -> Result<Vec<Signal>> {
        let signals = self.signals.list_active_for_tenant(tenant_id).await?;
        Ok(signals
            .into_iter()
            .filter(|s| tier.allows_time_frame(s.time_frame))
            .collect())
    }

    /// Draft a plan for an active signal and surface it for confirmation.
    ///
    /// Compatibility is re-resolved here with fresh broker and tier lookups;
    /// whatever the cycle recorded earlier is advisory only.
    pub async fn request_execution_plan(
        &self,
        signal_id: Uuid,
        user_id: Uuid,
    ) -> Result<PlanOffer> {
        let now = Utc::now();
        let signal = self
            .signals
            .get(signal_id)
            .await?
            .ok_or(PipelineError::SignalNotFound(signal_id))?;

        match signal.status {
            SignalStatus::Active => {}
            SignalStatus::Executing | SignalStatus::Executed => {
                return Err(ConflictKind::AlreadyExecuting.into());
            }
            SignalStatus::Expired => return Err(ConflictKind::SignalExpired.into()),
            _ => return Err(ConflictKind::StaleTransition.into()),
        }
        // expiry blocks new plan creation even before the sweep catches up
        if signal.is_expired(now) {
            return Err(ConflictKind::SignalExpired.into());
        }

        let account = self
            .broker
            .primary_account(user_id)
            .await
            .map_err(|e| PipelineError::BrokerSubmission {
                reason: e.to_string(),
            })?;
        let tier = self.entitlements.tier(user_id).await.map_err(|e| {
            PipelineError::TransientUpstream {
                stage: "entitlement",
                attempts: 1,
                source: e,
            }
        })?;

        let compatibility = CompatibilityResolver::classify(&signal, account.as_ref(), tier);
        self.signals
            .set_compatibility(signal_id, compatibility.clone())
            .await?;
        let account = match (&compatibility, account) {
            (Compatibility::Executable, Some(account)) => account,
            _ => {
                let guidance = compatibility
                    .guidance()
                    .unwrap_or("signal is not executable")
                    .to_string();
                info!(signal_id = %signal_id, %guidance, "plan request blocked by compatibility");
                return Err(PipelineError::CompatibilityBlock { guidance });
            }
        };

        let profile = self.risk.risk_profile(user_id).await.map_err(|e| {
            PipelineError::TransientUpstream {
                stage: "risk",
                attempts: 1,
                source: e,
            }
        })?;

        let sizing = match RiskSizer::size(&signal, &profile) {
            Ok(sizing) => sizing,
            Err(err @ PipelineError::CapitalInsufficient { .. }) => {
                self.signals
                    .set_compatibility(
                        signal_id,
                        Compatibility::Blocked {
                            reason: "account equity cannot cover the minimum viable position"
                                .to_string(),
                        },
                    )
                    .await?;
                return Err(err);
            }
            Err(other) => return Err(other),
        };

        let signal = if sizing.quantity != signal.quantity {
            self.signals.resize(signal_id, sizing.quantity).await?
        } else {
            signal
        };

        let mut plan = self.planner.draft(&signal, &sizing, &account, now);
        let confirmation_token = self.planner.offer(&mut plan, now);
        self.plans.create(plan.clone()).await?;

        info!(
            plan_id = %plan.id,
            signal_id = %signal_id,
            quantity = plan.adjusted_quantity,
            capital_at_risk = %plan.capital_at_risk,
            "execution plan awaiting confirmation"
        );
        Ok(PlanOffer {
            plan,
            confirmation_token,
        })
    }

    /// Confirm a plan with its single-use token and hand off to the broker.
    ///
    /// At-most-once: the ACTIVE -> EXECUTING swap on the signal record is
    /// the arbiter under concurrent confirms. Broker failures are surfaced
    /// verbatim and never retried here; the signal stays failed so a fresh
    /// signal/plan has to be generated instead.
    pub async fn confirm_execution(
        &self,
        plan_id: Uuid,
        confirmation_token: Uuid,
    ) -> Result<ExecutionOutcome> {
        let now = Utc::now();
        let plan = self
            .plans
            .begin_execution(plan_id, confirmation_token, now)
            .await?;

        let signal = match self
            .signals
            .transition(plan.signal_id, SignalStatus::Active, SignalStatus::Executing)
            .await
        {
            Ok(signal) => signal,
            Err(err) => {
                // lost the race (or the signal expired underneath the plan);
                // the plan cannot execute anymore
                if let Err(mark_err) = self
                    .plans
                    .mark_failed(plan_id, "signal was no longer active".to_string())
                    .await
                {
                    warn!(plan_id = %plan_id, error = %mark_err, "failed to park losing plan");
                }
                return Err(err);
            }
        };

        match self.broker.submit_order(&plan, &signal).await {
            Ok(SubmitOutcome::Accepted { broker_order_id }) => {
                let plan = self.plans.mark_executed(plan_id, now).await?;
                self.signals
                    .transition(plan.signal_id, SignalStatus::Executing, SignalStatus::Executed)
                    .await?;
                info!(
                    plan_id = %plan_id,
                    signal_id = %plan.signal_id,
                    broker_order_id = %broker_order_id,
                    "plan executed"
                );
                if let Err(e) = self
                    .notifier
                    .publish(PipelineEvent::PlanExecuted(plan.clone()))
                    .await
                {
                    warn!(plan_id = %plan_id, error = %e, "plan_executed notification failed");
                }
                Ok(ExecutionOutcome::Executed(plan))
            }
            Ok(SubmitOutcome::Rejected { reason }) => {
                let plan = self.plans.mark_failed(plan_id, reason.clone()).await?;
                self.signals
                    .transition(
                        plan.signal_id,
                        SignalStatus::Executing,
                        SignalStatus::ExecutionFailed,
                    )
                    .await?;
                warn!(plan_id = %plan_id, %reason, "broker rejected order");
                Ok(ExecutionOutcome::Failed { plan, reason })
            }
            Err(e) => {
                let reason = e.to_string();
                self.plans.mark_failed(plan_id, reason.clone()).await?;
                self.signals
                    .transition(
                        plan.signal_id,
                        SignalStatus::Executing,
                        SignalStatus::ExecutionFailed,
                    )
                    .await?;
                Err(PipelineError::BrokerSubmission { reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_store::InMemoryPlanStore;
    use crate::planner::PlannerConfig;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::{
        BrokerAccount, ConnectionStatus, FixedEntitlements, FixedRiskProvider, MarketSegment,
        NullNotifier, RiskProfile, SignalAction, TimeFrame,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use signal_generation::InMemorySignalStore;

    struct StubBroker {
        account: Option<BrokerAccount>,
        outcome: SubmitOutcome,
    }

    #[async_trait]
    impl BrokerGateway for StubBroker {
        async fn primary_account(&self, _user_id: Uuid) -> anyhow::Result<Option<BrokerAccount>> {
            Ok(self.account.clone())
        }

        async fn submit_order(
            &self,
            _plan: &ExecutionPlan,
            _signal: &Signal,
        ) -> anyhow::Result<SubmitOutcome> {
            Ok(self.outcome.clone())
        }
    }

    fn connected_account() -> BrokerAccount {
        BrokerAccount {
            id: Uuid::new_v4(),
            broker: "zerodha".to_string(),
            supported_segments: vec![MarketSegment::Delivery, MarketSegment::Intraday],
            connection_status: ConnectionStatus::Connected,
            is_primary: true,
        }
    }

    fn active_signal(tenant_id: Uuid, quantity: u64) -> Signal {
        let mut s = Signal {
            id: Uuid::new_v4(),
            tenant_id,
            symbol: "WIPRO".to_string(),
            exchange: "NSE".to_string(),
            action: SignalAction::Buy,
            entry_price: dec!(100),
            target_price: dec!(106),
            stop_loss: dec!(98),
            quantity,
            time_frame: TimeFrame::Swing,
            confidence: 82.0,
            strategy: "breakout".to_string(),
            rationale: "test".to_string(),
            risk_reward_ratio: Decimal::ZERO,
            potential_return: Decimal::ZERO,
            status: SignalStatus::Candidate,
            compatibility: None,
            rejection_reason: None,
            created_at: Utc::now(),
            expires_at: None,
        };
        s.recompute_derived();
        s
    }

    struct Harness {
        service: ExecutionService,
        signals: Arc<InMemorySignalStore>,
    }

    async fn harness(broker: StubBroker, equity: Decimal) -> Harness {
        let signals = Arc::new(InMemorySignalStore::new());
        let service = ExecutionService::new(
            signals.clone(),
            Arc::new(InMemoryPlanStore::new()),
            Arc::new(broker),
            Arc::new(FixedRiskProvider(RiskProfile {
                account_equity: equity,
                ..RiskProfile::default()
            })),
            Arc::new(FixedEntitlements(SubscriptionTier::Pro)),
            Arc::new(NullNotifier),
            ExecutionPlanner::new(PlannerConfig::default()),
        );
        Harness { service, signals }
    }

    async fn seed_active(signals: &InMemorySignalStore, signal: Signal) -> Uuid {
        let id = signal.id;
        signals.insert(signal).await.unwrap();
        signals
            .transition(id, SignalStatus::Candidate, SignalStatus::Active)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_request_and_confirm_executes() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Accepted {
                    broker_order_id: "ord-1".to_string(),
                },
            },
            dec!(200000),
        )
        .await;
        let signal_id = seed_active(&h.signals, active_signal(user, 500)).await;

        let offer = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap();
        assert_eq!(offer.plan.adjusted_quantity, 500);

        let outcome = h
            .service
            .confirm_execution(offer.plan.id, offer.confirmation_token)
            .await
            .unwrap();
        match outcome {
            ExecutionOutcome::Executed(plan) => {
                assert!(plan.executed_at.is_some());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            h.signals.get(signal_id).await.unwrap().unwrap().status,
            SignalStatus::Executed
        );
    }

    #[tokio::test]
    async fn test_disconnected_broker_blocks_plan_request() {
        let user = Uuid::new_v4();
        let mut account = connected_account();
        account.connection_status = ConnectionStatus::Disconnected;
        let h = harness(
            StubBroker {
                account: Some(account),
                outcome: SubmitOutcome::Rejected {
                    reason: "unused".to_string(),
                },
            },
            dec!(200000),
        )
        .await;
        let signal_id = seed_active(&h.signals, active_signal(user, 500)).await;

        let err = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::CompatibilityBlock { .. }));

        // classification recorded on the record
        let stored = h.signals.get(signal_id).await.unwrap().unwrap();
        assert!(matches!(
            stored.compatibility,
            Some(Compatibility::NotifyOnly { .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_signal_is_resized_before_planning() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Accepted {
                    broker_order_id: "ord-2".to_string(),
                },
            },
            dec!(200000),
        )
        .await;
        // 1500 shares at 2/share risk = 3000 < budget, use wider stop instead:
        // entry 100 stop 90 -> 10/share; 1500 * 10 = 15000 > 10000 budget
        let mut signal = active_signal(user, 1500);
        signal.stop_loss = dec!(90);
        signal.target_price = dec!(130);
        signal.recompute_derived();
        let signal_id = seed_active(&h.signals, signal).await;

        let offer = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap();
        assert_eq!(offer.plan.adjusted_quantity, 1000);
        assert_eq!(offer.plan.capital_at_risk, dec!(10000));

        // quantity persisted back onto the signal
        let stored = h.signals.get(signal_id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 1000);
    }

    #[tokio::test]
    async fn test_token_reuse_conflicts_after_execution() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Accepted {
                    broker_order_id: "ord-3".to_string(),
                },
            },
            dec!(200000),
        )
        .await;
        let signal_id = seed_active(&h.signals, active_signal(user, 500)).await;

        let offer = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap();
        h.service
            .confirm_execution(offer.plan.id, offer.confirmation_token)
            .await
            .unwrap();

        let err = h
            .service
            .confirm_execution(offer.plan.id, offer.confirmation_token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conflict(ConflictKind::TokenReused)
        ));
    }

    #[tokio::test]
    async fn test_broker_rejection_is_terminal_without_revert() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Rejected {
                    reason: "margin shortfall at broker".to_string(),
                },
            },
            dec!(200000),
        )
        .await;
        let signal_id = seed_active(&h.signals, active_signal(user, 500)).await;

        let offer = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap();
        let outcome = h
            .service
            .confirm_execution(offer.plan.id, offer.confirmation_token)
            .await
            .unwrap();

        match outcome {
            ExecutionOutcome::Failed { plan, reason } => {
                assert_eq!(reason, "margin shortfall at broker");
                assert_eq!(plan.failure_reason.as_deref(), Some("margin shortfall at broker"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // the signal does not revert to ACTIVE; a fresh signal must be generated
        assert_eq!(
            h.signals.get(signal_id).await.unwrap().unwrap().status,
            SignalStatus::ExecutionFailed
        );

        let err = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_second_plan_for_same_signal_conflicts() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Accepted {
                    broker_order_id: "ord-4".to_string(),
                },
            },
            dec!(200000),
        )
        .await;
        let signal_id = seed_active(&h.signals, active_signal(user, 500)).await;

        h.service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap();
        let err = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conflict(ConflictKind::PlanExists)
        ));
    }

    #[tokio::test]
    async fn test_capital_insufficient_reclassifies_blocked() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Accepted {
                    broker_order_id: "ord-5".to_string(),
                },
            },
            dec!(30), // budget 1.50, per-share risk 2
        )
        .await;
        let signal_id = seed_active(&h.signals, active_signal(user, 500)).await;

        let err = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::CapitalInsufficient { .. }));

        let stored = h.signals.get(signal_id).await.unwrap().unwrap();
        assert!(matches!(
            stored.compatibility,
            Some(Compatibility::Blocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_signal_blocks_new_plan() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Accepted {
                    broker_order_id: "ord-6".to_string(),
                },
            },
            dec!(200000),
        )
        .await;
        let mut signal = active_signal(user, 500);
        signal.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        let signal_id = seed_active(&h.signals, signal).await;

        let err = h
            .service
            .request_execution_plan(signal_id, user)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Conflict(ConflictKind::SignalExpired)
        ));
    }

    #[tokio::test]
    async fn test_tier_filtering_of_active_signals() {
        let user = Uuid::new_v4();
        let h = harness(
            StubBroker {
                account: Some(connected_account()),
                outcome: SubmitOutcome::Accepted {
                    broker_order_id: "ord-7".to_string(),
                },
            },
            dec!(200000),
        )
        .await;

        let swing = active_signal(user, 100);
        let mut intraday = active_signal(user, 100);
        intraday.time_frame = TimeFrame::Intraday;
        seed_active(&h.signals, swing).await;
        seed_active(&h.signals, intraday).await;

        let free = h
            .service
            .list_active_signals(user, SubscriptionTier::Free)
            .await
            .unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].time_frame, TimeFrame::Swing);

        let pro = h
            .service
            .list_active_signals(user, SubscriptionTier::Pro)
            .await
            .unwrap();
        assert_eq!(pro.len(), 2);
    }
}

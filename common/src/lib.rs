//! Shared domain types for the signal decision pipeline.
//!
//! This crate holds everything more than one pipeline layer needs:
//! - Signal and ExecutionPlan entities with their status lattices
//! - Broker account, risk profile and subscription tier types
//! - The typed error taxonomy
//! - Pipeline events and the collaborator provider traits

pub mod account;
pub mod error;
pub mod events;
pub mod market;
pub mod plan;
pub mod providers;
pub mod signal;

// Re-export commonly used types
pub use account::{BrokerAccount, ConnectionStatus, MarketSegment, RiskProfile, SubscriptionTier};
pub use error::{ConflictKind, PipelineError, Result};
pub use events::{NotificationSink, NullNotifier, PipelineEvent};
pub use market::Opportunity;
pub use plan::{ConfirmationToken, ExecutionPlan, OrderType, PlanState, ValidityWindow};
pub use providers::{EntitlementProvider, FixedEntitlements, FixedRiskProvider, RiskProvider};
pub use signal::{Compatibility, Signal, SignalAction, SignalStatus, TimeFrame};

pub use uuid::Uuid;

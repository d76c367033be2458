// Signal Store
// Persistence seam for signals; the in-memory implementation carries the
// versioned compare-and-swap that the execution path relies on

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use common::{Compatibility, ConflictKind, PipelineError, Result, Signal, SignalStatus};

/// Persistence contract for signals
///
/// Whatever backs this trait must keep status transitions monotonic along
/// the signal lattice and make `transition` atomic: of N concurrent calls
/// with the same `from`, exactly one wins and the rest see a conflict.
/// Records are never deleted.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Persist a freshly generated signal (CANDIDATE).
    async fn insert(&self, signal: Signal) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Signal>>;

    async fn list_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>>;

    /// ACTIVE signals for one tenant.
    async fn list_active_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Signal>>;

    /// Atomic status transition guard.
    ///
    /// Moves the signal from `from` to `to` if and only if its current
    /// status still equals `from`; otherwise fails with a conflict. This is
    /// the at-most-once primitive for the ACTIVE -> EXECUTING step.
    async fn transition(&self, id: Uuid, from: SignalStatus, to: SignalStatus) -> Result<Signal>;

    /// CANDIDATE -> REJECTED with the gate's reason attached.
    async fn reject(&self, id: Uuid, reason: String) -> Result<Signal>;

    async fn set_compatibility(&self, id: Uuid, compatibility: Compatibility) -> Result<Signal>;

    /// Persist a risk-sized quantity and recompute the derived fields.
    async fn resize(&self, id: Uuid, quantity: u64) -> Result<Signal>;

    /// Sweep ACTIVE signals whose expiry has passed into EXPIRED.
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<Signal>>;
}

struct Versioned {
    signal: Signal,
    /// Bumped on every write; transitions are checked under the entry lock
    /// so a stale writer can never clobber a newer status.
    version: u64,
}

/// In-memory signal store (for tests, demos and single-node deployments)
#[derive(Default)]
pub struct InMemorySignalStore {
    records: DashMap<Uuid, Versioned>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn insert(&self, signal: Signal) -> Result<()> {
        debug!(signal_id = %signal.id, symbol = %signal.symbol, "persisting signal");
        self.records.insert(
            signal.id,
            Versioned { signal, version: 0 },
        );
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Signal>> {
        Ok(self.records.get(&id).map(|r| r.signal.clone()))
    }

    async fn list_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.signal.status == status)
            .map(|r| r.signal.clone())
            .collect())
    }

    async fn list_active_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Signal>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.signal.status == SignalStatus::Active && r.signal.tenant_id == tenant_id)
            .map(|r| r.signal.clone())
            .collect())
    }

    async fn transition(&self, id: Uuid, from: SignalStatus, to: SignalStatus) -> Result<Signal> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(PipelineError::SignalNotFound(id))?;

        if record.signal.status != from {
            warn!(
                signal_id = %id,
                expected = ?from,
                found = ?record.signal.status,
                "stale transition attempt"
            );
            return Err(ConflictKind::StaleTransition.into());
        }
        if !from.can_transition_to(to) {
            warn!(signal_id = %id, ?from, ?to, "transition outside the status lattice");
            return Err(ConflictKind::StaleTransition.into());
        }

        record.signal.status = to;
        record.version += 1;
        debug!(signal_id = %id, ?from, ?to, version = record.version, "signal transitioned");
        Ok(record.signal.clone())
    }

    async fn reject(&self, id: Uuid, reason: String) -> Result<Signal> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(PipelineError::SignalNotFound(id))?;

        if record.signal.status != SignalStatus::Candidate {
            return Err(ConflictKind::StaleTransition.into());
        }
        record.signal.status = SignalStatus::Rejected;
        record.signal.rejection_reason = Some(reason);
        record.version += 1;
        Ok(record.signal.clone())
    }

    async fn set_compatibility(&self, id: Uuid, compatibility: Compatibility) -> Result<Signal> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(PipelineError::SignalNotFound(id))?;
        record.signal.compatibility = Some(compatibility);
        record.version += 1;
        Ok(record.signal.clone())
    }

    async fn resize(&self, id: Uuid, quantity: u64) -> Result<Signal> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(PipelineError::SignalNotFound(id))?;

        if record.signal.status.is_terminal() {
            return Err(ConflictKind::StaleTransition.into());
        }
        record.signal.quantity = quantity;
        record.signal.recompute_derived();
        record.version += 1;
        Ok(record.signal.clone())
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<Signal>> {
        let mut expired = Vec::new();
        for mut record in self.records.iter_mut() {
            if record.signal.status == SignalStatus::Active && record.signal.is_expired(now) {
                record.signal.status = SignalStatus::Expired;
                record.version += 1;
                expired.push(record.signal.clone());
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "expired signals swept");
        }
        Ok(expired)
    }
}

//! Process-local registry of in-flight sagas.
//!
//! The registry exists for observability and potential resumption; it is
//! not a durability mechanism. A crash mid-saga loses these entries while
//! the committed partial loan state remains for a later reconciliation
//! pass. Stale terminal entries are harmless, so cleanup is a periodic
//! sweep rather than anything transactional.

use std::sync::Arc;
use std::time::Duration;

use common::{BookId, CorrelationId, LoanId, SagaId, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::data::{LoanReturnSagaData, LoanSagaData};
use crate::loan_lifecycle::{CREATION_SAGA_TYPE, RETURN_SAGA_TYPE};
use crate::state::SagaState;

/// A registry entry: either variant of saga bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "saga_type")]
pub enum SagaRecord {
    /// A loan-creation saga.
    Creation(LoanSagaData),
    /// A loan-return saga.
    Return(LoanReturnSagaData),
}

impl SagaRecord {
    /// Returns the saga identifier.
    pub fn saga_id(&self) -> SagaId {
        match self {
            SagaRecord::Creation(d) => d.saga_id,
            SagaRecord::Return(d) => d.saga_id,
        }
    }

    /// Returns the saga type name.
    pub fn saga_type(&self) -> &'static str {
        match self {
            SagaRecord::Creation(_) => CREATION_SAGA_TYPE,
            SagaRecord::Return(_) => RETURN_SAGA_TYPE,
        }
    }

    /// Returns the correlation id propagated to published events.
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            SagaRecord::Creation(d) => d.correlation_id,
            SagaRecord::Return(d) => d.correlation_id,
        }
    }

    /// Returns the current saga state.
    pub fn state(&self) -> SagaState {
        match self {
            SagaRecord::Creation(d) => d.state,
            SagaRecord::Return(d) => d.state,
        }
    }

    /// Returns the user the saga acts for.
    pub fn user_id(&self) -> UserId {
        match self {
            SagaRecord::Creation(d) => d.user_id,
            SagaRecord::Return(d) => d.user_id,
        }
    }

    /// Returns the book the saga acts on.
    pub fn book_id(&self) -> BookId {
        match self {
            SagaRecord::Creation(d) => d.book_id,
            SagaRecord::Return(d) => d.book_id,
        }
    }

    /// Returns the loan id, once bound.
    pub fn loan_id(&self) -> Option<LoanId> {
        match self {
            SagaRecord::Creation(d) => d.loan_id,
            SagaRecord::Return(d) => Some(d.loan_id),
        }
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            SagaRecord::Creation(d) => d.failure_reason.as_deref(),
            SagaRecord::Return(d) => d.failure_reason.as_deref(),
        }
    }

    /// Returns the retry counter.
    pub fn retry_count(&self) -> u32 {
        match self {
            SagaRecord::Creation(d) => d.retry_count,
            SagaRecord::Return(d) => d.retry_count,
        }
    }
}

/// Concurrency-safe map from saga identifier to in-flight saga state.
///
/// Injected into the orchestrators rather than held as ambient static
/// state, so a durable implementation can replace the in-memory one.
pub trait SagaRegistry: Send + Sync {
    /// Inserts or replaces the snapshot for the record's saga id.
    fn save(&self, record: SagaRecord);

    /// Returns a snapshot of the saga, if present.
    fn get(&self, saga_id: &SagaId) -> Option<SagaRecord>;

    /// Removes and returns the saga, if present.
    fn remove(&self, saga_id: &SagaId) -> Option<SagaRecord>;

    /// Drops entries in terminal states. Returns how many were dropped.
    fn sweep_terminal(&self) -> usize;

    /// Returns the number of registered sagas.
    fn len(&self) -> usize;

    /// Returns true if no sagas are registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry over a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemorySagaRegistry {
    sagas: Arc<DashMap<SagaId, SagaRecord>>,
}

impl InMemorySagaRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every registered saga, in no fixed order.
    pub fn records(&self) -> Vec<SagaRecord> {
        self.sagas.iter().map(|r| r.value().clone()).collect()
    }
}

impl SagaRegistry for InMemorySagaRegistry {
    fn save(&self, record: SagaRecord) {
        self.sagas.insert(record.saga_id(), record);
    }

    fn get(&self, saga_id: &SagaId) -> Option<SagaRecord> {
        self.sagas.get(saga_id).map(|r| r.clone())
    }

    fn remove(&self, saga_id: &SagaId) -> Option<SagaRecord> {
        self.sagas.remove(saga_id).map(|(_, r)| r)
    }

    fn sweep_terminal(&self) -> usize {
        let before = self.sagas.len();
        self.sagas.retain(|_, record| !record.state().is_terminal());
        before - self.sagas.len()
    }

    fn len(&self) -> usize {
        self.sagas.len()
    }
}

/// Spawns a background task that periodically sweeps terminal sagas.
pub fn spawn_terminal_sweeper<R>(registry: R, every: Duration) -> tokio::task::JoinHandle<()>
where
    R: SagaRegistry + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick fires immediately; skip it so a fresh registry is
        // not swept before any saga ran.
        interval.tick().await;
        loop {
            interval.tick().await;
            let swept = registry.sweep_terminal();
            if swept > 0 {
                tracing::debug!(swept, "swept terminal sagas from registry");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LoanSagaData;

    fn record(state: SagaState) -> SagaRecord {
        let mut data = LoanSagaData::begin(UserId::new(1), BookId::new(1));
        data.advance(state);
        SagaRecord::Creation(data)
    }

    #[test]
    fn test_save_and_get() {
        let registry = InMemorySagaRegistry::new();
        let rec = record(SagaState::Started);
        let id = rec.saga_id();

        registry.save(rec);
        let got = registry.get(&id).unwrap();
        assert_eq!(got.saga_id(), id);
        assert_eq!(got.state(), SagaState::Started);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_save_replaces_snapshot() {
        let registry = InMemorySagaRegistry::new();
        let mut data = LoanSagaData::begin(UserId::new(1), BookId::new(1));
        let id = data.saga_id;

        registry.save(SagaRecord::Creation(data.clone()));
        data.advance(SagaState::BookReserved);
        registry.save(SagaRecord::Creation(data));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).unwrap().state(), SagaState::BookReserved);
    }

    #[test]
    fn test_sweep_drops_only_terminal() {
        let registry = InMemorySagaRegistry::new();
        registry.save(record(SagaState::Started));
        registry.save(record(SagaState::Completed));
        registry.save(record(SagaState::Compensated));
        registry.save(record(SagaState::Failed));

        let swept = registry.sweep_terminal();
        assert_eq!(swept, 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove() {
        let registry = InMemorySagaRegistry::new();
        let rec = record(SagaState::Started);
        let id = rec.saga_id();
        registry.save(rec);

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_record_accessors() {
        let mut data = LoanSagaData::begin(UserId::new(7), BookId::new(9));
        data.loan_id = Some(LoanId::new(3));
        let rec = SagaRecord::Creation(data);

        assert_eq!(rec.saga_type(), CREATION_SAGA_TYPE);
        assert_eq!(rec.user_id(), UserId::new(7));
        assert_eq!(rec.book_id(), BookId::new(9));
        assert_eq!(rec.loan_id(), Some(LoanId::new(3)));
        assert_eq!(rec.retry_count(), 0);
        assert!(rec.failure_reason().is_none());
    }
}

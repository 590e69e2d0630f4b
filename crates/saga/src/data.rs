//! Per-execution saga bookkeeping, distinct from the loan it manipulates.

use chrono::{DateTime, Utc};
use common::{BookId, CorrelationId, LoanId, SagaId, UserId};
use domain::LoanStatus;
use serde::{Deserialize, Serialize};

use crate::loan_lifecycle::MAX_SAGA_RETRIES;
use crate::state::SagaState;

/// Bookkeeping for one loan-creation saga execution.
///
/// Owned by the thread running the saga; the registry only ever holds
/// snapshots, so the same saga id is never mutated from two threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSagaData {
    pub saga_id: SagaId,
    pub correlation_id: CorrelationId,
    pub user_id: UserId,
    pub book_id: BookId,
    /// Bound once the loan row exists.
    pub loan_id: Option<LoanId>,
    pub state: SagaState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
}

impl LoanSagaData {
    /// Starts bookkeeping for a new creation saga.
    pub fn begin(user_id: UserId, book_id: BookId) -> Self {
        Self {
            saga_id: SagaId::new(),
            correlation_id: CorrelationId::new(),
            user_id,
            book_id,
            loan_id: None,
            state: SagaState::Started,
            started_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
            retry_count: 0,
        }
    }

    /// Advances the saga along the forward path.
    pub fn advance(&mut self, state: SagaState) {
        self.state = state;
    }

    /// Marks the saga completed and stamps the completion time.
    pub fn complete(&mut self) {
        self.state = SagaState::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the saga failed with the triggering reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = SagaState::Failed;
        self.failure_reason = Some(reason.into());
    }

    /// Counts one retry attempt.
    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Returns true while the retry bound has not been exhausted.
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_SAGA_RETRIES
    }
}

/// Bookkeeping for one loan-return saga execution.
///
/// Same shape as [`LoanSagaData`] plus the pre-saga loan status needed
/// to undo the return, and the late flag computed in step 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanReturnSagaData {
    pub saga_id: SagaId,
    pub correlation_id: CorrelationId,
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    /// Status before the saga started; restored by compensation.
    pub original_status: LoanStatus,
    pub was_overdue: bool,
    pub state: SagaState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
}

impl LoanReturnSagaData {
    /// Starts bookkeeping for a new return saga.
    pub fn begin(
        loan_id: LoanId,
        user_id: UserId,
        book_id: BookId,
        original_status: LoanStatus,
    ) -> Self {
        Self {
            saga_id: SagaId::new(),
            correlation_id: CorrelationId::new(),
            loan_id,
            user_id,
            book_id,
            original_status,
            was_overdue: false,
            state: SagaState::Started,
            started_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
            retry_count: 0,
        }
    }

    /// Advances the saga along the forward path.
    pub fn advance(&mut self, state: SagaState) {
        self.state = state;
    }

    /// Marks the saga completed and stamps the completion time.
    pub fn complete(&mut self) {
        self.state = SagaState::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the saga failed with the triggering reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = SagaState::Failed;
        self.failure_reason = Some(reason.into());
    }

    /// Counts one retry attempt.
    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Returns true while the retry bound has not been exhausted.
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_SAGA_RETRIES
    }
}

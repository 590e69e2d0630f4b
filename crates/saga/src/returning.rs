//! Loan-return saga orchestrator.
//!
//! Mirror image of the creation saga: mark the loan returned locally,
//! give the copy back to the catalog, then record tracking and publish.
//! Compensation reverts the loan to its pre-saga status and clears the
//! return date.

use chrono::Utc;
use common::LoanId;
use domain::{Loan, LoanStore, LoanTrackingService, TrackingStore};

use crate::data::LoanReturnSagaData;
use crate::error::{Result, SagaError};
use crate::events::LoanReturnedEvent;
use crate::loan_lifecycle::{RETURN_SAGA_TYPE, STEP_MARK_RETURNED, STEP_RETURN_BOOK};
use crate::registry::{SagaRecord, SagaRegistry};
use crate::services::{BrokerPublisher, CatalogClient, CatalogError, LoanEventPublisher};
use crate::state::SagaState;

/// Orchestrates loan return across the loan store and the catalog.
pub struct LoanReturnSaga<L, T, C, P, R>
where
    T: TrackingStore,
{
    loans: L,
    tracking: LoanTrackingService<T>,
    catalog: C,
    publisher: LoanEventPublisher<P>,
    registry: R,
}

impl<L, T, C, P, R> LoanReturnSaga<L, T, C, P, R>
where
    L: LoanStore,
    T: TrackingStore,
    C: CatalogClient,
    P: BrokerPublisher,
    R: SagaRegistry,
{
    /// Wires the orchestrator to its collaborators.
    pub fn new(
        loans: L,
        tracking: LoanTrackingService<T>,
        catalog: C,
        publisher: LoanEventPublisher<P>,
        registry: R,
    ) -> Self {
        Self {
            loans,
            tracking,
            catalog,
            publisher,
            registry,
        }
    }

    /// Runs the return saga for one loan.
    ///
    /// On success returns the returned loan and the completed saga
    /// snapshot. On failure, compensation has restored the loan to its
    /// pre-saga status (or the saga is parked in `Failed` when that
    /// restore could not commit) and the triggering error is returned.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, loan_id: LoanId) -> Result<(Loan, LoanReturnSagaData)> {
        let loan = self
            .loans
            .get(loan_id)
            .await?
            .ok_or(SagaError::LoanNotFound(loan_id))?;
        if !loan.status.can_return() {
            return Err(SagaError::InvalidOperation(
                "Loan is not active and cannot be returned".to_string(),
            ));
        }

        let started = std::time::Instant::now();
        let mut saga =
            LoanReturnSagaData::begin(loan.id, loan.user_id, loan.book_id, loan.status);
        self.registry.save(SagaRecord::Return(saga.clone()));
        tracing::info!(
            saga_id = %saga.saga_id,
            correlation_id = %saga.correlation_id,
            %loan_id,
            original_status = loan.status.as_str(),
            "starting loan return saga"
        );
        metrics::counter!("sagas_started_total", "saga_type" => RETURN_SAGA_TYPE).increment(1);

        let result = match self.run_forward(&mut saga, loan).await {
            Ok(loan) => {
                saga.complete();
                self.registry.save(SagaRecord::Return(saga.clone()));
                tracing::info!(saga_id = %saga.saga_id, %loan_id, "loan return saga completed");
                metrics::counter!("sagas_completed_total", "saga_type" => RETURN_SAGA_TYPE)
                    .increment(1);
                Ok((loan, saga))
            }
            Err(err) => Err(self.fail_and_compensate(&mut saga, err).await),
        };
        metrics::histogram!("saga_duration_seconds", "saga_type" => RETURN_SAGA_TYPE)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn run_forward(&self, saga: &mut LoanReturnSagaData, mut loan: Loan) -> Result<Loan> {
        // Step 1: commit the return locally.
        let was_late = loan.mark_returned(Utc::now().date_naive())?;
        let loan = self.loans.update(&loan).await?;
        saga.was_overdue = was_late;
        saga.advance(SagaState::LoanCreated);
        self.registry.save(SagaRecord::Return(saga.clone()));
        tracing::debug!(saga_id = %saga.saga_id, step = STEP_MARK_RETURNED, was_late, "loan marked returned");

        // Step 2: give the copy back to the catalog.
        self.return_book(saga).await?;
        saga.advance(SagaState::BookReserved);
        self.registry.save(SagaRecord::Return(saga.clone()));
        tracing::debug!(saga_id = %saga.saga_id, step = STEP_RETURN_BOOK, "book returned to catalog");

        // Step 3: record tracking and publish the event.
        self.tracking
            .record_returned(loan.id, saga.was_overdue)
            .await?;
        let return_date = loan
            .return_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let event = LoanReturnedEvent::new(
            saga.correlation_id,
            loan.id,
            loan.user_id,
            loan.book_id,
            return_date,
            saga.was_overdue,
        );
        self.publisher.publish_loan_returned(&event).await;

        Ok(loan)
    }

    /// Returns the copy, retrying transient transport failures up to the
    /// saga's retry bound.
    async fn return_book(&self, saga: &mut LoanReturnSagaData) -> Result<()> {
        loop {
            match self.catalog.return_book(saga.book_id).await {
                Ok(()) => return Ok(()),
                Err(CatalogError::Transport(reason)) if saga.can_retry() => {
                    saga.increment_retry();
                    tracing::warn!(
                        saga_id = %saga.saga_id,
                        retry = saga.retry_count,
                        reason,
                        "transient catalog failure, retrying book return"
                    );
                }
                Err(CatalogError::NotFound(id)) => return Err(SagaError::BookNotFound(id)),
                Err(err) => {
                    return Err(SagaError::BookNotAvailable(format!(
                        "Failed to return book to catalog: {err}"
                    )));
                }
            }
        }
    }

    async fn fail_and_compensate(
        &self,
        saga: &mut LoanReturnSagaData,
        err: SagaError,
    ) -> SagaError {
        let reached = saga.state;
        saga.fail(err.to_string());
        self.registry.save(SagaRecord::Return(saga.clone()));
        tracing::error!(
            saga_id = %saga.saga_id,
            reached = reached.as_str(),
            error = %err,
            "loan return saga failed, compensating"
        );
        metrics::counter!("sagas_failed_total", "saga_type" => RETURN_SAGA_TYPE).increment(1);

        saga.advance(SagaState::Compensating);
        self.registry.save(SagaRecord::Return(saga.clone()));

        match self.compensate(saga, reached).await {
            Ok(()) => {
                saga.advance(SagaState::Compensated);
                self.registry.save(SagaRecord::Return(saga.clone()));
                tracing::info!(saga_id = %saga.saga_id, "loan return saga compensated");
                metrics::counter!("sagas_compensated_total", "saga_type" => RETURN_SAGA_TYPE)
                    .increment(1);
                err
            }
            Err(comp_err) => {
                saga.fail(format!("{err}; compensation failed: {comp_err}"));
                self.registry.save(SagaRecord::Return(saga.clone()));
                tracing::error!(
                    saga_id = %saga.saga_id,
                    error = %comp_err,
                    "loan return saga compensation failed"
                );
                metrics::counter!(
                    "saga_compensation_failures_total",
                    "saga_type" => RETURN_SAGA_TYPE
                )
                .increment(1);
                SagaError::CompensationFailed(comp_err.to_string())
            }
        }
    }

    /// Undoes committed forward steps in reverse order.
    async fn compensate(&self, saga: &LoanReturnSagaData, reached: SagaState) -> Result<()> {
        if reached == SagaState::BookReserved {
            // Best effort, same as the creation saga's catalog undo.
            if let Err(err) = self.catalog.borrow_book(saga.book_id).await {
                tracing::warn!(
                    saga_id = %saga.saga_id,
                    book_id = %saga.book_id,
                    error = %err,
                    "failed to re-borrow copy during compensation"
                );
            }
        }

        if matches!(reached, SagaState::LoanCreated | SagaState::BookReserved) {
            let mut loan = self
                .loans
                .get(saga.loan_id)
                .await?
                .ok_or(SagaError::LoanNotFound(saga.loan_id))?;
            loan.revert_return(saga.original_status)?;
            self.loans.update(&loan).await?;
            let reason = saga.failure_reason.as_deref().unwrap_or("saga failed");
            self.tracking
                .record_cancelled(
                    saga.loan_id,
                    &format!("Return cancelled due to saga failure: {reason}"),
                )
                .await?;
        }

        Ok(())
    }
}

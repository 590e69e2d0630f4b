//! Loan-creation saga orchestrator.
//!
//! Forward path: insert a pending loan row, reserve a copy on the
//! catalog, then activate the loan, write the audit entry and publish
//! the event. Each step commits locally before the next begins; on
//! failure the committed steps are compensated in reverse order.

use chrono::Utc;
use common::{BookId, UserId};
use domain::{Loan, LoanStore, LoanTrackingService, NewLoan, TrackingStore};

use crate::data::LoanSagaData;
use crate::error::{Result, SagaError};
use crate::events::LoanCreatedEvent;
use crate::loan_lifecycle::{
    CREATION_SAGA_TYPE, DEFAULT_LOAN_PERIOD_DAYS, STEP_CREATE_LOAN, STEP_FINALIZE,
    STEP_RESERVE_BOOK,
};
use crate::registry::{SagaRecord, SagaRegistry};
use crate::services::{BrokerPublisher, CatalogClient, CatalogError, LoanEventPublisher};
use crate::state::SagaState;

/// Orchestrates loan creation across the loan store and the catalog.
pub struct LoanCreationSaga<L, T, C, P, R>
where
    T: TrackingStore,
{
    loans: L,
    tracking: LoanTrackingService<T>,
    catalog: C,
    publisher: LoanEventPublisher<P>,
    registry: R,
}

impl<L, T, C, P, R> LoanCreationSaga<L, T, C, P, R>
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

    /// Runs the creation saga for one user/book pair.
    ///
    /// On success returns the active loan and the completed saga
    /// snapshot. On failure, compensation has already run (or the saga
    /// is parked in `Failed` when compensation itself could not commit)
    /// and the triggering error is returned.
    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<(Loan, LoanSagaData)> {
        // Advisory pre-checks. They reject the obvious failures early but
        // do not reserve anything; the catalog's atomic copy decrement in
        // step 2 is the real gate against concurrent creations.
        let summary = match self.catalog.check_availability(book_id).await {
            Ok(summary) => summary,
            Err(CatalogError::NotFound(id)) => return Err(SagaError::BookNotFound(id)),
            Err(err) => {
                return Err(SagaError::BookNotAvailable(format!(
                    "Unable to verify book availability: {err}"
                )));
            }
        };
        if summary.available_copies == 0 {
            return Err(SagaError::BookNotAvailable(format!(
                "Book is not available for loan: {}",
                summary.title
            )));
        }
        if self.loans.has_active_loan(user_id, book_id).await? {
            return Err(SagaError::InvalidOperation(
                "User already has an active loan for this book".to_string(),
            ));
        }

        let started = std::time::Instant::now();
        let mut saga = LoanSagaData::begin(user_id, book_id);
        self.registry.save(SagaRecord::Creation(saga.clone()));
        tracing::info!(
            saga_id = %saga.saga_id,
            correlation_id = %saga.correlation_id,
            %user_id,
            %book_id,
            "starting loan creation saga"
        );
        metrics::counter!("sagas_started_total", "saga_type" => CREATION_SAGA_TYPE).increment(1);

        let result = match self.run_forward(&mut saga).await {
            Ok(loan) => {
                saga.complete();
                self.registry.save(SagaRecord::Creation(saga.clone()));
                tracing::info!(saga_id = %saga.saga_id, loan_id = %loan.id, "loan creation saga completed");
                metrics::counter!("sagas_completed_total", "saga_type" => CREATION_SAGA_TYPE)
                    .increment(1);
                Ok((loan, saga))
            }
            Err(err) => Err(self.fail_and_compensate(&mut saga, err).await),
        };
        metrics::histogram!("saga_duration_seconds", "saga_type" => CREATION_SAGA_TYPE)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn run_forward(&self, saga: &mut LoanSagaData) -> Result<Loan> {
        // Step 1: commit the pending loan row locally.
        let new_loan = NewLoan::pending(
            saga.user_id,
            saga.book_id,
            Utc::now().date_naive(),
            DEFAULT_LOAN_PERIOD_DAYS,
        );
        let mut loan = self.loans.insert(new_loan).await?;
        saga.loan_id = Some(loan.id);
        saga.advance(SagaState::LoanCreated);
        self.registry.save(SagaRecord::Creation(saga.clone()));
        tracing::debug!(saga_id = %saga.saga_id, loan_id = %loan.id, step = STEP_CREATE_LOAN, "pending loan created");

        // Step 2: reserve a copy on the catalog.
        self.reserve_book(saga).await?;
        saga.advance(SagaState::BookReserved);
        self.registry.save(SagaRecord::Creation(saga.clone()));
        tracing::debug!(saga_id = %saga.saga_id, step = STEP_RESERVE_BOOK, "book reserved");

        // Step 3: activate the loan, record tracking, publish the event.
        loan.activate()?;
        let loan = self.loans.update(&loan).await?;
        self.tracking
            .record_created(loan.id, loan.user_id, loan.book_id)
            .await?;
        let event = LoanCreatedEvent::new(
            saga.correlation_id,
            loan.id,
            loan.user_id,
            loan.book_id,
            loan.loan_date,
            loan.due_date,
            loan.status.as_str(),
        );
        self.publisher.publish_loan_created(&event).await;
        tracing::debug!(saga_id = %saga.saga_id, loan_id = %loan.id, step = STEP_FINALIZE, "loan activated");

        Ok(loan)
    }

    /// Reserves a copy, retrying transient transport failures up to the
    /// saga's retry bound. Business rejections fail immediately.
    async fn reserve_book(&self, saga: &mut LoanSagaData) -> Result<()> {
        loop {
            match self.catalog.borrow_book(saga.book_id).await {
                Ok(()) => return Ok(()),
                Err(CatalogError::Transport(reason)) if saga.can_retry() => {
                    saga.increment_retry();
                    tracing::warn!(
                        saga_id = %saga.saga_id,
                        retry = saga.retry_count,
                        reason,
                        "transient catalog failure, retrying reservation"
                    );
                }
                Err(CatalogError::NotFound(id)) => return Err(SagaError::BookNotFound(id)),
                Err(err) => {
                    return Err(SagaError::BookNotAvailable(format!(
                        "Failed to reserve book: {err}"
                    )));
                }
            }
        }
    }

    /// Records the failure and runs compensation, returning the error the
    /// caller should see.
    async fn fail_and_compensate(&self, saga: &mut LoanSagaData, err: SagaError) -> SagaError {
        // Snapshot how far the forward path got before the state machine
        // moves into the compensation phase.
        let reached = saga.state;
        saga.fail(err.to_string());
        self.registry.save(SagaRecord::Creation(saga.clone()));
        tracing::error!(
            saga_id = %saga.saga_id,
            reached = reached.as_str(),
            error = %err,
            "loan creation saga failed, compensating"
        );
        metrics::counter!("sagas_failed_total", "saga_type" => CREATION_SAGA_TYPE).increment(1);

        saga.advance(SagaState::Compensating);
        self.registry.save(SagaRecord::Creation(saga.clone()));

        match self.compensate(saga, reached).await {
            Ok(()) => {
                saga.advance(SagaState::Compensated);
                self.registry.save(SagaRecord::Creation(saga.clone()));
                tracing::info!(saga_id = %saga.saga_id, "loan creation saga compensated");
                metrics::counter!("sagas_compensated_total", "saga_type" => CREATION_SAGA_TYPE)
                    .increment(1);
                err
            }
            Err(comp_err) => {
                // Park the saga in Failed so the sweeper keeps it visible
                // for manual reconciliation.
                saga.fail(format!("{err}; compensation failed: {comp_err}"));
                self.registry.save(SagaRecord::Creation(saga.clone()));
                tracing::error!(
                    saga_id = %saga.saga_id,
                    error = %comp_err,
                    "loan creation saga compensation failed"
                );
                metrics::counter!(
                    "saga_compensation_failures_total",
                    "saga_type" => CREATION_SAGA_TYPE
                )
                .increment(1);
                SagaError::CompensationFailed(comp_err.to_string())
            }
        }
    }

    /// Undoes committed forward steps in reverse order.
    async fn compensate(&self, saga: &LoanSagaData, reached: SagaState) -> Result<()> {
        if reached == SagaState::BookReserved {
            // Best effort: a failed release leaves the copy count off by
            // one until the catalog reconciles, which is tolerable. The
            // local cancellation below is not.
            if let Err(err) = self.catalog.return_book(saga.book_id).await {
                tracing::warn!(
                    saga_id = %saga.saga_id,
                    book_id = %saga.book_id,
                    error = %err,
                    "failed to release reserved copy during compensation"
                );
            }
        }

        if let Some(loan_id) = saga.loan_id {
            let mut loan = self
                .loans
                .get(loan_id)
                .await?
                .ok_or(SagaError::LoanNotFound(loan_id))?;
            loan.cancel()?;
            self.loans.update(&loan).await?;
            let reason = saga.failure_reason.as_deref().unwrap_or("saga failed");
            self.tracking.record_cancelled(loan_id, reason).await?;
        }

        Ok(())
    }
}

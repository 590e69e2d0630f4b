//! Loan read paths and non-saga mutations (extension, overdue sweep).
//!
//! Borrow and return go through the saga orchestrators; everything here
//! touches only state owned by the loan service and commits in one step.

use chrono::NaiveDate;
use common::{BookId, LoanId, UserId};

use crate::error::{DomainError, Result};
use crate::loan::Loan;
use crate::store::{LoanStore, TrackingStore};
use crate::tracking::{LoanTrackingService, TrackingEntry};

/// High-level API over the loan and tracking stores.
pub struct LoanService<L: LoanStore, T: TrackingStore> {
    loans: L,
    tracking: LoanTrackingService<T>,
}

impl<L: LoanStore, T: TrackingStore> LoanService<L, T> {
    /// Creates a new loan service.
    pub fn new(loans: L, tracking_store: T) -> Self {
        Self {
            loans,
            tracking: LoanTrackingService::new(tracking_store),
        }
    }

    /// Loads a loan by ID.
    pub async fn get_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.loans
            .get(loan_id)
            .await?
            .ok_or(DomainError::LoanNotFound(loan_id))
    }

    /// Returns all loans for a user.
    pub async fn loans_for_user(&self, user_id: UserId) -> Result<Vec<Loan>> {
        Ok(self.loans.find_by_user(user_id).await?)
    }

    /// Returns the user's active loans.
    pub async fn active_loans_for_user(&self, user_id: UserId) -> Result<Vec<Loan>> {
        Ok(self
            .loans
            .find_by_user_and_status(user_id, crate::loan::LoanStatus::Active)
            .await?)
    }

    /// Returns all loans for a book.
    pub async fn loans_for_book(&self, book_id: BookId) -> Result<Vec<Loan>> {
        Ok(self.loans.find_by_book(book_id).await?)
    }

    /// Returns active loans past their due date as of `today`.
    pub async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<Loan>> {
        Ok(self.loans.find_overdue(today).await?)
    }

    /// Returns the tracking history for a loan, newest first.
    pub async fn history(&self, loan_id: LoanId) -> Result<Vec<TrackingEntry>> {
        self.tracking.history(loan_id).await
    }

    /// Extends an active loan's due date and records the extension.
    #[tracing::instrument(skip(self))]
    pub async fn extend_loan(&self, loan_id: LoanId, additional_days: u32) -> Result<Loan> {
        let mut loan = self.get_loan(loan_id).await?;
        let (old_due, new_due) = loan.extend(additional_days)?;
        let saved = self.loans.update(&loan).await?;

        self.tracking
            .record_extended(loan_id, old_due, new_due, additional_days)
            .await?;

        tracing::info!(%loan_id, %old_due, %new_due, "loan extended");
        Ok(saved)
    }

    /// Flips active loans past their due date to overdue and records each.
    ///
    /// Intended for a periodic sweep. Returns the number of loans flipped.
    #[tracing::instrument(skip(self))]
    pub async fn mark_overdue_loans(&self, today: NaiveDate) -> Result<usize> {
        let overdue = self.loans.find_overdue(today).await?;
        let count = overdue.len();

        for mut loan in overdue {
            loan.status = crate::loan::LoanStatus::Overdue;
            self.loans.update(&loan).await?;
            self.tracking.record_overdue(loan.id).await?;
        }

        if count > 0 {
            tracing::info!(count, "marked loans overdue");
        }
        Ok(count)
    }
}

//! Append-only audit trail of loan-lifecycle transitions.

use chrono::{DateTime, NaiveDate, Utc};
use common::{BookId, LoanId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loan::LoanStatus;
use crate::store::TrackingStore;

/// Actor recorded on saga-driven transitions.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// One audit-trail record. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub id: i64,
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub timestamp: DateTime<Utc>,
    pub notes: String,
    pub changed_by: String,
}

/// Insert shape for a tracking entry; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewTrackingEntry {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub notes: String,
    pub changed_by: String,
}

impl NewTrackingEntry {
    fn system(loan_id: LoanId, status: LoanStatus, notes: String) -> Self {
        Self {
            loan_id,
            status,
            notes,
            changed_by: SYSTEM_ACTOR.to_string(),
        }
    }
}

/// Records loan-lifecycle transitions. Pure append: replaying the same
/// record call twice produces two entries by design.
pub struct LoanTrackingService<T: TrackingStore> {
    store: T,
}

impl<T: TrackingStore> LoanTrackingService<T> {
    /// Creates a new tracking service over the given store.
    pub fn new(store: T) -> Self {
        Self { store }
    }

    /// Records that a loan was created and activated.
    #[tracing::instrument(skip(self))]
    pub async fn record_created(
        &self,
        loan_id: LoanId,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<()> {
        self.store
            .append(NewTrackingEntry::system(
                loan_id,
                LoanStatus::Active,
                format!("Loan created for user {user_id}, book {book_id}"),
            ))
            .await?;
        tracing::info!(%loan_id, %user_id, %book_id, "recorded loan creation");
        Ok(())
    }

    /// Records that a loan was returned, noting whether it was overdue.
    #[tracing::instrument(skip(self))]
    pub async fn record_returned(&self, loan_id: LoanId, was_overdue: bool) -> Result<()> {
        let notes = if was_overdue {
            "Loan returned (was overdue)"
        } else {
            "Loan returned on time"
        };
        self.store
            .append(NewTrackingEntry::system(
                loan_id,
                LoanStatus::Returned,
                notes.to_string(),
            ))
            .await?;
        tracing::info!(%loan_id, was_overdue, "recorded loan return");
        Ok(())
    }

    /// Records a due-date extension.
    #[tracing::instrument(skip(self))]
    pub async fn record_extended(
        &self,
        loan_id: LoanId,
        old_due_date: NaiveDate,
        new_due_date: NaiveDate,
        additional_days: u32,
    ) -> Result<()> {
        self.store
            .append(NewTrackingEntry::system(
                loan_id,
                LoanStatus::Active,
                format!(
                    "Loan extended by {additional_days} days. \
                     Old due date: {old_due_date}, New due date: {new_due_date}"
                ),
            ))
            .await?;
        tracing::info!(%loan_id, additional_days, "recorded loan extension");
        Ok(())
    }

    /// Records that a loan was marked overdue.
    #[tracing::instrument(skip(self))]
    pub async fn record_overdue(&self, loan_id: LoanId) -> Result<()> {
        self.store
            .append(NewTrackingEntry::system(
                loan_id,
                LoanStatus::Overdue,
                "Loan marked as overdue".to_string(),
            ))
            .await?;
        tracing::info!(%loan_id, "recorded loan overdue");
        Ok(())
    }

    /// Records a cancellation performed by saga compensation.
    #[tracing::instrument(skip(self))]
    pub async fn record_cancelled(&self, loan_id: LoanId, reason: &str) -> Result<()> {
        self.store
            .append(NewTrackingEntry::system(
                loan_id,
                LoanStatus::Cancelled,
                format!("Loan cancelled: {reason}"),
            ))
            .await?;
        tracing::info!(%loan_id, reason, "recorded loan cancellation");
        Ok(())
    }

    /// Returns the history for a loan, most recent entry first.
    pub async fn history(&self, loan_id: LoanId) -> Result<Vec<TrackingEntry>> {
        Ok(self.store.history(loan_id).await?)
    }
}

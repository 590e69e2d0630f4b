//! Store ports for loan rows and tracking entries.
//!
//! The loan service owns both tables; the catalog service never reads or
//! writes them. Each write through these traits commits independently,
//! which is what lets a saga leave committed partial state behind for a
//! later compensation pass.

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookId, LoanId, UserId};

use crate::error::StoreError;
use crate::loan::{Loan, LoanStatus, NewLoan};
use crate::tracking::{NewTrackingEntry, TrackingEntry};

/// Persistent store of loan rows.
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Inserts a new loan row and returns it with its assigned identifier.
    async fn insert(&self, loan: NewLoan) -> Result<Loan, StoreError>;

    /// Loads a loan by ID.
    async fn get(&self, id: LoanId) -> Result<Option<Loan>, StoreError>;

    /// Persists the given loan state over the existing row.
    async fn update(&self, loan: &Loan) -> Result<Loan, StoreError>;

    /// Returns all loans for a user.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Loan>, StoreError>;

    /// Returns loans for a user filtered by status.
    async fn find_by_user_and_status(
        &self,
        user_id: UserId,
        status: LoanStatus,
    ) -> Result<Vec<Loan>, StoreError>;

    /// Returns all loans for a book.
    async fn find_by_book(&self, book_id: BookId) -> Result<Vec<Loan>, StoreError>;

    /// Returns active loans whose due date lies before `today`.
    async fn find_overdue(&self, today: NaiveDate) -> Result<Vec<Loan>, StoreError>;

    /// Returns true if the user already holds an active loan for the book.
    ///
    /// Advisory read; it can race with a concurrent creation for the same
    /// user/book pair (see the creation saga's pre-checks).
    async fn has_active_loan(&self, user_id: UserId, book_id: BookId)
    -> Result<bool, StoreError>;
}

/// Append-only store of loan-lifecycle tracking entries.
///
/// Entries are never updated or deleted through this port.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Appends a tracking entry and returns it with its assigned identifier.
    async fn append(&self, entry: NewTrackingEntry) -> Result<TrackingEntry, StoreError>;

    /// Returns the history for a loan, most recent entry first.
    async fn history(&self, loan_id: LoanId) -> Result<Vec<TrackingEntry>, StoreError>;
}

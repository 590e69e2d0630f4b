//! In-memory store implementations for testing and local runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{BookId, LoanId, UserId};

use crate::error::StoreError;
use crate::loan::{Loan, LoanStatus, NewLoan};
use crate::store::{LoanStore, TrackingStore};
use crate::tracking::{NewTrackingEntry, TrackingEntry};

#[derive(Debug, Default)]
struct LoanState {
    loans: HashMap<i64, Loan>,
    next_id: i64,
    fail_on_insert: bool,
    fail_on_update: bool,
}

/// In-memory loan store.
///
/// Provides the same interface as the PostgreSQL implementation, plus
/// failure switches for exercising saga compensation paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoanStore {
    state: Arc<RwLock<LoanState>>,
}

impl InMemoryLoanStore {
    /// Creates a new empty in-memory loan store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail inserts.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().unwrap().fail_on_insert = fail;
    }

    /// Configures the store to fail updates.
    pub fn set_fail_on_update(&self, fail: bool) {
        self.state.write().unwrap().fail_on_update = fail;
    }

    /// Returns the number of loan rows.
    pub fn loan_count(&self) -> usize {
        self.state.read().unwrap().loans.len()
    }
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn insert(&self, loan: NewLoan) -> Result<Loan, StoreError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_insert {
            return Err(StoreError::Database("insert failed".to_string()));
        }

        state.next_id += 1;
        let now = Utc::now();
        let row = Loan {
            id: LoanId::new(state.next_id),
            user_id: loan.user_id,
            book_id: loan.book_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            status: loan.status,
            created_at: now,
            updated_at: now,
        };
        state.loans.insert(row.id.value(), row.clone());
        Ok(row)
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>, StoreError> {
        Ok(self.state.read().unwrap().loans.get(&id.value()).cloned())
    }

    async fn update(&self, loan: &Loan) -> Result<Loan, StoreError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_update {
            return Err(StoreError::Database("update failed".to_string()));
        }
        if !state.loans.contains_key(&loan.id.value()) {
            return Err(StoreError::RowMissing(loan.id));
        }

        let mut row = loan.clone();
        row.updated_at = Utc::now();
        state.loans.insert(row.id.value(), row.clone());
        Ok(row)
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Loan>, StoreError> {
        let state = self.state.read().unwrap();
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    async fn find_by_user_and_status(
        &self,
        user_id: UserId,
        status: LoanStatus,
    ) -> Result<Vec<Loan>, StoreError> {
        let state = self.state.read().unwrap();
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.user_id == user_id && l.status == status)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    async fn find_by_book(&self, book_id: BookId) -> Result<Vec<Loan>, StoreError> {
        let state = self.state.read().unwrap();
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.book_id == book_id)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    async fn find_overdue(&self, today: NaiveDate) -> Result<Vec<Loan>, StoreError> {
        let state = self.state.read().unwrap();
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Active && l.due_date < today)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    async fn has_active_loan(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<bool, StoreError> {
        let state = self.state.read().unwrap();
        Ok(state
            .loans
            .values()
            .any(|l| l.user_id == user_id && l.book_id == book_id && l.is_active()))
    }
}

#[derive(Debug, Default)]
struct TrackingState {
    entries: Vec<TrackingEntry>,
    next_id: i64,
}

/// In-memory tracking store. Append-only, like its PostgreSQL counterpart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrackingStore {
    state: Arc<RwLock<TrackingState>>,
}

impl InMemoryTrackingStore {
    /// Creates a new empty in-memory tracking store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries across all loans.
    pub fn entry_count(&self) -> usize {
        self.state.read().unwrap().entries.len()
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn append(&self, entry: NewTrackingEntry) -> Result<TrackingEntry, StoreError> {
        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let row = TrackingEntry {
            id: state.next_id,
            loan_id: entry.loan_id,
            status: entry.status,
            timestamp: Utc::now(),
            notes: entry.notes,
            changed_by: entry.changed_by,
        };
        state.entries.push(row.clone());
        Ok(row)
    }

    async fn history(&self, loan_id: LoanId) -> Result<Vec<TrackingEntry>, StoreError> {
        let state = self.state.read().unwrap();
        let mut entries: Vec<TrackingEntry> = state
            .entries
            .iter()
            .filter(|e| e.loan_id == loan_id)
            .cloned()
            .collect();
        // Ids are monotonic, so reverse id order is newest-first even when
        // timestamps collide.
        entries.sort_by_key(|e| std::cmp::Reverse(e.id));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_loan(user: i64, book: i64) -> NewLoan {
        NewLoan::pending(
            UserId::new(user),
            BookId::new(book),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            14,
        )
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = InMemoryLoanStore::new();
        let a = store.insert(pending_loan(1, 1)).await.unwrap();
        let b = store.insert(pending_loan(1, 2)).await.unwrap();
        assert_eq!(a.id, LoanId::new(1));
        assert_eq!(b.id, LoanId::new(2));
        assert_eq!(store.loan_count(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_row_fails() {
        let store = InMemoryLoanStore::new();
        let mut loan = store.insert(pending_loan(1, 1)).await.unwrap();
        loan.id = LoanId::new(99);
        let err = store.update(&loan).await.unwrap_err();
        assert!(matches!(err, StoreError::RowMissing(_)));
    }

    #[tokio::test]
    async fn test_fail_on_update_switch() {
        let store = InMemoryLoanStore::new();
        let loan = store.insert(pending_loan(1, 1)).await.unwrap();
        store.set_fail_on_update(true);
        assert!(store.update(&loan).await.is_err());
        store.set_fail_on_update(false);
        assert!(store.update(&loan).await.is_ok());
    }

    #[tokio::test]
    async fn test_has_active_loan_ignores_other_statuses() {
        let store = InMemoryLoanStore::new();
        let mut loan = store.insert(pending_loan(1, 1)).await.unwrap();
        assert!(
            !store
                .has_active_loan(UserId::new(1), BookId::new(1))
                .await
                .unwrap()
        );

        loan.activate().unwrap();
        store.update(&loan).await.unwrap();
        assert!(
            store
                .has_active_loan(UserId::new(1), BookId::new(1))
                .await
                .unwrap()
        );
        assert!(
            !store
                .has_active_loan(UserId::new(2), BookId::new(1))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_find_overdue_only_matches_active_past_due() {
        let store = InMemoryLoanStore::new();
        let mut past_due = store.insert(pending_loan(1, 1)).await.unwrap();
        past_due.activate().unwrap();
        store.update(&past_due).await.unwrap();

        let later = past_due.due_date + chrono::Duration::days(1);
        assert_eq!(store.find_overdue(later).await.unwrap().len(), 1);
        assert_eq!(store.find_overdue(past_due.due_date).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_tracking_history_newest_first() {
        let store = InMemoryTrackingStore::new();
        for notes in ["first", "second", "third"] {
            store
                .append(NewTrackingEntry {
                    loan_id: LoanId::new(1),
                    status: LoanStatus::Active,
                    notes: notes.to_string(),
                    changed_by: "SYSTEM".to_string(),
                })
                .await
                .unwrap();
        }

        let history = store.history(LoanId::new(1)).await.unwrap();
        let notes: Vec<&str> = history.iter().map(|e| e.notes.as_str()).collect();
        assert_eq!(notes, vec!["third", "second", "first"]);
    }
}

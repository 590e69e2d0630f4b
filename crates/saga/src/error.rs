//! Saga error taxonomy.

use common::{BookId, LoanId};
use domain::{DomainError, StoreError};
use thiserror::Error;

/// Errors surfaced by saga execution.
///
/// A failed saga re-raises the original domain error after compensation;
/// `CompensationFailed` replaces it only when the local compensation
/// write itself could not be committed.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Referenced book does not exist in the catalog.
    #[error("Book not found with ID: {0}")]
    BookNotFound(BookId),

    /// Book has no available copies, or a catalog call failed.
    #[error("Book not available: {0}")]
    BookNotAvailable(String),

    /// Referenced loan does not exist.
    #[error("Loan not found with ID: {0}")]
    LoanNotFound(LoanId),

    /// The loan state machine forbids the requested operation.
    #[error("Invalid loan operation: {0}")]
    InvalidOperation(String),

    /// Compensation itself failed; the system may now be inconsistent
    /// and requires manual reconciliation.
    #[error("Failed to compensate saga: {0}")]
    CompensationFailed(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

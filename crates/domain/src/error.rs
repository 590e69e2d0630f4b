//! Domain error types.

use common::LoanId;
use thiserror::Error;

use crate::loan::LoanStatus;

/// Errors raised by the loan record store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("Loan row not found: {0}")]
    RowMissing(LoanId),

    /// Underlying database failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Referenced loan does not exist.
    #[error("Loan not found with ID: {0}")]
    LoanNotFound(LoanId),

    /// The loan state machine forbids the requested transition.
    #[error("Cannot {action} a {status} loan")]
    InvalidTransition {
        action: &'static str,
        status: LoanStatus,
    },

    /// The caller attempted an operation the domain rules forbid.
    #[error("Invalid loan operation: {0}")]
    InvalidOperation(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;

//! Shared identifier types for the library loan system.

pub mod types;

pub use types::{BookId, CorrelationId, LoanId, SagaId, UserId};

//! Domain layer for the library loan system.
//!
//! This crate provides:
//! - the `Loan` entity and its `LoanStatus` state machine
//! - store ports (`LoanStore`, `TrackingStore`) with in-memory
//!   implementations for tests and local runs
//! - the append-only `LoanTrackingService` audit trail
//! - the `LoanService` read/extension surface

pub mod error;
pub mod loan;
pub mod memory;
pub mod service;
pub mod store;
pub mod tracking;

pub use error::{DomainError, StoreError};
pub use loan::{Loan, LoanStatus, MAX_EXTENSION_DAYS, NewLoan};
pub use memory::{InMemoryLoanStore, InMemoryTrackingStore};
pub use service::LoanService;
pub use store::{LoanStore, TrackingStore};
pub use tracking::{LoanTrackingService, NewTrackingEntry, SYSTEM_ACTOR, TrackingEntry};

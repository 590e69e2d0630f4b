//! PostgreSQL implementations of the loan and tracking store ports.
//!
//! Each call commits its own transaction; there is deliberately no
//! cross-call transaction so that every saga step is its own local
//! commit boundary.

pub mod postgres;

pub use postgres::{PostgresLoanStore, PostgresTrackingStore};

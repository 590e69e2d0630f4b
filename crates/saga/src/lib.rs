//! Saga orchestration for the loan lifecycle.
//!
//! The loan service owns loan rows; the catalog service owns copy
//! counts. Neither participates in a distributed transaction, so loan
//! creation and return run as sagas: ordered steps that each commit
//! locally, compensated in reverse order when a later step fails.

pub mod creation;
pub mod data;
pub mod error;
pub mod events;
pub mod loan_lifecycle;
pub mod registry;
pub mod returning;
pub mod services;
pub mod state;

pub use creation::LoanCreationSaga;
pub use data::{LoanReturnSagaData, LoanSagaData};
pub use error::{Result, SagaError};
pub use events::{LoanCreatedEvent, LoanReturnedEvent};
pub use loan_lifecycle::{DEFAULT_LOAN_PERIOD_DAYS, MAX_SAGA_RETRIES};
pub use registry::{spawn_terminal_sweeper, InMemorySagaRegistry, SagaRecord, SagaRegistry};
pub use returning::LoanReturnSaga;
pub use services::{
    BookSummary, BrokerPublisher, CatalogClient, CatalogError, InMemoryBroker,
    InMemoryCatalogService, LoanEventPublisher, PublishError,
};
pub use state::SagaState;

//! External service boundaries the sagas call across.

pub mod catalog;
pub mod publisher;

pub use catalog::{BookSummary, CatalogClient, CatalogError, InMemoryCatalogService};
pub use publisher::{
    BrokerPublisher, CapturedMessage, InMemoryBroker, LoanEventPublisher, PublishError,
    EVENTS_EXCHANGE, LOAN_CREATED_KEY, LOAN_RETURNED_KEY,
};

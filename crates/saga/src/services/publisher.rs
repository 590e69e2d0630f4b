//! Fire-and-forget event publishing to the message broker.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::BookId;
use serde::Serialize;
use thiserror::Error;

use crate::events::{LoanCreatedEvent, LoanReturnedEvent};

/// Exchange all loan events are published to.
pub const EVENTS_EXCHANGE: &str = "library.events";

/// Routing key for loan-created events.
pub const LOAN_CREATED_KEY: &str = "loan.created";

/// Routing key for loan-returned events.
pub const LOAN_RETURNED_KEY: &str = "loan.returned";

/// Error publishing a message to the broker.
#[derive(Debug, Error)]
#[error("broker publish failed: {0}")]
pub struct PublishError(pub String);

/// Low-level broker publish interface.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Publishes a JSON payload to an exchange under a routing key.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError>;
}

/// A message captured by the in-memory broker.
#[derive(Debug, Clone)]
pub struct CapturedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Default)]
struct BrokerState {
    messages: Vec<CapturedMessage>,
    fail_on_publish: bool,
}

/// In-memory broker for testing. Records every published message.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
}

impl InMemoryBroker {
    /// Creates a new empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures publish calls to fail.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns all captured messages in publish order.
    pub fn messages(&self) -> Vec<CapturedMessage> {
        self.state.read().unwrap().messages.clone()
    }

    /// Returns the number of captured messages.
    pub fn message_count(&self) -> usize {
        self.state.read().unwrap().messages.len()
    }

    /// Returns captured messages matching a routing key.
    pub fn messages_for(&self, routing_key: &str) -> Vec<CapturedMessage> {
        self.state
            .read()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BrokerPublisher for InMemoryBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_publish {
            return Err(PublishError("broker connection lost".to_string()));
        }
        state.messages.push(CapturedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Publishes loan lifecycle events, swallowing every failure.
///
/// Event delivery is best-effort by contract: a broker outage must never
/// fail or roll back the saga that already committed. Failures are logged
/// and the saga proceeds.
#[derive(Debug, Clone)]
pub struct LoanEventPublisher<P> {
    broker: P,
}

impl<P: BrokerPublisher> LoanEventPublisher<P> {
    /// Creates a publisher over a broker.
    pub fn new(broker: P) -> Self {
        Self { broker }
    }

    /// Publishes a loan-created event. Never fails.
    pub async fn publish_loan_created(&self, event: &LoanCreatedEvent) {
        self.publish_event(LOAN_CREATED_KEY, event, event.loan_id.value(), event.book_id)
            .await;
    }

    /// Publishes a loan-returned event. Never fails.
    pub async fn publish_loan_returned(&self, event: &LoanReturnedEvent) {
        self.publish_event(LOAN_RETURNED_KEY, event, event.loan_id.value(), event.book_id)
            .await;
    }

    async fn publish_event<E: Serialize>(
        &self,
        routing_key: &str,
        event: &E,
        loan_id: i64,
        book_id: BookId,
    ) {
        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(
                    routing_key,
                    loan_id,
                    %book_id,
                    error = %err,
                    "failed to serialize loan event, dropping it"
                );
                return;
            }
        };

        match self
            .broker
            .publish(EVENTS_EXCHANGE, routing_key, payload)
            .await
        {
            Ok(()) => {
                tracing::debug!(routing_key, loan_id, %book_id, "published loan event");
                metrics::counter!("loan_events_published_total", "routing_key" => routing_key.to_string())
                    .increment(1);
            }
            Err(err) => {
                tracing::error!(
                    routing_key,
                    loan_id,
                    %book_id,
                    error = %err,
                    "failed to publish loan event, continuing"
                );
                metrics::counter!("loan_events_dropped_total", "routing_key" => routing_key.to_string())
                    .increment(1);
            }
        }
    }
}

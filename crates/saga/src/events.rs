//! Integration events published to the broker after a saga commits.

use chrono::{DateTime, NaiveDate, Utc};
use common::{BookId, CorrelationId, LoanId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type name on the wire for loan creation.
pub const LOAN_CREATED_EVENT_TYPE: &str = "LOAN_CREATED";

/// Event type name on the wire for loan return.
pub const LOAN_RETURNED_EVENT_TYPE: &str = "LOAN_RETURNED";

/// Published after a creation saga completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanCreatedEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
}

impl LoanCreatedEvent {
    /// Builds the event with a fresh event id and timestamp.
    pub fn new(
        correlation_id: CorrelationId,
        loan_id: LoanId,
        user_id: UserId,
        book_id: BookId,
        loan_date: NaiveDate,
        due_date: NaiveDate,
        status: &str,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: LOAN_CREATED_EVENT_TYPE.to_string(),
            correlation_id,
            timestamp: Utc::now(),
            loan_id,
            user_id,
            book_id,
            loan_date,
            due_date,
            status: status.to_string(),
        }
    }
}

/// Published after a return saga completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanReturnedEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub return_date: NaiveDate,
    pub was_overdue: bool,
}

impl LoanReturnedEvent {
    /// Builds the event with a fresh event id and timestamp.
    pub fn new(
        correlation_id: CorrelationId,
        loan_id: LoanId,
        user_id: UserId,
        book_id: BookId,
        return_date: NaiveDate,
        was_overdue: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: LOAN_RETURNED_EVENT_TYPE.to_string(),
            correlation_id,
            timestamp: Utc::now(),
            loan_id,
            user_id,
            book_id,
            return_date,
            was_overdue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_event_shape() {
        let event = LoanCreatedEvent::new(
            CorrelationId::new(),
            LoanId::new(1),
            UserId::new(2),
            BookId::new(3),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            "ACTIVE",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "LOAN_CREATED");
        assert_eq!(json["loan_id"], 1);
        assert_eq!(json["user_id"], 2);
        assert_eq!(json["book_id"], 3);
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["loan_date"], "2024-03-01");
        assert_eq!(json["due_date"], "2024-03-15");
    }

    #[test]
    fn test_returned_event_shape() {
        let event = LoanReturnedEvent::new(
            CorrelationId::new(),
            LoanId::new(1),
            UserId::new(2),
            BookId::new(3),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            true,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "LOAN_RETURNED");
        assert_eq!(json["was_overdue"], true);
        assert_eq!(json["return_date"], "2024-03-10");
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = LoanReturnedEvent::new(
            CorrelationId::new(),
            LoanId::new(1),
            UserId::new(2),
            BookId::new(3),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            false,
        );
        let b = LoanReturnedEvent::new(
            a.correlation_id,
            a.loan_id,
            a.user_id,
            a.book_id,
            a.return_date,
            false,
        );
        assert_ne!(a.event_id, b.event_id);
    }
}

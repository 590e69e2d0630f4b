//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a saga execution.
///
/// Forward path:
/// ```text
/// STARTED ──► LOAN_CREATED ──► BOOK_RESERVED ──► COMPLETED
/// ```
/// On failure the saga moves to `FAILED`, then walks backward through
/// `COMPENSATING` to `COMPENSATED`. `FAILED` is transient unless
/// compensation itself fails, in which case the saga stays `FAILED` and
/// requires manual remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    /// Saga bookkeeping created, no step has committed yet.
    #[default]
    Started,

    /// The local loan write committed.
    LoanCreated,

    /// The remote catalog call committed.
    BookReserved,

    /// All steps completed (terminal state).
    Completed,

    /// A step failed and compensation is in progress.
    Compensating,

    /// Compensation finished after a failure (terminal state).
    Compensated,

    /// A step failed; compensation has not completed.
    Failed,
}

impl SagaState {
    /// Returns true if this is a terminal state eligible for registry cleanup.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Compensated)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "STARTED",
            SagaState::LoanCreated => "LOAN_CREATED",
            SagaState::BookReserved => "BOOK_RESERVED",
            SagaState::Completed => "COMPLETED",
            SagaState::Compensating => "COMPENSATING",
            SagaState::Compensated => "COMPENSATED",
            SagaState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_started() {
        assert_eq!(SagaState::default(), SagaState::Started);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SagaState::Completed.is_terminal());
        assert!(SagaState::Compensated.is_terminal());
        assert!(!SagaState::Started.is_terminal());
        assert!(!SagaState::LoanCreated.is_terminal());
        assert!(!SagaState::BookReserved.is_terminal());
        assert!(!SagaState::Compensating.is_terminal());
        // Failed needs manual remediation; the sweeper must not drop it.
        assert!(!SagaState::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaState::Started.to_string(), "STARTED");
        assert_eq!(SagaState::LoanCreated.to_string(), "LOAN_CREATED");
        assert_eq!(SagaState::BookReserved.to_string(), "BOOK_RESERVED");
        assert_eq!(SagaState::Completed.to_string(), "COMPLETED");
        assert_eq!(SagaState::Compensating.to_string(), "COMPENSATING");
        assert_eq!(SagaState::Compensated.to_string(), "COMPENSATED");
        assert_eq!(SagaState::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&SagaState::BookReserved).unwrap();
        assert_eq!(json, "\"BOOK_RESERVED\"");
        let back: SagaState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SagaState::BookReserved);
    }
}

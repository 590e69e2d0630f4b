//! Loan status state machine.

use serde::{Deserialize, Serialize};

/// The status of a loan in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Active ──┬──► Returned
///    │                 └──► Overdue ──► Returned
///    └─────── Active | Overdue ──► Cancelled   (compensation only)
/// ```
///
/// `Pending` is transient: it exists only between the first saga step and
/// saga completion and must never be treated as a granted loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// Loan row exists but the saga has not committed yet.
    #[default]
    Pending,

    /// Loan is granted and the book copy is reserved.
    Active,

    /// Book was returned (terminal state).
    Returned,

    /// Loan is past its due date and not yet returned.
    Overdue,

    /// Loan was cancelled by saga compensation (terminal state).
    Cancelled,
}

impl LoanStatus {
    /// Returns true if the loan can be promoted to `Active`.
    pub fn can_activate(&self) -> bool {
        matches!(self, LoanStatus::Pending)
    }

    /// Returns true if the book can be returned in this status.
    pub fn can_return(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }

    /// Returns true if the due date can be extended in this status.
    pub fn can_extend(&self) -> bool {
        matches!(self, LoanStatus::Active)
    }

    /// Returns true if compensation may cancel the loan in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            LoanStatus::Pending | LoanStatus::Active | LoanStatus::Overdue
        )
    }

    /// Returns true if this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Cancelled)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Overdue => "OVERDUE",
            LoanStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(LoanStatus::Pending),
            "ACTIVE" => Ok(LoanStatus::Active),
            "RETURNED" => Ok(LoanStatus::Returned),
            "OVERDUE" => Ok(LoanStatus::Overdue),
            "CANCELLED" => Ok(LoanStatus::Cancelled),
            other => Err(format!("unknown loan status: {other}")),
        }
    }
}

//! The loan entity, owned exclusively by the loan service.

mod status;

pub use status::LoanStatus;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::{BookId, LoanId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Upper bound on a single due-date extension.
pub const MAX_EXTENSION_DAYS: u32 = 30;

/// One borrowing relationship between a user and a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Promotes a pending loan to active once the reservation step committed.
    pub fn activate(&mut self) -> Result<(), DomainError> {
        if !self.status.can_activate() {
            return Err(DomainError::InvalidTransition {
                action: "activate",
                status: self.status,
            });
        }
        self.status = LoanStatus::Active;
        Ok(())
    }

    /// Marks the loan as returned.
    ///
    /// Returns whether the return was late (return date after due date).
    pub fn mark_returned(&mut self, today: NaiveDate) -> Result<bool, DomainError> {
        if !self.status.can_return() {
            return Err(DomainError::InvalidTransition {
                action: "return",
                status: self.status,
            });
        }
        self.return_date = Some(today);
        self.status = LoanStatus::Returned;
        Ok(today > self.due_date)
    }

    /// Reverts a returned loan to its pre-return status and clears the
    /// return date. Used only by return-saga compensation.
    pub fn revert_return(&mut self, original: LoanStatus) -> Result<(), DomainError> {
        if self.status != LoanStatus::Returned {
            return Err(DomainError::InvalidTransition {
                action: "revert return of",
                status: self.status,
            });
        }
        self.return_date = None;
        self.status = original;
        Ok(())
    }

    /// Cancels the loan. Used only by creation-saga compensation.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !self.status.can_cancel() {
            return Err(DomainError::InvalidTransition {
                action: "cancel",
                status: self.status,
            });
        }
        self.status = LoanStatus::Cancelled;
        Ok(())
    }

    /// Extends the due date by the given number of days.
    ///
    /// Returns the old and new due dates.
    pub fn extend(&mut self, additional_days: u32) -> Result<(NaiveDate, NaiveDate), DomainError> {
        if !self.status.can_extend() {
            return Err(DomainError::InvalidTransition {
                action: "extend",
                status: self.status,
            });
        }
        if additional_days == 0 || additional_days > MAX_EXTENSION_DAYS {
            return Err(DomainError::InvalidOperation(format!(
                "Extension days must be between 1 and {MAX_EXTENSION_DAYS}"
            )));
        }
        let old_due = self.due_date;
        self.due_date += Duration::days(i64::from(additional_days));
        Ok((old_due, self.due_date))
    }

    /// Returns true if the loan is active and past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == LoanStatus::Active && today > self.due_date
    }

    /// Returns true if the loan is currently active.
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// Insert shape for a loan row; the store assigns the identifier.
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: UserId,
    pub book_id: BookId,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: LoanStatus,
}

impl NewLoan {
    /// Builds a pending loan starting today with a fixed loan period.
    pub fn pending(
        user_id: UserId,
        book_id: BookId,
        loan_date: NaiveDate,
        period_days: u32,
    ) -> Self {
        Self {
            user_id,
            book_id,
            loan_date,
            due_date: loan_date + Duration::days(i64::from(period_days)),
            status: LoanStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(status: LoanStatus) -> Loan {
        let loan_date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        Loan {
            id: LoanId::new(1),
            user_id: UserId::new(1),
            book_id: BookId::new(1),
            loan_date,
            due_date: loan_date + Duration::days(14),
            return_date: None,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_pending_loan_builds_with_period() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let new = NewLoan::pending(UserId::new(1), BookId::new(2), start, 14);
        assert_eq!(new.due_date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(new.status, LoanStatus::Pending);
    }

    #[test]
    fn test_activate_requires_pending() {
        let mut l = loan(LoanStatus::Pending);
        l.activate().unwrap();
        assert_eq!(l.status, LoanStatus::Active);
        assert!(l.activate().is_err());
    }

    #[test]
    fn test_mark_returned_on_time() {
        let mut l = loan(LoanStatus::Active);
        let was_late = l.mark_returned(l.due_date).unwrap();
        assert!(!was_late);
        assert_eq!(l.status, LoanStatus::Returned);
        assert_eq!(l.return_date, Some(l.due_date));
    }

    #[test]
    fn test_mark_returned_late() {
        let mut l = loan(LoanStatus::Overdue);
        let late_day = l.due_date + Duration::days(5);
        let was_late = l.mark_returned(late_day).unwrap();
        assert!(was_late);
    }

    #[test]
    fn test_mark_returned_rejects_non_active() {
        let mut l = loan(LoanStatus::Returned);
        let err = l.mark_returned(l.due_date).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn test_revert_return_restores_original_status() {
        let mut l = loan(LoanStatus::Overdue);
        l.mark_returned(l.due_date + Duration::days(2)).unwrap();
        l.revert_return(LoanStatus::Overdue).unwrap();
        assert_eq!(l.status, LoanStatus::Overdue);
        assert!(l.return_date.is_none());
    }

    #[test]
    fn test_cancel_pending_loan() {
        let mut l = loan(LoanStatus::Pending);
        l.cancel().unwrap();
        assert_eq!(l.status, LoanStatus::Cancelled);
    }

    #[test]
    fn test_cancel_rejects_returned_loan() {
        let mut l = loan(LoanStatus::Returned);
        assert!(l.cancel().is_err());
    }

    #[test]
    fn test_extend_moves_due_date() {
        let mut l = loan(LoanStatus::Active);
        let (old, new) = l.extend(7).unwrap();
        assert_eq!(new, old + Duration::days(7));
        assert_eq!(l.due_date, new);
    }

    #[test]
    fn test_extend_bounds() {
        let mut l = loan(LoanStatus::Active);
        assert!(l.extend(0).is_err());
        assert!(l.extend(MAX_EXTENSION_DAYS + 1).is_err());
        assert!(l.extend(MAX_EXTENSION_DAYS).is_ok());
    }

    #[test]
    fn test_is_overdue() {
        let l = loan(LoanStatus::Active);
        assert!(!l.is_overdue(l.due_date));
        assert!(l.is_overdue(l.due_date + Duration::days(1)));
        let returned = loan(LoanStatus::Returned);
        assert!(!returned.is_overdue(returned.due_date + Duration::days(1)));
    }
}

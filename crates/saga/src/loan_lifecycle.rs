//! Loan-lifecycle saga constants.

/// Loan period applied to every new loan.
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;

/// Upper bound on automatic retries of transient catalog failures.
pub const MAX_SAGA_RETRIES: u32 = 3;

/// Saga type identifier for loan creation.
pub const CREATION_SAGA_TYPE: &str = "LoanCreation";

/// Saga type identifier for loan return.
pub const RETURN_SAGA_TYPE: &str = "LoanReturn";

/// Step name: insert the pending loan row.
pub const STEP_CREATE_LOAN: &str = "create_loan";

/// Step name: decrement available copies in the catalog.
pub const STEP_RESERVE_BOOK: &str = "reserve_book";

/// Step name: mark the loan row returned.
pub const STEP_MARK_RETURNED: &str = "mark_returned";

/// Step name: increment available copies in the catalog.
pub const STEP_RETURN_BOOK: &str = "return_book";

/// Step name: activate/track/publish after the remote call committed.
pub const STEP_FINALIZE: &str = "finalize";

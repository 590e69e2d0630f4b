//! PostgreSQL-backed loan and tracking stores.

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookId, LoanId, UserId};
use domain::{
    Loan, LoanStatus, LoanStore, NewLoan, NewTrackingEntry, StoreError, TrackingEntry,
    TrackingStore,
};
use sqlx::{PgPool, Row, postgres::PgRow};

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn status_column(row: &PgRow) -> Result<LoanStatus, StoreError> {
    let raw: String = row.try_get("status").map_err(db_err)?;
    raw.parse().map_err(StoreError::Database)
}

fn row_to_loan(row: PgRow) -> Result<Loan, StoreError> {
    let status = status_column(&row)?;
    Ok(Loan {
        id: LoanId::new(row.try_get("id").map_err(db_err)?),
        user_id: UserId::new(row.try_get("user_id").map_err(db_err)?),
        book_id: BookId::new(row.try_get("book_id").map_err(db_err)?),
        loan_date: row.try_get("loan_date").map_err(db_err)?,
        due_date: row.try_get("due_date").map_err(db_err)?,
        return_date: row.try_get("return_date").map_err(db_err)?,
        status,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn row_to_entry(row: PgRow) -> Result<TrackingEntry, StoreError> {
    let status = status_column(&row)?;
    Ok(TrackingEntry {
        id: row.try_get("id").map_err(db_err)?,
        loan_id: LoanId::new(row.try_get("loan_id").map_err(db_err)?),
        status,
        timestamp: row.try_get("timestamp").map_err(db_err)?,
        notes: row.try_get("notes").map_err(db_err)?,
        changed_by: row.try_get("changed_by").map_err(db_err)?,
    })
}

/// PostgreSQL loan store.
#[derive(Clone)]
pub struct PostgresLoanStore {
    pool: PgPool,
}

impl PostgresLoanStore {
    /// Creates a new PostgreSQL loan store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl LoanStore for PostgresLoanStore {
    async fn insert(&self, loan: NewLoan) -> Result<Loan, StoreError> {
        let row = sqlx::query(
            "INSERT INTO loans (user_id, book_id, loan_date, due_date, return_date, status)
             VALUES ($1, $2, $3, $4, NULL, $5)
             RETURNING *",
        )
        .bind(loan.user_id.value())
        .bind(loan.book_id.value())
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(loan.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row_to_loan(row)
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>, StoreError> {
        let row = sqlx::query("SELECT * FROM loans WHERE id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(row_to_loan).transpose()
    }

    async fn update(&self, loan: &Loan) -> Result<Loan, StoreError> {
        let row = sqlx::query(
            "UPDATE loans
             SET loan_date = $2, due_date = $3, return_date = $4, status = $5,
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(loan.id.value())
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(loan.return_date)
        .bind(loan.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => row_to_loan(row),
            None => Err(StoreError::RowMissing(loan.id)),
        }
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Loan>, StoreError> {
        let rows = sqlx::query("SELECT * FROM loans WHERE user_id = $1 ORDER BY id")
            .bind(user_id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(row_to_loan).collect()
    }

    async fn find_by_user_and_status(
        &self,
        user_id: UserId,
        status: LoanStatus,
    ) -> Result<Vec<Loan>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM loans WHERE user_id = $1 AND status = $2 ORDER BY id")
                .bind(user_id.value())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        rows.into_iter().map(row_to_loan).collect()
    }

    async fn find_by_book(&self, book_id: BookId) -> Result<Vec<Loan>, StoreError> {
        let rows = sqlx::query("SELECT * FROM loans WHERE book_id = $1 ORDER BY id")
            .bind(book_id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(row_to_loan).collect()
    }

    async fn find_overdue(&self, today: NaiveDate) -> Result<Vec<Loan>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM loans WHERE status = 'ACTIVE' AND due_date < $1 ORDER BY id",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_loan).collect()
    }

    async fn has_active_loan(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM loans
                 WHERE user_id = $1 AND book_id = $2 AND status = 'ACTIVE'
             )",
        )
        .bind(user_id.value())
        .bind(book_id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(exists)
    }
}

/// PostgreSQL tracking store. Append-only: no update or delete statements
/// exist in this implementation.
#[derive(Clone)]
pub struct PostgresTrackingStore {
    pool: PgPool,
}

impl PostgresTrackingStore {
    /// Creates a new PostgreSQL tracking store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackingStore for PostgresTrackingStore {
    async fn append(&self, entry: NewTrackingEntry) -> Result<TrackingEntry, StoreError> {
        let row = sqlx::query(
            "INSERT INTO loan_tracking (loan_id, status, notes, changed_by)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(entry.loan_id.value())
        .bind(entry.status.as_str())
        .bind(&entry.notes)
        .bind(&entry.changed_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row_to_entry(row)
    }

    async fn history(&self, loan_id: LoanId) -> Result<Vec<TrackingEntry>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM loan_tracking WHERE loan_id = $1 ORDER BY id DESC")
                .bind(loan_id.value())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        rows.into_iter().map(row_to_entry).collect()
    }
}

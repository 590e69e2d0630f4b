//! Loan lifecycle and saga inspection endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use common::{BookId, LoanId, SagaId, UserId};
use domain::{Loan, LoanService, LoanStatus, LoanStore, TrackingEntry, TrackingStore};
use saga::{
    InMemoryBroker, InMemoryCatalogService, InMemorySagaRegistry, LoanCreationSaga,
    LoanReturnSaga, SagaRecord, SagaRegistry,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<L, T>
where
    L: LoanStore + Clone,
    T: TrackingStore + Clone,
{
    pub loan_service: LoanService<L, T>,
    pub creation_saga:
        LoanCreationSaga<L, T, InMemoryCatalogService, InMemoryBroker, InMemorySagaRegistry>,
    pub return_saga:
        LoanReturnSaga<L, T, InMemoryCatalogService, InMemoryBroker, InMemorySagaRegistry>,
    pub registry: InMemorySagaRegistry,
    pub catalog: InMemoryCatalogService,
    pub broker: InMemoryBroker,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateLoanRequest {
    pub user_id: i64,
    pub book_id: i64,
}

#[derive(Deserialize)]
pub struct ExtendLoanRequest {
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct UserLoansQuery {
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct LoanResponse {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub loan_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    pub status: String,
}

impl From<&Loan> for LoanResponse {
    fn from(loan: &Loan) -> Self {
        Self {
            id: loan.id.value(),
            user_id: loan.user_id.value(),
            book_id: loan.book_id.value(),
            loan_date: loan.loan_date.to_string(),
            due_date: loan.due_date.to_string(),
            return_date: loan.return_date.map(|d| d.to_string()),
            status: loan.status.as_str().to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct CreateLoanResponse {
    pub loan: LoanResponse,
    pub saga_id: String,
    pub correlation_id: String,
    pub saga_state: String,
}

#[derive(Serialize)]
pub struct ReturnLoanResponse {
    pub loan: LoanResponse,
    pub saga_id: String,
    pub correlation_id: String,
    pub saga_state: String,
    pub was_overdue: bool,
}

#[derive(Serialize)]
pub struct TrackingEntryResponse {
    pub id: i64,
    pub loan_id: i64,
    pub status: String,
    pub timestamp: String,
    pub notes: String,
    pub changed_by: String,
}

impl From<TrackingEntry> for TrackingEntryResponse {
    fn from(entry: TrackingEntry) -> Self {
        Self {
            id: entry.id,
            loan_id: entry.loan_id.value(),
            status: entry.status.as_str().to_string(),
            timestamp: entry.timestamp.to_rfc3339(),
            notes: entry.notes,
            changed_by: entry.changed_by,
        }
    }
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: String,
    pub saga_type: String,
    pub state: String,
    pub user_id: i64,
    pub book_id: i64,
    pub loan_id: Option<i64>,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
}

impl From<SagaRecord> for SagaStatusResponse {
    fn from(record: SagaRecord) -> Self {
        Self {
            saga_id: record.saga_id().to_string(),
            saga_type: record.saga_type().to_string(),
            state: record.state().as_str().to_string(),
            user_id: record.user_id().value(),
            book_id: record.book_id().value(),
            loan_id: record.loan_id().map(|id| id.value()),
            failure_reason: record.failure_reason().map(String::from),
            retry_count: record.retry_count(),
        }
    }
}

// -- Handlers --

/// POST /loans — run the loan-creation saga.
#[tracing::instrument(skip(state, req))]
pub async fn create<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
    Json(req): Json<CreateLoanRequest>,
) -> Result<(axum::http::StatusCode, Json<CreateLoanResponse>), ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let (loan, data) = state
        .creation_saga
        .execute(UserId::new(req.user_id), BookId::new(req.book_id))
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(CreateLoanResponse {
            loan: LoanResponse::from(&loan),
            saga_id: data.saga_id.to_string(),
            correlation_id: data.correlation_id.to_string(),
            saga_state: data.state.as_str().to_string(),
        }),
    ))
}

/// POST /loans/:id/return — run the loan-return saga.
#[tracing::instrument(skip(state))]
pub async fn return_loan<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
    Path(id): Path<i64>,
) -> Result<Json<ReturnLoanResponse>, ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let (loan, data) = state.return_saga.execute(LoanId::new(id)).await?;

    Ok(Json(ReturnLoanResponse {
        loan: LoanResponse::from(&loan),
        saga_id: data.saga_id.to_string(),
        correlation_id: data.correlation_id.to_string(),
        saga_state: data.state.as_str().to_string(),
        was_overdue: data.was_overdue,
    }))
}

/// POST /loans/:id/extend — extend an active loan's due date.
#[tracing::instrument(skip(state, req))]
pub async fn extend<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
    Path(id): Path<i64>,
    Json(req): Json<ExtendLoanRequest>,
) -> Result<Json<LoanResponse>, ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let loan = state
        .loan_service
        .extend_loan(LoanId::new(id), req.days)
        .await?;
    Ok(Json(LoanResponse::from(&loan)))
}

/// GET /loans/:id — load a loan by ID.
#[tracing::instrument(skip(state))]
pub async fn get<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
    Path(id): Path<i64>,
) -> Result<Json<LoanResponse>, ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let loan = state.loan_service.get_loan(LoanId::new(id)).await?;
    Ok(Json(LoanResponse::from(&loan)))
}

/// GET /loans/:id/history — audit trail for a loan, newest first.
#[tracing::instrument(skip(state))]
pub async fn history<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TrackingEntryResponse>>, ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    // 404 for unknown loans rather than an empty history.
    state.loan_service.get_loan(LoanId::new(id)).await?;
    let entries = state.loan_service.history(LoanId::new(id)).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// GET /loans/overdue — active loans past their due date as of today.
#[tracing::instrument(skip(state))]
pub async fn overdue<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
) -> Result<Json<Vec<LoanResponse>>, ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let loans = state
        .loan_service
        .overdue_loans(Utc::now().date_naive())
        .await?;
    Ok(Json(loans.iter().map(LoanResponse::from).collect()))
}

/// GET /users/:id/loans — a user's loans, optionally filtered by status.
#[tracing::instrument(skip(state))]
pub async fn user_loans<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
    Path(id): Path<i64>,
    Query(query): Query<UserLoansQuery>,
) -> Result<Json<Vec<LoanResponse>>, ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let user_id = UserId::new(id);
    let loans = match query.status {
        Some(raw) => {
            let status = LoanStatus::from_str(&raw)
                .map_err(|_| ApiError::BadRequest(format!("Invalid loan status: {raw}")))?;
            if status == LoanStatus::Active {
                state.loan_service.active_loans_for_user(user_id).await?
            } else {
                state
                    .loan_service
                    .loans_for_user(user_id)
                    .await?
                    .into_iter()
                    .filter(|l| l.status == status)
                    .collect()
            }
        }
        None => state.loan_service.loans_for_user(user_id).await?,
    };
    Ok(Json(loans.iter().map(LoanResponse::from).collect()))
}

/// GET /sagas/:id — saga bookkeeping snapshot from the registry.
#[tracing::instrument(skip(state))]
pub async fn saga_status<L, T>(
    State(state): State<Arc<AppState<L, T>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid saga ID format: {e}")))?;
    let record = state
        .registry
        .get(&SagaId::from_uuid(uuid))
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))?;
    Ok(Json(SagaStatusResponse::from(record)))
}

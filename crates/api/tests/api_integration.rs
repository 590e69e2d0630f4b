//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::BookId;
use domain::{InMemoryLoanStore, InMemoryTrackingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

use api::routes::loans::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (
    axum::Router,
    Arc<AppState<InMemoryLoanStore, InMemoryTrackingStore>>,
) {
    let state = api::create_default_state();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_loan(app: &axum::Router, user_id: i64, book_id: i64) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/loans",
            serde_json::json!({ "user_id": user_id, "book_id": book_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_loan() {
    let (app, _) = setup();

    let json = create_loan(&app, 1, 1).await;

    assert_eq!(json["loan"]["status"], "ACTIVE");
    assert_eq!(json["loan"]["user_id"], 1);
    assert_eq!(json["loan"]["book_id"], 1);
    assert_eq!(json["saga_state"], "COMPLETED");
    assert!(json["saga_id"].as_str().is_some());
}

#[tokio::test]
async fn test_create_loan_unknown_book_is_404() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/loans",
            serde_json::json!({ "user_id": 1, "book_id": 404 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_create_loan_exhausted_copies_is_conflict() {
    let (app, state) = setup();
    // Book 3 is seeded with a single copy.
    create_loan(&app, 1, 3).await;
    assert_eq!(state.catalog.available_copies(BookId::new(3)), Some(0));

    let response = app
        .oneshot(post_json(
            "/loans",
            serde_json::json!({ "user_id": 2, "book_id": 3 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_duplicate_active_loan_is_bad_request() {
    let (app, _) = setup();
    create_loan(&app, 1, 1).await;

    let response = app
        .oneshot(post_json(
            "/loans",
            serde_json::json!({ "user_id": 1, "book_id": 1 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_loan_and_history() {
    let (app, _) = setup();
    let created = create_loan(&app, 1, 1).await;
    let loan_id = created["loan"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/loans/{loan_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ACTIVE");

    let response = app
        .oneshot(get(&format!("/loans/{loan_id}/history")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["notes"], "Loan created for user 1, book 1");
    assert_eq!(entries[0]["changed_by"], "SYSTEM");
}

#[tokio::test]
async fn test_get_missing_loan_is_404() {
    let (app, _) = setup();
    let response = app.oneshot(get("/loans/999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_return_loan() {
    let (app, state) = setup();
    let created = create_loan(&app, 1, 1).await;
    let loan_id = created["loan"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/loans/{loan_id}/return"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["loan"]["status"], "RETURNED");
    assert_eq!(json["was_overdue"], false);
    assert!(json["loan"]["return_date"].as_str().is_some());
    // Copy went back to the catalog.
    assert_eq!(state.catalog.available_copies(BookId::new(1)), Some(3));

    // Returning again is a 400: the loan is no longer active.
    let response = app
        .oneshot(post_json(
            &format!("/loans/{loan_id}/return"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_extend_loan() {
    let (app, _) = setup();
    let created = create_loan(&app, 1, 1).await;
    let loan_id = created["loan"]["id"].as_i64().unwrap();
    let old_due = created["loan"]["due_date"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/loans/{loan_id}/extend"),
            serde_json::json!({ "days": 7 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_ne!(json["due_date"].as_str().unwrap(), old_due);

    // Beyond the extension bound is a 400.
    let response = app
        .oneshot(post_json(
            &format!("/loans/{loan_id}/extend"),
            serde_json::json!({ "days": 31 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_loans_with_status_filter() {
    let (app, _) = setup();
    let first = create_loan(&app, 1, 1).await;
    create_loan(&app, 1, 2).await;
    let loan_id = first["loan"]["id"].as_i64().unwrap();
    app.clone()
        .oneshot(post_json(
            &format!("/loans/{loan_id}/return"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/users/1/loans"))
        .await
        .unwrap();
    let all = body_json(response).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get("/users/1/loans?status=ACTIVE"))
        .await
        .unwrap();
    let active = body_json(response).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["book_id"], 2);

    let response = app.oneshot(get("/users/1/loans?status=bogus")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overdue_endpoint_empty_for_fresh_loans() {
    let (app, _) = setup();
    create_loan(&app, 1, 1).await;

    let response = app.oneshot(get("/loans/overdue")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_saga_status_endpoint() {
    let (app, _) = setup();
    let created = create_loan(&app, 1, 1).await;
    let saga_id = created["saga_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/sagas/{saga_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["saga_type"], "LoanCreation");
    assert_eq!(json["state"], "COMPLETED");
    assert_eq!(json["loan_id"], created["loan"]["id"]);
    assert!(json["failure_reason"].is_null());
}

#[tokio::test]
async fn test_saga_status_bad_id_and_missing() {
    let (app, _) = setup();

    let response = app.clone().oneshot(get("/sagas/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get(&format!("/sagas/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_saga_visible_in_registry() {
    let (app, state) = setup();
    state.catalog.set_fail_on_borrow(true);

    let response = app
        .clone()
        .oneshot(post_json(
            "/loans",
            serde_json::json!({ "user_id": 1, "book_id": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let records = state.registry.records();
    assert_eq!(records.len(), 1);
    let saga_id = records[0].saga_id();

    let response = app
        .oneshot(get(&format!("/sagas/{saga_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["state"], "COMPENSATED");
    assert!(json["failure_reason"].as_str().is_some());
}

#[tokio::test]
async fn test_events_published_on_lifecycle() {
    let (app, state) = setup();
    let created = create_loan(&app, 1, 1).await;
    let loan_id = created["loan"]["id"].as_i64().unwrap();
    app.clone()
        .oneshot(post_json(
            &format!("/loans/{loan_id}/return"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let messages = state.broker.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].routing_key, "loan.created");
    assert_eq!(messages[1].routing_key, "loan.returned");
    assert!(messages.iter().all(|m| m.exchange == "library.events"));
}

//! HTTP API server with observability for the loan lifecycle service.
//!
//! Exposes REST endpoints for the loan sagas, loan reads and saga
//! inspection, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{
    InMemoryLoanStore, InMemoryTrackingStore, LoanService, LoanStore, LoanTrackingService,
    TrackingStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    InMemoryBroker, InMemoryCatalogService, InMemorySagaRegistry, LoanCreationSaga,
    LoanEventPublisher, LoanReturnSaga,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::loans::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, T>(state: Arc<AppState<L, T>>, metrics_handle: PrometheusHandle) -> Router
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/loans", post(routes::loans::create::<L, T>))
        .route("/loans/overdue", get(routes::loans::overdue::<L, T>))
        .route("/loans/{id}", get(routes::loans::get::<L, T>))
        .route("/loans/{id}/return", post(routes::loans::return_loan::<L, T>))
        .route("/loans/{id}/extend", post(routes::loans::extend::<L, T>))
        .route("/loans/{id}/history", get(routes::loans::history::<L, T>))
        .route("/users/{id}/loans", get(routes::loans::user_loans::<L, T>))
        .route("/sagas/{id}", get(routes::loans::saga_status::<L, T>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires application state over the given stores.
///
/// The catalog client, broker and saga registry are the in-memory
/// implementations; a deployment fronting a real catalog service and
/// broker swaps those in here.
pub fn create_state<L, T>(loans: L, tracking: T) -> Arc<AppState<L, T>>
where
    L: LoanStore + Clone + 'static,
    T: TrackingStore + Clone + 'static,
{
    let catalog = InMemoryCatalogService::new();
    let broker = InMemoryBroker::new();
    let registry = InMemorySagaRegistry::new();

    let creation_saga = LoanCreationSaga::new(
        loans.clone(),
        LoanTrackingService::new(tracking.clone()),
        catalog.clone(),
        LoanEventPublisher::new(broker.clone()),
        registry.clone(),
    );
    let return_saga = LoanReturnSaga::new(
        loans.clone(),
        LoanTrackingService::new(tracking.clone()),
        catalog.clone(),
        LoanEventPublisher::new(broker.clone()),
        registry.clone(),
    );

    Arc::new(AppState {
        loan_service: LoanService::new(loans, tracking),
        creation_saga,
        return_saga,
        registry,
        catalog,
        broker,
    })
}

/// Creates application state over the in-memory stores, with a small
/// demo catalog so the server is usable out of the box.
pub fn create_default_state() -> Arc<AppState<InMemoryLoanStore, InMemoryTrackingStore>> {
    let state = create_state(InMemoryLoanStore::new(), InMemoryTrackingStore::new());
    seed_demo_catalog(&state.catalog);
    state
}

/// Seeds a handful of books into the in-memory catalog.
pub fn seed_demo_catalog(catalog: &InMemoryCatalogService) {
    catalog.add_book(common::BookId::new(1), "Dune", "978-0441172719", 3);
    catalog.add_book(
        common::BookId::new(2),
        "The Left Hand of Darkness",
        "978-0441478125",
        2,
    );
    catalog.add_book(common::BookId::new(3), "Neuromancer", "978-0441569595", 1);
    tracing::info!("seeded demo catalog with 3 books");
}

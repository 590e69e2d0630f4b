//! API server entry point.

use std::time::Duration;

use chrono::Utc;
use loan_store::{PostgresLoanStore, PostgresTrackingStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve(app: axum::Router, addr: &str) {
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let sweep_interval = Duration::from_secs(config.saga_sweep_interval_secs);
    let addr = config.addr();

    // 3. Wire state over Postgres when configured, in-memory otherwise
    if let Some(url) = config.database_url.as_deref() {
        let pool = sqlx::PgPool::connect(url)
            .await
            .expect("failed to connect to database");
        let loans = PostgresLoanStore::new(pool.clone());
        loans.run_migrations().await.expect("migrations failed");
        let tracking = PostgresTrackingStore::new(pool);

        let state = api::create_state(loans, tracking);
        api::seed_demo_catalog(&state.catalog);
        saga::spawn_terminal_sweeper(state.registry.clone(), sweep_interval);
        spawn_overdue_sweeper(state.clone());

        serve(api::create_app(state, metrics_handle), &addr).await;
    } else {
        tracing::info!("DATABASE_URL not set, using in-memory stores");
        let state = api::create_default_state();
        saga::spawn_terminal_sweeper(state.registry.clone(), sweep_interval);
        spawn_overdue_sweeper(state.clone());

        serve(api::create_app(state, metrics_handle), &addr).await;
    }
}

/// Spawns the hourly sweep that flips active loans past their due date
/// to overdue.
fn spawn_overdue_sweeper<L, T>(state: std::sync::Arc<api::routes::loans::AppState<L, T>>)
where
    L: domain::LoanStore + Clone + 'static,
    T: domain::TrackingStore + Clone + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.tick().await;
        loop {
            interval.tick().await;
            match state
                .loan_service
                .mark_overdue_loans(Utc::now().date_naive())
                .await
            {
                Ok(count) if count > 0 => tracing::info!(count, "overdue sweep flipped loans"),
                Ok(_) => {}
                Err(err) => tracing::error!(error = %err, "overdue sweep failed"),
            }
        }
    });
}

//! HTTP gateway with observability for the purchase coordinator.
//!
//! Provides REST endpoints for browsing accounts and items and for placing
//! purchases, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use ledger::{
    FundsLedger, InventoryLedger, ResourceLedger,
    seed::{default_accounts, default_items},
};
use ledger_store::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: LedgerStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<S>))
        .route("/accounts", get(routes::accounts::list::<S>))
        .route("/items", get(routes::items::list::<S>))
        .route("/items/{id}/price", get(routes::items::price::<S>))
        .route("/purchases", post(routes::purchases::create::<S>))
        .route("/order", post(routes::purchases::order_form::<S>))
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

/// Creates the application state over one store per ledger.
pub fn create_default_state<S: LedgerStore + Clone + 'static>(
    inventory_store: S,
    funds_store: S,
) -> Arc<AppState<S>> {
    let inventory: InventoryLedger<S> = ResourceLedger::new(inventory_store);
    let funds: FundsLedger<S> = ResourceLedger::new(funds_store);
    Arc::new(AppState::new(inventory, funds))
}

/// Prepares ledgers for serving: seeds empty ledgers and, when
/// `clear_reservations` is set, drops reservations left behind by a previous
/// process. Stores shared with other live instances must not be cleared.
pub async fn bootstrap<S: LedgerStore + Clone + 'static>(
    state: &AppState<S>,
    seed: bool,
    clear_reservations: bool,
) -> ledger::Result<()> {
    if seed {
        state.inventory().seed_if_empty(default_items()).await?;
        state.funds().seed_if_empty(default_accounts()).await?;
    }
    if clear_reservations {
        state.inventory().clear_reservations().await?;
        state.funds().clear_reservations().await?;
    }
    Ok(())
}

/// Rolls back expired reservations on both ledgers. Returns how many were removed.
pub async fn sweep_once<S: LedgerStore + Clone + 'static>(
    state: &AppState<S>,
    ttl: Duration,
) -> ledger::Result<usize> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let swept = state.inventory().sweep_expired(ttl).await? + state.funds().sweep_expired(ttl).await?;
    Ok(swept)
}

/// Spawns the periodic reservation sweep.
pub fn spawn_sweeper<S: LedgerStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    ttl: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match sweep_once(&state, ttl).await {
                Ok(0) => {}
                Ok(swept) => tracing::info!(swept, "expired reservations rolled back"),
                Err(e) => tracing::warn!(error = %e, "reservation sweep failed"),
            }
        }
    })
}

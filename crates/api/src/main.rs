//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use ledger_store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

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

async fn serve<S: LedgerStore + Clone + 'static>(
    config: &Config,
    inventory_store: S,
    funds_store: S,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let state = api::create_default_state(inventory_store, funds_store);
    api::bootstrap(&state, config.seed_data, config.clear_reservations_on_start).await?;

    let sweeper = api::spawn_sweeper(
        Arc::clone(&state),
        config.reservation_ttl,
        config.sweep_interval,
    );

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick ledger stores and serve
    match &config.database_url {
        Some(url) => {
            tracing::info!("using PostgreSQL ledger stores");
            let pool = PostgresLedgerStore::connect(url, config.database_max_connections).await?;
            let inventory = PostgresLedgerStore::new(pool.clone(), "inventory");
            inventory.run_migrations().await?;
            let funds = PostgresLedgerStore::new(pool, "funds");
            serve(&config, inventory, funds, metrics_handle).await?;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory ledger stores");
            serve(
                &config,
                InMemoryLedgerStore::new("inventory"),
                InMemoryLedgerStore::new("funds"),
                metrics_handle,
            )
            .await?;
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}

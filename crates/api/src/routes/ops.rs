//! Health and metrics endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use ledger::Resource;
use ledger_store::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledgers: Vec<LedgerHealth>,
}

#[derive(Serialize)]
pub struct LedgerHealth {
    pub name: &'static str,
    pub status: &'static str,
    pub pending_reservations: Option<usize>,
}

fn check_ledger(name: &'static str, pending: ledger::Result<usize>) -> LedgerHealth {
    match pending {
        Ok(count) => LedgerHealth {
            name,
            status: "ok",
            pending_reservations: Some(count),
        },
        Err(e) => {
            tracing::warn!(ledger = name, error = %e, "ledger health check failed");
            LedgerHealth {
                name,
                status: "unavailable",
                pending_reservations: None,
            }
        }
    }
}

/// GET /health: reports whether both ledgers can serve reads.
pub async fn health<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let ledgers = vec![
        check_ledger(
            ledger::Inventory::LEDGER,
            state.inventory().reservation_count().await,
        ),
        check_ledger(ledger::Funds::LEDGER, state.funds().reservation_count().await),
    ];

    let healthy = ledgers.iter().all(|l| l.pending_reservations.is_some());
    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            ledgers,
        }),
    )
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

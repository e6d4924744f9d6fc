//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coordinator::CoordinatorError;
use ledger::LedgerError;

use crate::gateway::GatewayError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Purchase failed at the gateway or in the coordinator.
    Gateway(GatewayError),
    /// Ledger read failed.
    Ledger(LedgerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::Gateway(err) => gateway_error_to_response(err),
            ApiError::Ledger(err) => ledger_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn gateway_error_to_response(err: GatewayError) -> (StatusCode, serde_json::Value) {
    let message = err.caller_message();
    let status = match &err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::Coordinator(coordinator_err) => match coordinator_err {
            CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::Resolution { .. }
            | CoordinatorError::Lookup(LedgerError::NotFound { .. }) => StatusCode::NOT_FOUND,
            CoordinatorError::Rejected { .. } | CoordinatorError::CommitRejected { .. } => {
                StatusCode::CONFLICT
            }
            CoordinatorError::Lookup(_)
            | CoordinatorError::Protocol { .. }
            | CoordinatorError::PartialCommit { .. }
            | CoordinatorError::InvalidTransition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
    };

    let mut body = serde_json::json!({ "error": message });
    if let GatewayError::Coordinator(coordinator_err) = &err {
        if let Some(transaction_id) = coordinator_err.transaction_id() {
            body["transaction_id"] = serde_json::json!(transaction_id);
        }
        if coordinator_err.is_partial_commit() {
            body["partial_commit"] = serde_json::json!(true);
        }
    }

    if status.is_server_error() {
        tracing::error!(error = %err, "purchase failed");
    }

    (status, body)
}

fn ledger_error_to_response(err: LedgerError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => {
            tracing::error!(error = %err, "ledger read failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, serde_json::json!({ "error": err.to_string() }))
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

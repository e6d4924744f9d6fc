//! Purchase endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Form, Json};
use coordinator::TransactionReceipt;
use ledger_store::LedgerStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::gateway::PurchaseRequest;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub transaction_id: String,
    pub item_id: String,
    pub account_id: String,
    pub quantity: u32,
    pub amount_cents: i64,
    pub amount: String,
    pub phase: String,
}

impl From<TransactionReceipt> for PurchaseResponse {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_id: receipt.transaction_id.to_string(),
            item_id: receipt.item_id.to_string(),
            account_id: receipt.account_id.to_string(),
            quantity: receipt.quantity,
            amount_cents: receipt.amount.cents(),
            amount: receipt.amount.to_string(),
            phase: receipt.phase.to_string(),
        }
    }
}

/// POST /purchases: purchase an item from a JSON request.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    purchase(&state, req).await
}

/// POST /order: purchase an item from an HTML form submission.
#[tracing::instrument(skip(state, req))]
pub async fn order_form<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Form(req): Form<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    purchase(&state, req).await
}

async fn purchase<S: LedgerStore + Clone + 'static>(
    state: &AppState<S>,
    req: PurchaseRequest,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    let receipt = state.gateway.purchase(req).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

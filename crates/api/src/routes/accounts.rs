//! Account listing endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use ledger::Account;
use ledger_store::LedgerStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub display_name: String,
    pub balance_cents: i64,
    pub balance: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            display_name: account.display_name,
            balance_cents: account.balance.cents(),
            balance: account.balance.to_string(),
        }
    }
}

/// GET /accounts: list committed account balances.
#[tracing::instrument(skip(state))]
pub async fn list<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let accounts = state.funds().list_available().await?;
    Ok(Json(
        accounts.into_values().map(AccountResponse::from).collect(),
    ))
}

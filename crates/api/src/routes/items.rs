//! Item catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::EntityKey;
use ledger::{Item, LedgerError};
use ledger_store::LedgerStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub title: String,
    pub quantity_on_hand: u32,
    pub unit_price_cents: i64,
    pub unit_price: String,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title,
            quantity_on_hand: item.quantity_on_hand,
            unit_price_cents: item.unit_price.cents(),
            unit_price: item.unit_price.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct PriceResponse {
    pub item_id: String,
    pub unit_price_cents: i64,
    pub unit_price: String,
}

/// GET /items: list items currently in stock.
#[tracing::instrument(skip(state))]
pub async fn list<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let items = state.inventory().list_available().await?;
    Ok(Json(items.into_values().map(ItemResponse::from).collect()))
}

/// GET /items/{id}/price: look up an item's unit price.
#[tracing::instrument(skip(state))]
pub async fn price<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PriceResponse>, ApiError> {
    let key = EntityKey::new(id);
    let unit_price = state
        .inventory()
        .get_price(&key)
        .await
        .map_err(|e| match e {
            LedgerError::NotFound { key, .. } => {
                ApiError::NotFound(format!("Book with {key} doesn't exist"))
            }
            other => ApiError::Ledger(other),
        })?;

    Ok(Json(PriceResponse {
        item_id: key.to_string(),
        unit_price_cents: unit_price.cents(),
        unit_price: unit_price.to_string(),
    }))
}

//! Entities owned by the two ledgers.

use common::{EntityKey, Money};
use serde::{Deserialize, Serialize};

/// A buyer account, owned exclusively by the funds ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: EntityKey,
    pub display_name: String,
    pub balance: Money,
}

impl Account {
    /// Creates a new account.
    pub fn new(id: impl Into<EntityKey>, display_name: impl Into<String>, balance: Money) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            balance,
        }
    }
}

/// A stocked item, owned exclusively by the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityKey,
    pub title: String,
    pub unit_price: Money,
    pub quantity_on_hand: u32,
}

impl Item {
    /// Creates a new item.
    pub fn new(
        id: impl Into<EntityKey>,
        title: impl Into<String>,
        unit_price: Money,
        quantity_on_hand: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            unit_price,
            quantity_on_hand,
        }
    }

    /// Returns true if at least one unit is on hand.
    pub fn in_stock(&self) -> bool {
        self.quantity_on_hand > 0
    }
}

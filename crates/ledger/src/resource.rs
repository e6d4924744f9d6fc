//! Resource classes a ledger can own.
//!
//! A [`Resource`] fixes the entity type, the reservation delta type, and the
//! admission rule used by `Prepare` and re-checked by `Commit`.

use std::fmt::Debug;

use common::{EntityKey, Money};
use serde::{Serialize, de::DeserializeOwned};

use crate::entity::{Account, Item};

/// A class of entities managed by one ledger.
pub trait Resource: Send + Sync + 'static {
    /// The entity owned by the ledger.
    type Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// The amount a reservation subtracts from an entity on commit.
    type Delta: Copy + Debug + PartialOrd + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Ledger namespace, used for store partitioning, logs and metrics.
    const LEDGER: &'static str;

    /// Returns the entity's key.
    fn key(entity: &Self::Entity) -> &EntityKey;

    /// Returns the human-facing name used to resolve descriptors.
    fn label(entity: &Self::Entity) -> &str;

    /// Returns the committed amount currently available.
    fn available(entity: &Self::Entity) -> Self::Delta;

    /// Subtracts a delta from the entity's committed field.
    ///
    /// Callers must have checked [`Resource::admits`] against the same value.
    fn withdraw(entity: &mut Self::Entity, delta: Self::Delta);

    /// Returns true if the entity can cover the delta.
    fn admits(entity: &Self::Entity, delta: Self::Delta) -> bool {
        delta <= Self::available(entity)
    }

    /// Returns true if the entity belongs in the human-facing catalog.
    fn is_listed(_entity: &Self::Entity) -> bool {
        true
    }
}

/// Account balances.
#[derive(Debug, Clone, Copy)]
pub struct Funds;

impl Resource for Funds {
    type Entity = Account;
    type Delta = Money;

    const LEDGER: &'static str = "funds";

    fn key(entity: &Account) -> &EntityKey {
        &entity.id
    }

    fn label(entity: &Account) -> &str {
        &entity.display_name
    }

    fn available(entity: &Account) -> Money {
        entity.balance
    }

    fn withdraw(entity: &mut Account, delta: Money) {
        entity.balance = entity.balance - delta;
    }

    fn admits(entity: &Account, delta: Money) -> bool {
        !delta.is_negative() && delta <= entity.balance
    }
}

/// Item stock levels.
#[derive(Debug, Clone, Copy)]
pub struct Inventory;

impl Resource for Inventory {
    type Entity = Item;
    type Delta = u32;

    const LEDGER: &'static str = "inventory";

    fn key(entity: &Item) -> &EntityKey {
        &entity.id
    }

    fn label(entity: &Item) -> &str {
        &entity.title
    }

    fn available(entity: &Item) -> u32 {
        entity.quantity_on_hand
    }

    fn withdraw(entity: &mut Item, delta: u32) {
        entity.quantity_on_hand -= delta;
    }

    fn is_listed(entity: &Item) -> bool {
        entity.in_stock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funds_admission() {
        let account = Account::new("client1", "Pera", Money::from_dollars(100));
        assert!(Funds::admits(&account, Money::from_dollars(100)));
        assert!(!Funds::admits(&account, Money::from_cents(10_001)));
        assert!(!Funds::admits(&account, Money::from_cents(-1)));
    }

    #[test]
    fn inventory_admission() {
        let item = Item::new("book1", "Book 1", Money::from_dollars(100), 5);
        assert!(Inventory::admits(&item, 5));
        assert!(!Inventory::admits(&item, 6));
    }

    #[test]
    fn withdraw_subtracts_committed_field() {
        let mut account = Account::new("client1", "Pera", Money::from_dollars(20_000));
        Funds::withdraw(&mut account, Money::from_dollars(300));
        assert_eq!(account.balance, Money::from_dollars(19_700));

        let mut item = Item::new("book1", "Book 1", Money::from_dollars(100), 5);
        Inventory::withdraw(&mut item, 3);
        assert_eq!(item.quantity_on_hand, 2);
    }

    #[test]
    fn out_of_stock_items_are_unlisted() {
        let item = Item::new("book3", "Book 3", Money::from_dollars(200), 0);
        assert!(!Inventory::is_listed(&item));
        let account = Account::new("client2", "Ana", Money::zero());
        assert!(Funds::is_listed(&account));
    }
}

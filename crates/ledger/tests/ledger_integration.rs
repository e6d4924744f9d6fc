//! Integration tests for the resource ledgers.
//!
//! These tests drive funds and inventory ledgers through full participant
//! lifecycles over the in-memory store, including concurrent commits and
//! store faults.

use chrono::Duration;
use common::{EntityKey, Money, TransactionId};
use ledger::{
    FundsLedger, InventoryLedger, LedgerError, ResourceLedger,
    seed::{default_accounts, default_items},
};
use ledger_store::{InMemoryLedgerStore, LedgerStoreExt};

/// Helper to create seeded ledgers sharing nothing but the seed data
async fn create_ledgers() -> (
    FundsLedger<InMemoryLedgerStore>,
    InventoryLedger<InMemoryLedgerStore>,
) {
    let funds = ResourceLedger::new(InMemoryLedgerStore::new("funds"));
    let inventory = ResourceLedger::new(InMemoryLedgerStore::new("inventory"));
    funds.seed_if_empty(default_accounts()).await.unwrap();
    inventory.seed_if_empty(default_items()).await.unwrap();
    (funds, inventory)
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn purchase_reduces_both_ledgers() {
        let (funds, inventory) = create_ledgers().await;
        let tx = TransactionId::new();
        let book = EntityKey::from("book1");
        let buyer = EntityKey::from("client1");

        let price = inventory.get_price(&book).await.unwrap();
        let amount = price.checked_multiply(3).unwrap();

        inventory.enlist(tx, book.clone(), 3).await.unwrap();
        funds.enlist(tx, buyer.clone(), amount).await.unwrap();
        assert!(inventory.prepare(tx).await.unwrap());
        assert!(funds.prepare(tx).await.unwrap());
        inventory.commit(tx).await.unwrap();
        funds.commit(tx).await.unwrap();

        assert_eq!(inventory.get(&book).await.unwrap().quantity_on_hand, 2);
        assert_eq!(
            funds.get(&buyer).await.unwrap().balance,
            Money::from_dollars(19_700)
        );
        assert_eq!(inventory.reservation_count().await.unwrap(), 0);
        assert_eq!(funds.reservation_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insufficient_balance_fails_prepare() {
        let (funds, _) = create_ledgers().await;
        let tx = TransactionId::new();

        funds
            .enlist(tx, EntityKey::from("client2"), Money::from_dollars(1_001))
            .await
            .unwrap();

        assert!(!funds.prepare(tx).await.unwrap());
        funds.rollback(tx).await.unwrap();
        assert_eq!(
            funds.get(&EntityKey::from("client2")).await.unwrap().balance,
            Money::from_dollars(1_000)
        );
    }

    #[tokio::test]
    async fn out_of_stock_item_fails_prepare() {
        let (_, inventory) = create_ledgers().await;
        let tx = TransactionId::new();

        inventory
            .enlist(tx, EntityKey::from("book3"), 1)
            .await
            .unwrap();

        assert!(!inventory.prepare(tx).await.unwrap());
    }

    #[tokio::test]
    async fn exact_balance_is_admitted() {
        let (funds, _) = create_ledgers().await;
        let tx = TransactionId::new();
        let buyer = EntityKey::from("client2");

        funds
            .enlist(tx, buyer.clone(), Money::from_dollars(1_000))
            .await
            .unwrap();
        assert!(funds.prepare(tx).await.unwrap());
        funds.commit(tx).await.unwrap();

        assert_eq!(funds.get(&buyer).await.unwrap().balance, Money::zero());
    }

    #[tokio::test]
    async fn commit_without_reservation_changes_nothing() {
        let (funds, _) = create_ledgers().await;
        let before = funds.list().await.unwrap();

        funds.commit(TransactionId::new()).await.unwrap();

        assert_eq!(funds.list().await.unwrap(), before);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn contended_commits_never_oversell() {
        let (_, inventory) = create_ledgers().await;
        let book = EntityKey::from("book2");

        // Both transactions prepare against the single unit before either commits.
        let txs: Vec<_> = (0..2).map(|_| TransactionId::new()).collect();
        for tx in &txs {
            inventory.enlist(*tx, book.clone(), 1).await.unwrap();
            assert!(inventory.prepare(*tx).await.unwrap());
        }

        let handles: Vec<_> = txs
            .iter()
            .map(|tx| {
                let inventory = inventory.clone();
                let tx = *tx;
                tokio::spawn(async move { inventory.commit(tx).await })
            })
            .collect();

        let mut committed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(true) => committed += 1,
                Ok(false) => panic!("reservation vanished before commit"),
                Err(LedgerError::CommitRejected { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(rejected, 1);
        assert_eq!(inventory.get(&book).await.unwrap().quantity_on_hand, 0);
    }

    #[tokio::test]
    async fn commits_against_one_account_all_apply() {
        let (funds, _) = create_ledgers().await;
        // Every losing compare-and-set round still lets one writer through.
        let funds = funds.with_max_commit_attempts(10);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let funds = funds.clone();
                tokio::spawn(async move {
                    let tx = TransactionId::new();
                    funds
                        .enlist(tx, EntityKey::from("client1"), Money::from_dollars(100))
                        .await?;
                    funds.commit(tx).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            funds.get(&EntityKey::from("client1")).await.unwrap().balance,
            Money::from_dollars(19_000)
        );
    }
}

mod faults {
    use super::*;

    #[tokio::test]
    async fn unavailable_store_surfaces_as_store_fault() {
        let store = InMemoryLedgerStore::new("funds");
        let funds: FundsLedger<_> = ResourceLedger::new(store.clone());
        funds.seed_if_empty(default_accounts()).await.unwrap();

        store.set_unavailable(true).await;
        let result = funds
            .enlist(
                TransactionId::new(),
                EntityKey::from("client1"),
                Money::from_dollars(1),
            )
            .await;

        assert!(result.unwrap_err().is_store_fault());
    }

    #[tokio::test]
    async fn failed_commit_keeps_reservation() {
        let store = InMemoryLedgerStore::new("funds");
        let funds: FundsLedger<_> = ResourceLedger::new(store.clone());
        funds.seed_if_empty(default_accounts()).await.unwrap();
        let tx = TransactionId::new();
        funds
            .enlist(tx, EntityKey::from("client1"), Money::from_dollars(1))
            .await
            .unwrap();

        store.set_fail_on_commit(true).await;
        assert!(funds.commit(tx).await.is_err());
        assert!(store.has_reservation(tx).await.unwrap());

        store.set_fail_on_commit(false).await;
        funds.rollback(tx).await.unwrap();
        assert!(!store.has_reservation(tx).await.unwrap());
    }
}

mod housekeeping {
    use super::*;

    #[tokio::test]
    async fn clear_reservations_on_startup() {
        let (funds, _) = create_ledgers().await;
        for _ in 0..3 {
            funds
                .enlist(
                    TransactionId::new(),
                    EntityKey::from("client1"),
                    Money::from_dollars(1),
                )
                .await
                .unwrap();
        }

        assert_eq!(funds.clear_reservations().await.unwrap(), 3);
        assert_eq!(funds.reservation_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_with_zero_ttl_removes_everything() {
        let (_, inventory) = create_ledgers().await;
        let tx = TransactionId::new();
        inventory
            .enlist(tx, EntityKey::from("book1"), 1)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(inventory.sweep_expired(Duration::zero()).await.unwrap(), 1);
        assert!(!inventory.prepare(tx).await.unwrap());
    }

    #[tokio::test]
    async fn commit_after_sweep_applies_nothing() {
        let (funds, _) = create_ledgers().await;
        let tx = TransactionId::new();
        funds
            .enlist(tx, EntityKey::from("client1"), Money::from_dollars(100))
            .await
            .unwrap();
        assert!(funds.prepare(tx).await.unwrap());

        funds.clear_reservations().await.unwrap();

        assert!(!funds.commit(tx).await.unwrap());
        let account = funds.get(&EntityKey::from("client1")).await.unwrap();
        assert_eq!(account.balance, Money::from_dollars(20_000));
    }
}

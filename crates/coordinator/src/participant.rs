//! Participant and lookup contracts the coordinator drives.

use async_trait::async_trait;
use common::{EntityKey, Money, TransactionId};
use ledger::{Account, FundsLedger, InventoryLedger, Item, Resource, ResourceLedger};
use ledger_store::LedgerStore;

/// A resource owner taking part in two-phase commit.
#[async_trait]
pub trait Participant: Send + Sync {
    /// The amount reserved against one entity.
    type Delta: Send + 'static;

    /// Returns the participant name used in errors, logs and metrics.
    fn name(&self) -> &'static str;

    /// Registers a reservation under the transaction id.
    async fn enlist(
        &self,
        transaction_id: TransactionId,
        key: EntityKey,
        delta: Self::Delta,
    ) -> ledger::Result<()>;

    /// Votes on whether the reservation can be applied.
    async fn prepare(&self, transaction_id: TransactionId) -> ledger::Result<bool>;

    /// Applies the reservation. Returns `false` when no reservation was held.
    async fn commit(&self, transaction_id: TransactionId) -> ledger::Result<bool>;

    /// Abandons the reservation.
    async fn rollback(&self, transaction_id: TransactionId) -> ledger::Result<()>;
}

/// The item side of a purchase: reserves quantities and knows prices.
#[async_trait]
pub trait ItemCatalog: Participant<Delta = u32> {
    /// Returns every committed item, including out-of-stock ones.
    async fn items(&self) -> ledger::Result<Vec<Item>>;

    /// Returns the current unit price of an item.
    async fn unit_price(&self, key: &EntityKey) -> ledger::Result<Money>;
}

/// The buyer side of a purchase: reserves money.
#[async_trait]
pub trait AccountDirectory: Participant<Delta = Money> {
    /// Returns every committed account.
    async fn accounts(&self) -> ledger::Result<Vec<Account>>;
}

#[async_trait]
impl<R: Resource, S: LedgerStore> Participant for ResourceLedger<R, S> {
    type Delta = R::Delta;

    fn name(&self) -> &'static str {
        R::LEDGER
    }

    async fn enlist(
        &self,
        transaction_id: TransactionId,
        key: EntityKey,
        delta: R::Delta,
    ) -> ledger::Result<()> {
        ResourceLedger::enlist(self, transaction_id, key, delta).await
    }

    async fn prepare(&self, transaction_id: TransactionId) -> ledger::Result<bool> {
        ResourceLedger::prepare(self, transaction_id).await
    }

    async fn commit(&self, transaction_id: TransactionId) -> ledger::Result<bool> {
        ResourceLedger::commit(self, transaction_id).await
    }

    async fn rollback(&self, transaction_id: TransactionId) -> ledger::Result<()> {
        ResourceLedger::rollback(self, transaction_id).await
    }
}

#[async_trait]
impl<S: LedgerStore> ItemCatalog for InventoryLedger<S> {
    async fn items(&self) -> ledger::Result<Vec<Item>> {
        Ok(self.list().await?.into_values().collect())
    }

    async fn unit_price(&self, key: &EntityKey) -> ledger::Result<Money> {
        self.get_price(key).await
    }
}

#[async_trait]
impl<S: LedgerStore> AccountDirectory for FundsLedger<S> {
    async fn accounts(&self) -> ledger::Result<Vec<Account>> {
        Ok(self.list().await?.into_values().collect())
    }
}

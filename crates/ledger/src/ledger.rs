//! Two-phase commit participant over a single resource class.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use chrono::Utc;
use common::{EntityKey, Money, TransactionId};
use ledger_store::{CommitOutcome, CommitWrite, LedgerStore, LedgerStoreExt, ReservationRecord};

use crate::error::{LedgerError, Result};
use crate::reservation::Reservation;
use crate::resource::{Funds, Inventory, Resource};

/// Default number of compare-and-set attempts a commit makes before giving up.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

/// A ledger owning one class of entities plus a reservation table keyed by transaction id.
///
/// Committed entity values change only through [`ResourceLedger::commit`].
/// Enlisting records a pending delta; preparing checks it against committed
/// state without mutating anything; committing applies it atomically.
pub struct ResourceLedger<R: Resource, S: LedgerStore> {
    store: S,
    max_commit_attempts: u32,
    _resource: PhantomData<fn() -> R>,
}

/// Ledger of account balances.
pub type FundsLedger<S> = ResourceLedger<Funds, S>;

/// Ledger of item stock.
pub type InventoryLedger<S> = ResourceLedger<Inventory, S>;

impl<R: Resource, S: LedgerStore + Clone> Clone for ResourceLedger<R, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            max_commit_attempts: self.max_commit_attempts,
            _resource: PhantomData,
        }
    }
}

impl<R: Resource, S: LedgerStore> ResourceLedger<R, S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            _resource: PhantomData,
        }
    }

    /// Sets how many times a commit retries after losing a compare-and-set race.
    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// Returns the ledger namespace.
    pub fn name(&self) -> &'static str {
        R::LEDGER
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records a pending reservation for `transaction_id`.
    ///
    /// Enlisting the same transaction twice overwrites the earlier delta;
    /// it never accumulates. Committed entity state is not touched.
    #[tracing::instrument(skip(self), fields(ledger = R::LEDGER))]
    pub async fn enlist(
        &self,
        transaction_id: TransactionId,
        key: EntityKey,
        delta: R::Delta,
    ) -> Result<()> {
        let record = ReservationRecord::from_delta(transaction_id, key, &delta)?;
        self.store.put_reservation(record).await?;
        tracing::debug!("reservation enlisted");
        Ok(())
    }

    /// Checks whether the reservation can be applied against committed state.
    ///
    /// Returns `false` if there is no reservation, if the referenced entity is
    /// missing, or if the entity cannot cover the reserved delta. Never mutates.
    #[tracing::instrument(skip(self), fields(ledger = R::LEDGER))]
    pub async fn prepare(&self, transaction_id: TransactionId) -> Result<bool> {
        let prepared = match self.store.get_reservation(transaction_id).await? {
            None => {
                tracing::debug!("no reservation to prepare");
                false
            }
            Some(record) => {
                let delta: R::Delta = record.decode()?;
                match self.store.get_entity(&record.entity_key).await? {
                    None => {
                        tracing::debug!(key = %record.entity_key, "reserved entity missing");
                        false
                    }
                    Some(entity) => R::admits(&entity.decode()?, delta),
                }
            }
        };

        metrics::counter!(
            "ledger_prepare_total",
            "ledger" => R::LEDGER,
            "result" => if prepared { "yes" } else { "no" }
        )
        .increment(1);
        tracing::debug!(prepared, "prepare evaluated");

        Ok(prepared)
    }

    /// Applies the reservation: subtracts the delta, writes the entity and
    /// deletes the reservation as one atomic unit.
    ///
    /// A commit for an unknown or already-committed transaction is a no-op and
    /// returns `false`; `true` means the delta was applied by this call.
    /// Sufficiency is re-checked against the entity's current value inside the
    /// compare-and-set loop; if it no longer holds the commit fails with
    /// [`LedgerError::CommitRejected`] and the reservation is kept.
    #[tracing::instrument(skip(self), fields(ledger = R::LEDGER))]
    pub async fn commit(&self, transaction_id: TransactionId) -> Result<bool> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let Some(reservation) = self.store.get_reservation(transaction_id).await? else {
                tracing::debug!("no reservation; commit is a no-op");
                return Ok(false);
            };
            let delta: R::Delta = reservation.decode()?;

            let record = self
                .store
                .get_entity(&reservation.entity_key)
                .await?
                .ok_or_else(|| LedgerError::NotFound {
                    ledger: R::LEDGER,
                    key: reservation.entity_key.clone(),
                })?;
            let mut entity: R::Entity = record.decode()?;

            if !R::admits(&entity, delta) {
                metrics::counter!("ledger_commit_rejected_total", "ledger" => R::LEDGER)
                    .increment(1);
                tracing::warn!(key = %reservation.entity_key, ?delta, "commit re-validation failed");
                return Err(LedgerError::CommitRejected {
                    ledger: R::LEDGER,
                    transaction_id,
                    key: reservation.entity_key,
                });
            }
            R::withdraw(&mut entity, delta);

            let write = CommitWrite {
                transaction_id,
                key: reservation.entity_key.clone(),
                expected_version: record.version,
                payload: serde_json::to_value(&entity)?,
            };

            match self.store.apply_commit(write).await {
                Ok(CommitOutcome::Applied(version)) => {
                    metrics::counter!("ledger_commits_total", "ledger" => R::LEDGER).increment(1);
                    tracing::info!(key = %reservation.entity_key, %version, "reservation committed");
                    return Ok(true);
                }
                Ok(CommitOutcome::ReservationMissing) => {
                    tracing::debug!("reservation cleared concurrently; commit is a no-op");
                    return Ok(false);
                }
                Err(e) if e.is_conflict() && attempt < self.max_commit_attempts => {
                    tracing::debug!(attempt, "entity changed during commit, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Deletes the reservation if present. Never touches committed state.
    #[tracing::instrument(skip(self), fields(ledger = R::LEDGER))]
    pub async fn rollback(&self, transaction_id: TransactionId) -> Result<()> {
        let removed = self.store.delete_reservation(transaction_id).await?;
        tracing::debug!(removed, "reservation rolled back");
        Ok(())
    }

    /// Returns a snapshot of all committed entities keyed by id.
    pub async fn list(&self) -> Result<BTreeMap<EntityKey, R::Entity>> {
        let records = self.store.list_entities().await?;
        let mut entities = BTreeMap::new();
        for record in records {
            entities.insert(record.key.clone(), record.decode()?);
        }
        Ok(entities)
    }

    /// Returns the committed entities shown in the human-facing catalog.
    pub async fn list_available(&self) -> Result<BTreeMap<EntityKey, R::Entity>> {
        let mut entities = self.list().await?;
        entities.retain(|_, entity| R::is_listed(entity));
        Ok(entities)
    }

    /// Looks up a committed entity by key.
    pub async fn get(&self, key: &EntityKey) -> Result<R::Entity> {
        let record = self
            .store
            .get_entity(key)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                ledger: R::LEDGER,
                key: key.clone(),
            })?;
        Ok(record.decode()?)
    }

    /// Returns the reservation held by a transaction, if any.
    pub async fn reservation(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Reservation<R::Delta>>> {
        self.store
            .get_reservation(transaction_id)
            .await?
            .map(Reservation::try_from)
            .transpose()
            .map_err(LedgerError::from)
    }

    /// Returns all pending reservations, oldest first.
    pub async fn reservations(&self) -> Result<Vec<Reservation<R::Delta>>> {
        self.store
            .list_reservations()
            .await?
            .into_iter()
            .map(|record| Reservation::try_from(record).map_err(LedgerError::from))
            .collect()
    }

    /// Returns true if the transaction holds a reservation.
    pub async fn has_reservation(&self, transaction_id: TransactionId) -> Result<bool> {
        Ok(self.store.has_reservation(transaction_id).await?)
    }

    /// Returns the number of pending reservations.
    pub async fn reservation_count(&self) -> Result<usize> {
        Ok(self.store.reservation_count().await?)
    }

    /// Inserts bootstrap entities if the ledger is empty. Returns how many were inserted.
    #[tracing::instrument(skip(self, entities), fields(ledger = R::LEDGER))]
    pub async fn seed_if_empty(
        &self,
        entities: impl IntoIterator<Item = R::Entity> + Send,
    ) -> Result<usize> {
        if !self.store.is_empty().await? {
            tracing::debug!("ledger already populated, skipping seed");
            return Ok(0);
        }

        let mut inserted = 0;
        for entity in entities {
            let payload = serde_json::to_value(&entity)?;
            self.store
                .insert_entity(R::key(&entity).clone(), payload)
                .await?;
            inserted += 1;
        }
        tracing::info!(inserted, "ledger seeded");
        Ok(inserted)
    }

    /// Drops every pending reservation. Returns how many were removed.
    #[tracing::instrument(skip(self), fields(ledger = R::LEDGER))]
    pub async fn clear_reservations(&self) -> Result<usize> {
        let removed = self.store.clear_reservations().await?;
        if removed > 0 {
            tracing::info!(removed, "cleared dangling reservations");
        }
        Ok(removed)
    }

    /// Rolls back reservations enlisted more than `ttl` ago. Returns how many were removed.
    #[tracing::instrument(skip(self), fields(ledger = R::LEDGER))]
    pub async fn sweep_expired(&self, ttl: chrono::Duration) -> Result<usize> {
        let cutoff = Utc::now() - ttl;
        let mut swept = 0;
        for record in self.store.list_reservations().await? {
            if record.created_at >= cutoff {
                // list_reservations is ordered oldest first
                break;
            }
            if self.store.delete_reservation(record.transaction_id).await? {
                tracing::warn!(
                    transaction_id = %record.transaction_id,
                    key = %record.entity_key,
                    "rolled back expired reservation"
                );
                swept += 1;
            }
        }
        if swept > 0 {
            metrics::counter!("reservations_swept_total", "ledger" => R::LEDGER)
                .increment(swept as u64);
        }
        Ok(swept)
    }
}

impl<S: LedgerStore> ResourceLedger<Inventory, S> {
    /// Returns the unit price of an item.
    pub async fn get_price(&self, key: &EntityKey) -> Result<Money> {
        Ok(self.get(key).await?.unit_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Account, Item};
    use ledger_store::InMemoryLedgerStore;

    fn funds() -> FundsLedger<InMemoryLedgerStore> {
        ResourceLedger::new(InMemoryLedgerStore::new("funds"))
    }

    fn inventory() -> InventoryLedger<InMemoryLedgerStore> {
        ResourceLedger::new(InMemoryLedgerStore::new("inventory"))
    }

    async fn seeded_funds(balance: Money) -> FundsLedger<InMemoryLedgerStore> {
        let ledger = funds();
        ledger
            .seed_if_empty([Account::new("A", "Alice", balance)])
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_enlist_does_not_touch_entity() {
        let ledger = seeded_funds(Money::from_dollars(100)).await;
        let tx = TransactionId::new();

        ledger
            .enlist(tx, EntityKey::from("A"), Money::from_dollars(40))
            .await
            .unwrap();

        let account = ledger.get(&EntityKey::from("A")).await.unwrap();
        assert_eq!(account.balance, Money::from_dollars(100));
        let reservation = ledger.reservation(tx).await.unwrap().unwrap();
        assert_eq!(reservation.delta, Money::from_dollars(40));
        assert_eq!(reservation.entity_key, EntityKey::from("A"));
    }

    #[tokio::test]
    async fn test_enlist_twice_overwrites() {
        let ledger = seeded_funds(Money::from_dollars(100)).await;
        let tx = TransactionId::new();

        ledger
            .enlist(tx, EntityKey::from("A"), Money::from_dollars(60))
            .await
            .unwrap();
        ledger
            .enlist(tx, EntityKey::from("A"), Money::from_dollars(60))
            .await
            .unwrap();

        assert_eq!(ledger.reservation_count().await.unwrap(), 1);
        assert!(ledger.prepare(tx).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_without_reservation_is_false() {
        let ledger = seeded_funds(Money::from_dollars(100)).await;
        assert!(!ledger.prepare(TransactionId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_with_missing_entity_is_false() {
        let ledger = funds();
        let tx = TransactionId::new();
        ledger
            .enlist(tx, EntityKey::from("ghost"), Money::from_dollars(1))
            .await
            .unwrap();
        assert!(!ledger.prepare(tx).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_is_pure() {
        let ledger = seeded_funds(Money::from_dollars(100)).await;
        let tx = TransactionId::new();
        ledger
            .enlist(tx, EntityKey::from("A"), Money::from_dollars(100))
            .await
            .unwrap();

        for _ in 0..5 {
            assert!(ledger.prepare(tx).await.unwrap());
        }

        let account = ledger.get(&EntityKey::from("A")).await.unwrap();
        assert_eq!(account.balance, Money::from_dollars(100));
        assert!(ledger.has_reservation(tx).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_applies_and_clears() {
        let ledger = inventory();
        ledger
            .seed_if_empty([Item::new("B1", "Book", Money::from_dollars(100), 5)])
            .await
            .unwrap();
        let tx = TransactionId::new();
        ledger.enlist(tx, EntityKey::from("B1"), 3).await.unwrap();
        assert!(ledger.prepare(tx).await.unwrap());

        assert!(ledger.commit(tx).await.unwrap());

        let item = ledger.get(&EntityKey::from("B1")).await.unwrap();
        assert_eq!(item.quantity_on_hand, 2);
        assert!(!ledger.has_reservation(tx).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_is_idempotent() {
        let ledger = seeded_funds(Money::from_dollars(100)).await;
        let tx = TransactionId::new();
        ledger
            .enlist(tx, EntityKey::from("A"), Money::from_dollars(30))
            .await
            .unwrap();

        assert!(ledger.commit(tx).await.unwrap());
        assert!(!ledger.commit(tx).await.unwrap());
        assert!(!ledger.commit(TransactionId::new()).await.unwrap());

        let account = ledger.get(&EntityKey::from("A")).await.unwrap();
        assert_eq!(account.balance, Money::from_dollars(70));
    }

    #[tokio::test]
    async fn test_commit_rejects_when_resource_exhausted() {
        let ledger = seeded_funds(Money::from_dollars(100)).await;
        let first = TransactionId::new();
        let second = TransactionId::new();
        for tx in [first, second] {
            ledger
                .enlist(tx, EntityKey::from("A"), Money::from_dollars(80))
                .await
                .unwrap();
            assert!(ledger.prepare(tx).await.unwrap());
        }

        ledger.commit(first).await.unwrap();
        let result = ledger.commit(second).await;

        assert!(matches!(result, Err(LedgerError::CommitRejected { .. })));
        let account = ledger.get(&EntityKey::from("A")).await.unwrap();
        assert_eq!(account.balance, Money::from_dollars(20));
        assert!(ledger.has_reservation(second).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_uses_latest_committed_value() {
        let store = InMemoryLedgerStore::new("funds");
        let ledger: FundsLedger<_> = ResourceLedger::new(store.clone());
        ledger
            .seed_if_empty([Account::new("A", "Alice", Money::from_dollars(100))])
            .await
            .unwrap();
        let tx = TransactionId::new();
        ledger
            .enlist(tx, EntityKey::from("A"), Money::from_dollars(10))
            .await
            .unwrap();

        // Concurrent writer lowers the balance after enlist.
        store
            .overwrite_entity(
                &EntityKey::from("A"),
                serde_json::to_value(Account::new("A", "Alice", Money::from_dollars(50))).unwrap(),
            )
            .await
            .unwrap();

        ledger.commit(tx).await.unwrap();
        let account = ledger.get(&EntityKey::from("A")).await.unwrap();
        assert_eq!(account.balance, Money::from_dollars(40));
    }

    #[tokio::test]
    async fn test_rollback_then_prepare_is_false() {
        let ledger = seeded_funds(Money::from_dollars(100)).await;
        let tx = TransactionId::new();
        ledger
            .enlist(tx, EntityKey::from("A"), Money::from_dollars(10))
            .await
            .unwrap();

        ledger.rollback(tx).await.unwrap();
        ledger.rollback(tx).await.unwrap();

        assert!(!ledger.prepare(tx).await.unwrap());
        let account = ledger.get(&EntityKey::from("A")).await.unwrap();
        assert_eq!(account.balance, Money::from_dollars(100));
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_not_found() {
        let ledger = inventory();
        let result = ledger.get_price(&EntityKey::from("missing")).await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_available_hides_out_of_stock() {
        let ledger = inventory();
        ledger
            .seed_if_empty([
                Item::new("book1", "Book 1", Money::from_dollars(100), 5),
                Item::new("book3", "Book 3", Money::from_dollars(200), 0),
            ])
            .await
            .unwrap();

        assert_eq!(ledger.list().await.unwrap().len(), 2);
        let available = ledger.list_available().await.unwrap();
        assert_eq!(available.len(), 1);
        assert!(available.contains_key(&EntityKey::from("book1")));
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let ledger = seeded_funds(Money::from_dollars(1)).await;
        let inserted = ledger
            .seed_if_empty([Account::new("B", "Bob", Money::from_dollars(5))])
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(ledger.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_expired_keeps_fresh_reservations() {
        let store = InMemoryLedgerStore::new("funds");
        let ledger: FundsLedger<_> = ResourceLedger::new(store.clone());
        let stale = TransactionId::new();
        let fresh = TransactionId::new();

        store
            .put_reservation(
                ReservationRecord::from_delta(stale, EntityKey::from("A"), &Money::from_dollars(1))
                    .unwrap()
                    .created_at(Utc::now() - chrono::Duration::minutes(10)),
            )
            .await
            .unwrap();
        ledger
            .enlist(fresh, EntityKey::from("A"), Money::from_dollars(1))
            .await
            .unwrap();

        let swept = ledger.sweep_expired(chrono::Duration::minutes(5)).await.unwrap();

        assert_eq!(swept, 1);
        assert!(!ledger.has_reservation(stale).await.unwrap());
        assert!(ledger.has_reservation(fresh).await.unwrap());
    }
}

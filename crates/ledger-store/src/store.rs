use async_trait::async_trait;

use crate::{
    CommitOutcome, CommitWrite, EntityKey, EntityRecord, ReservationRecord, Result, TransactionId,
    Version,
};

/// Core trait for ledger store implementations.
///
/// A store instance is bound to one ledger namespace (e.g. `"funds"`).
/// All implementations must be thread-safe (Send + Sync) and must make every
/// individual method atomic with respect to concurrent callers.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Returns the ledger namespace this store is bound to.
    fn ledger(&self) -> &str;

    /// Inserts a new entity at [`Version::first`].
    ///
    /// Fails with `AlreadyExists` if the key is taken.
    async fn insert_entity(&self, key: EntityKey, payload: serde_json::Value) -> Result<Version>;

    /// Retrieves a committed entity by key.
    async fn get_entity(&self, key: &EntityKey) -> Result<Option<EntityRecord>>;

    /// Retrieves all committed entities, ordered by key.
    async fn list_entities(&self) -> Result<Vec<EntityRecord>>;

    /// Stores a reservation, replacing any existing one for the same transaction.
    async fn put_reservation(&self, record: ReservationRecord) -> Result<()>;

    /// Retrieves the reservation held by a transaction.
    async fn get_reservation(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<ReservationRecord>>;

    /// Retrieves all pending reservations, oldest first.
    async fn list_reservations(&self) -> Result<Vec<ReservationRecord>>;

    /// Removes a reservation. Returns true if one was present.
    async fn delete_reservation(&self, transaction_id: TransactionId) -> Result<bool>;

    /// Atomically overwrites an entity and removes the reservation that produced it.
    ///
    /// - If the reservation no longer exists, nothing is written and
    ///   [`CommitOutcome::ReservationMissing`] is returned.
    /// - If the entity's current version differs from `write.expected_version`,
    ///   nothing is written and `ConcurrencyConflict` is returned.
    async fn apply_commit(&self, write: CommitWrite) -> Result<CommitOutcome>;

    /// Removes every pending reservation. Returns the number removed.
    async fn clear_reservations(&self) -> Result<usize>;
}

/// Extension trait providing convenience methods for ledger stores.
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    /// Checks whether a transaction holds a reservation.
    async fn has_reservation(&self, transaction_id: TransactionId) -> Result<bool> {
        Ok(self.get_reservation(transaction_id).await?.is_some())
    }

    /// Returns the number of pending reservations.
    async fn reservation_count(&self) -> Result<usize> {
        Ok(self.list_reservations().await?.len())
    }

    /// Returns true if the ledger holds no entities.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.list_entities().await?.is_empty())
    }
}

// Blanket implementation for all LedgerStore implementations
impl<T: LedgerStore + ?Sized> LedgerStoreExt for T {}

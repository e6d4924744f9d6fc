use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CommitOutcome, CommitWrite, EntityKey, EntityRecord, ReservationRecord, Result, StoreError,
    TransactionId, Version, store::LedgerStore,
};

#[derive(Debug, Default)]
struct MemoryState {
    entities: BTreeMap<EntityKey, EntityRecord>,
    reservations: HashMap<TransactionId, ReservationRecord>,
    unavailable: bool,
    fail_on_commit: bool,
}

impl MemoryState {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable("store marked unavailable".to_string()));
        }
        Ok(())
    }
}

/// In-memory ledger store.
///
/// Both tables live behind a single lock, so every operation (including
/// [`LedgerStore::apply_commit`]) is atomic. Clones share the same state.
#[derive(Debug, Clone)]
pub struct InMemoryLedgerStore {
    ledger: Arc<str>,
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty store bound to a ledger namespace.
    pub fn new(ledger: impl Into<String>) -> Self {
        Self {
            ledger: Arc::from(ledger.into()),
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }

    /// Makes every subsequent operation fail with `Unavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Makes subsequent `apply_commit` calls fail with `Unavailable`.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().await.fail_on_commit = fail;
    }

    /// Overwrites an entity payload without touching reservations, bumping its version.
    ///
    /// Simulates a concurrent writer. Returns `None` if the entity does not exist.
    pub async fn overwrite_entity(
        &self,
        key: &EntityKey,
        payload: serde_json::Value,
    ) -> Result<Option<Version>> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let Some(record) = state.entities.get_mut(key) else {
            return Ok(None);
        };
        record.version = record.version.next();
        record.payload = payload;
        record.updated_at = Utc::now();
        Ok(Some(record.version))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn ledger(&self) -> &str {
        &self.ledger
    }

    async fn insert_entity(&self, key: EntityKey, payload: serde_json::Value) -> Result<Version> {
        let mut state = self.state.write().await;
        state.check_available()?;

        if state.entities.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                ledger: self.ledger.to_string(),
                key,
            });
        }

        let record = EntityRecord {
            key: key.clone(),
            version: Version::first(),
            updated_at: Utc::now(),
            payload,
        };
        state.entities.insert(key, record);
        Ok(Version::first())
    }

    async fn get_entity(&self, key: &EntityKey) -> Result<Option<EntityRecord>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.entities.get(key).cloned())
    }

    async fn list_entities(&self) -> Result<Vec<EntityRecord>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.entities.values().cloned().collect())
    }

    async fn put_reservation(&self, record: ReservationRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state.reservations.insert(record.transaction_id, record);
        Ok(())
    }

    async fn get_reservation(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<ReservationRecord>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.reservations.get(&transaction_id).cloned())
    }

    async fn list_reservations(&self) -> Result<Vec<ReservationRecord>> {
        let state = self.state.read().await;
        state.check_available()?;
        let mut reservations: Vec<_> = state.reservations.values().cloned().collect();
        reservations.sort_by_key(|r| r.created_at);
        Ok(reservations)
    }

    async fn delete_reservation(&self, transaction_id: TransactionId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check_available()?;
        Ok(state.reservations.remove(&transaction_id).is_some())
    }

    async fn apply_commit(&self, write: CommitWrite) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        state.check_available()?;
        if state.fail_on_commit {
            return Err(StoreError::Unavailable("commit rejected by store".to_string()));
        }

        if !state.reservations.contains_key(&write.transaction_id) {
            return Ok(CommitOutcome::ReservationMissing);
        }

        let actual = state
            .entities
            .get(&write.key)
            .map(|e| e.version)
            .unwrap_or(Version::initial());
        if actual != write.expected_version {
            metrics::counter!("ledger_store_conflicts_total", "ledger" => self.ledger.to_string())
                .increment(1);
            return Err(StoreError::ConcurrencyConflict {
                ledger: self.ledger.to_string(),
                key: write.key,
                expected: write.expected_version,
                actual,
            });
        }

        let new_version = write.expected_version.next();
        state.entities.insert(
            write.key.clone(),
            EntityRecord {
                key: write.key,
                version: new_version,
                updated_at: Utc::now(),
                payload: write.payload,
            },
        );
        state.reservations.remove(&write.transaction_id);

        Ok(CommitOutcome::Applied(new_version))
    }

    async fn clear_reservations(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let removed = state.reservations.len();
        state.reservations.clear();
        Ok(removed)
    }
}

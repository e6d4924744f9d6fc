use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntityKey, TransactionId};

/// Version number of an entity, used for optimistic compare-and-set.
///
/// An entity is inserted at version 1 and every applied commit increments it by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version (0) of an entity that does not exist.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) assigned on insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A committed entity as persisted in the `entities` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// The entity key within its ledger.
    pub key: EntityKey,

    /// Current version of the entity.
    pub version: Version,

    /// When the entity was last written.
    pub updated_at: DateTime<Utc>,

    /// The entity state as JSON.
    pub payload: serde_json::Value,
}

impl EntityRecord {
    /// Deserializes the payload into a typed entity.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// A pending reservation as persisted in the `reservations` table.
///
/// The payload describes the delta that will be subtracted from the
/// referenced entity when the transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRecord {
    /// The transaction that owns this reservation.
    pub transaction_id: TransactionId,

    /// The entity the reservation targets.
    pub entity_key: EntityKey,

    /// When the reservation was enlisted.
    pub created_at: DateTime<Utc>,

    /// The reserved delta as JSON.
    pub payload: serde_json::Value,
}

impl ReservationRecord {
    /// Creates a reservation record stamped with the current time.
    pub fn new(
        transaction_id: TransactionId,
        entity_key: EntityKey,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            transaction_id,
            entity_key,
            created_at: Utc::now(),
            payload,
        }
    }

    /// Creates a reservation record from a serializable delta.
    pub fn from_delta<T: Serialize>(
        transaction_id: TransactionId,
        entity_key: EntityKey,
        delta: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            transaction_id,
            entity_key,
            serde_json::to_value(delta)?,
        ))
    }

    /// Overrides the creation timestamp.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Deserializes the payload into a typed delta.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// An atomic commit request: replace the entity and clear the reservation.
#[derive(Debug, Clone)]
pub struct CommitWrite {
    /// Reservation to remove.
    pub transaction_id: TransactionId,

    /// Entity to overwrite.
    pub key: EntityKey,

    /// Version the new payload was computed from.
    pub expected_version: Version,

    /// New entity state.
    pub payload: serde_json::Value,
}

/// Outcome of [`crate::LedgerStore::apply_commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The entity was written at the returned version and the reservation removed.
    Applied(Version),

    /// No reservation existed for the transaction; nothing was written.
    ReservationMissing,
}

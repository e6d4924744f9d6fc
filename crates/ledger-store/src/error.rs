use thiserror::Error;

use crate::{EntityKey, Version};

/// Errors that can occur when interacting with a ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The entity changed between read and compare-and-set.
    #[error(
        "Concurrency conflict on {ledger}/{key}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        ledger: String,
        key: EntityKey,
        expected: Version,
        actual: Version,
    },

    /// An entity with the same key already exists.
    #[error("Entity already exists: {ledger}/{key}")]
    AlreadyExists { ledger: String, key: EntityKey },

    /// The backing store cannot serve requests.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if retrying the read-modify-write may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for ledger store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Ledger error types.

use common::{EntityKey, TransactionId};
use ledger_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No entity exists under the requested key.
    #[error("{ledger} entity not found: {key}")]
    NotFound { ledger: &'static str, key: EntityKey },

    /// Commit re-validation found the entity can no longer cover the reservation.
    ///
    /// The reservation is left in place; the coordinator is expected to roll it back.
    #[error("{ledger} commit rejected for transaction {transaction_id}: {key} no longer covers the reservation")]
    CommitRejected {
        ledger: &'static str,
        transaction_id: TransactionId,
        key: EntityKey,
    },

    /// A prepared transaction no longer holds a reservation when it commits.
    #[error("{ledger} holds no reservation for transaction {transaction_id}")]
    ReservationMissing {
        ledger: &'static str,
        transaction_id: TransactionId,
    },

    /// The underlying store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored record could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Returns true if this error is a fault of the underlying persistence.
    pub fn is_store_fault(&self) -> bool {
        matches!(self, LedgerError::Store(_))
    }
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;

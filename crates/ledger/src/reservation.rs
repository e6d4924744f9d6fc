//! Typed view of a pending reservation.

use chrono::{DateTime, Utc};
use common::{EntityKey, Money, TransactionId};
use ledger_store::ReservationRecord;
use serde::de::DeserializeOwned;

/// A pending intent to subtract `delta` from an entity when the transaction commits.
///
/// A reservation never changes committed state on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation<D> {
    pub transaction_id: TransactionId,
    pub entity_key: EntityKey,
    pub delta: D,
    pub created_at: DateTime<Utc>,
}

/// Funds reserved against an account.
pub type FundsReservation = Reservation<Money>;

/// Units reserved against an item.
pub type InventoryReservation = Reservation<u32>;

impl<D: DeserializeOwned> TryFrom<ReservationRecord> for Reservation<D> {
    type Error = serde_json::Error;

    fn try_from(record: ReservationRecord) -> Result<Self, Self::Error> {
        let delta = record.decode()?;
        Ok(Self {
            transaction_id: record.transaction_id,
            entity_key: record.entity_key,
            delta,
            created_at: record.created_at,
        })
    }
}

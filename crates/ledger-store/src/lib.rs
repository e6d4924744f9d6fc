//! Keyed transactional storage for resource ledgers.
//!
//! Each ledger owns two logical tables inside its own namespace:
//! - `entities`: key -> versioned entity record (committed state only)
//! - `reservations`: transaction id -> pending delta record
//!
//! Single-key writes are atomic, and [`LedgerStore::apply_commit`] applies an
//! entity update together with the removal of its reservation as one unit.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{EntityKey, TransactionId};
pub use error::{Result, StoreError};
pub use memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use record::{CommitOutcome, CommitWrite, EntityRecord, ReservationRecord, Version};
pub use store::{LedgerStore, LedgerStoreExt};

//! Shared identifiers and value objects used by both ledgers and the coordinator.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{EntityKey, TransactionId};

//! Two-phase commit coordination for purchases.
//!
//! This crate drives the inventory and funds ledgers through
//! enlist, prepare and commit-or-rollback under one transaction id.
//!
//! The protocol for a purchase:
//! 1. Resolve the item and buyer descriptors to ledger keys
//! 2. Enlist both participants
//! 3. Prepare both participants
//! 4. Commit both if both voted yes, otherwise roll back both
//!
//! A fault after one participant committed surfaces as a partial commit.

pub mod coordinator;
pub mod error;
pub mod participant;
pub mod state;

pub use coordinator::{LedgerCoordinator, TransactionCoordinator, TransactionReceipt};
pub use error::{CoordinatorError, Result};
pub use participant::{AccountDirectory, ItemCatalog, Participant};
pub use state::{ProtocolStep, Transaction, TransactionPhase};

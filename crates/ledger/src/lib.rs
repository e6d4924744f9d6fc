//! Resource ledgers for the purchase system.
//!
//! This crate provides the two-phase commit participants:
//! - `Resource` trait describing an entity class and its admission rule
//! - `ResourceLedger` implementing enlist, prepare, commit and rollback
//! - Funds and inventory ledgers with their bootstrap data

pub mod entity;
pub mod error;
pub mod ledger;
pub mod reservation;
pub mod resource;
pub mod seed;

pub use entity::{Account, Item};
pub use error::{LedgerError, Result};
pub use ledger::{DEFAULT_MAX_COMMIT_ATTEMPTS, FundsLedger, InventoryLedger, ResourceLedger};
pub use reservation::{FundsReservation, InventoryReservation, Reservation};
pub use resource::{Funds, Inventory, Resource};

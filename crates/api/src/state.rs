//! Shared application state.

use coordinator::TransactionCoordinator;
use ledger::{FundsLedger, InventoryLedger};
use ledger_store::LedgerStore;

use crate::gateway::RequestGateway;

/// Gateway over the ledger-backed coordinator.
pub type LedgerGateway<S> = RequestGateway<InventoryLedger<S>, FundsLedger<S>>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: LedgerStore> {
    pub gateway: LedgerGateway<S>,
}

impl<S: LedgerStore> AppState<S> {
    /// Wires both ledgers into a coordinator behind the request gateway.
    pub fn new(inventory: InventoryLedger<S>, funds: FundsLedger<S>) -> Self {
        Self {
            gateway: RequestGateway::new(TransactionCoordinator::new(inventory, funds)),
        }
    }

    pub fn inventory(&self) -> &InventoryLedger<S> {
        self.gateway.coordinator().inventory()
    }

    pub fn funds(&self) -> &FundsLedger<S> {
        self.gateway.coordinator().funds()
    }
}

//! Two-phase commit coordinator for purchases.

use common::{EntityKey, Money, TransactionId};
use ledger::{FundsLedger, InventoryLedger, LedgerError};
use serde::Serialize;

use crate::error::{CoordinatorError, Result};
use crate::participant::{AccountDirectory, ItemCatalog};
use crate::state::{ProtocolStep, Transaction, TransactionPhase};

/// Coordinator over the ledger-backed participants.
pub type LedgerCoordinator<S> = TransactionCoordinator<InventoryLedger<S>, FundsLedger<S>>;

/// Outcome of a committed purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub item_id: EntityKey,
    pub account_id: EntityKey,
    pub quantity: u32,
    pub amount: Money,
    pub phase: TransactionPhase,
}

/// A purchase resolved to ledger keys and priced.
#[derive(Debug, Clone)]
struct PurchasePlan {
    item_id: EntityKey,
    account_id: EntityKey,
    quantity: u32,
    amount: Money,
}

/// Drives the inventory and funds participants through enlist, prepare and
/// commit-or-rollback under a shared transaction id.
///
/// The coordinator is the only component that knows about both ledgers.
/// Transaction state lives on the stack of [`start_transaction`](Self::start_transaction)
/// and is never persisted; reservations orphaned by a crash are reclaimed by
/// the ledgers' expiry sweep.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator<I, F> {
    inventory: I,
    funds: F,
}

impl<I, F> TransactionCoordinator<I, F>
where
    I: ItemCatalog,
    F: AccountDirectory,
{
    /// Creates a new coordinator.
    pub fn new(inventory: I, funds: F) -> Self {
        Self { inventory, funds }
    }

    /// Returns the inventory participant.
    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    /// Returns the funds participant.
    pub fn funds(&self) -> &F {
        &self.funds
    }

    /// Purchases `quantity` units of the item titled `item` on behalf of `buyer`.
    ///
    /// Descriptors are matched case-insensitively against the full ledger
    /// listings. Resolution and pricing happen before any reservation is
    /// created. Any prepare rejection or fault after enlistment rolls back
    /// both participants before the failure is returned.
    #[tracing::instrument(skip(self), fields(transaction_id = tracing::field::Empty))]
    pub async fn start_transaction(
        &self,
        item: &str,
        quantity: u32,
        buyer: &str,
    ) -> Result<TransactionReceipt> {
        if quantity == 0 {
            return Err(CoordinatorError::Validation(
                "Quantity must be greater than zero. Please provide a valid quantity.".to_string(),
            ));
        }

        let plan = self.resolve(item, quantity, buyer).await?;

        let mut tx = Transaction::new();
        tracing::Span::current().record("transaction_id", tracing::field::display(tx.id()));
        metrics::counter!("transactions_started_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.execute(&mut tx, &plan).await;

        metrics::histogram!("transaction_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(()) => {
                metrics::counter!("transactions_committed_total").increment(1);
                tracing::info!(
                    item_id = %plan.item_id,
                    account_id = %plan.account_id,
                    amount = %plan.amount,
                    "transaction committed"
                );
            }
            Err(e) if e.is_partial_commit() => {
                metrics::counter!("transactions_partially_committed_total").increment(1);
            }
            Err(_) => {
                metrics::counter!("transactions_rolled_back_total").increment(1);
            }
        }

        result.map(|()| TransactionReceipt {
            transaction_id: tx.id(),
            item_id: plan.item_id,
            account_id: plan.account_id,
            quantity: plan.quantity,
            amount: plan.amount,
            phase: tx.phase(),
        })
    }

    /// Resolves descriptors to keys and computes the purchase amount.
    async fn resolve(&self, item: &str, quantity: u32, buyer: &str) -> Result<PurchasePlan> {
        let items = self
            .inventory
            .items()
            .await
            .map_err(CoordinatorError::Lookup)?;
        let item_id = items
            .into_iter()
            .find(|candidate| matches_descriptor(&candidate.title, item))
            .map(|found| found.id)
            .ok_or_else(|| CoordinatorError::Resolution {
                entity: "Book",
                descriptor: item.to_string(),
            })?;

        let accounts = self
            .funds
            .accounts()
            .await
            .map_err(CoordinatorError::Lookup)?;
        let account_id = accounts
            .into_iter()
            .find(|candidate| matches_descriptor(&candidate.display_name, buyer))
            .map(|found| found.id)
            .ok_or_else(|| CoordinatorError::Resolution {
                entity: "Client",
                descriptor: buyer.to_string(),
            })?;

        let unit_price = self
            .inventory
            .unit_price(&item_id)
            .await
            .map_err(CoordinatorError::Lookup)?;
        let amount = unit_price.checked_multiply(quantity).ok_or_else(|| {
            CoordinatorError::Validation(format!(
                "Purchase total of {quantity} x {unit_price} is too large."
            ))
        })?;

        tracing::debug!(%item_id, %account_id, %amount, "purchase resolved");

        Ok(PurchasePlan {
            item_id,
            account_id,
            quantity,
            amount,
        })
    }

    async fn execute(&self, tx: &mut Transaction, plan: &PurchasePlan) -> Result<()> {
        let id = tx.id();
        let inventory = self.inventory.name();
        let funds = self.funds.name();

        // 1. Enlist, inventory first
        if let Err(source) = self
            .inventory
            .enlist(id, plan.item_id.clone(), plan.quantity)
            .await
        {
            return Err(self
                .abort(tx, ProtocolStep::Enlist, inventory, source)
                .await);
        }
        tx.enlist(inventory);

        if let Err(source) = self
            .funds
            .enlist(id, plan.account_id.clone(), plan.amount)
            .await
        {
            return Err(self.abort(tx, ProtocolStep::Enlist, funds, source).await);
        }
        tx.enlist(funds);
        tx.advance(TransactionPhase::Enlisted)?;

        // 2. Prepare both before deciding
        let inventory_ready = match self.inventory.prepare(id).await {
            Ok(ready) => ready,
            Err(source) => {
                return Err(self
                    .abort(tx, ProtocolStep::Prepare, inventory, source)
                    .await);
            }
        };
        let funds_ready = match self.funds.prepare(id).await {
            Ok(ready) => ready,
            Err(source) => {
                return Err(self.abort(tx, ProtocolStep::Prepare, funds, source).await);
            }
        };

        if !(inventory_ready && funds_ready) {
            tx.advance(TransactionPhase::PrepareFailed)?;
            let participants: Vec<&'static str> = [(inventory, inventory_ready), (funds, funds_ready)]
                .into_iter()
                .filter(|(_, ready)| !ready)
                .map(|(name, _)| name)
                .collect();
            tracing::info!(?participants, "prepare rejected, rolling back");
            self.rollback_all(id).await;
            tx.advance(TransactionPhase::RolledBack)?;
            return Err(CoordinatorError::Rejected {
                transaction_id: id,
                participants,
            });
        }
        tx.advance(TransactionPhase::Prepared)?;

        // 3. Commit in enlistment order. A prepared reservation must still be
        // there; a missing one was swept or cleared by another process.
        let inventory_commit = require_applied(self.inventory.commit(id).await, inventory, id);
        if let Err(source) = inventory_commit {
            if matches!(source, LedgerError::CommitRejected { .. }) {
                tracing::info!(participant = inventory, "commit rejected, rolling back");
                self.rollback_all(id).await;
                tx.advance(TransactionPhase::RolledBack)?;
                return Err(CoordinatorError::CommitRejected {
                    transaction_id: id,
                    participant: inventory,
                    source,
                });
            }
            return Err(self
                .abort(tx, ProtocolStep::Commit, inventory, source)
                .await);
        }

        let funds_commit = require_applied(self.funds.commit(id).await, funds, id);
        if let Err(source) = funds_commit {
            tx.advance(TransactionPhase::PartiallyCommitted)?;
            tracing::error!(
                committed = inventory,
                failed = funds,
                error = %source,
                "transaction partially committed, reconciliation required"
            );
            self.rollback_all(id).await;
            return Err(CoordinatorError::PartialCommit {
                transaction_id: id,
                committed: vec![inventory],
                failed: funds,
                source,
            });
        }
        tx.advance(TransactionPhase::Committed)?;

        Ok(())
    }

    /// Rolls back both participants after a fault and builds the surfaced error.
    async fn abort(
        &self,
        tx: &mut Transaction,
        step: ProtocolStep,
        participant: &'static str,
        source: LedgerError,
    ) -> CoordinatorError {
        tracing::warn!(%step, participant, error = %source, "participant fault, rolling back");
        self.rollback_all(tx.id()).await;
        if let Err(e) = tx.advance(TransactionPhase::RolledBack) {
            return e;
        }
        CoordinatorError::Protocol {
            transaction_id: tx.id(),
            step,
            participant,
            source,
        }
    }

    /// Best-effort rollback of both participants. Failures are logged only.
    async fn rollback_all(&self, transaction_id: TransactionId) {
        if let Err(e) = self.inventory.rollback(transaction_id).await {
            tracing::warn!(
                participant = self.inventory.name(),
                error = %e,
                "rollback failed, reservation left for expiry sweep"
            );
        }
        if let Err(e) = self.funds.rollback(transaction_id).await {
            tracing::warn!(
                participant = self.funds.name(),
                error = %e,
                "rollback failed, reservation left for expiry sweep"
            );
        }
    }
}

/// Turns a commit that found no reservation into a fault.
fn require_applied(
    commit: ledger::Result<bool>,
    participant: &'static str,
    transaction_id: TransactionId,
) -> ledger::Result<()> {
    if commit? {
        Ok(())
    } else {
        Err(LedgerError::ReservationMissing {
            ledger: participant,
            transaction_id,
        })
    }
}

fn matches_descriptor(label: &str, descriptor: &str) -> bool {
    label.trim().to_lowercase() == descriptor.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::{Account, Item, ResourceLedger};
    use ledger_store::InMemoryLedgerStore;

    async fn create_coordinator(
        balance: Money,
        quantity: u32,
    ) -> LedgerCoordinator<InMemoryLedgerStore> {
        let inventory = ResourceLedger::new(InMemoryLedgerStore::new("inventory"));
        let funds = ResourceLedger::new(InMemoryLedgerStore::new("funds"));
        inventory
            .seed_if_empty([Item::new("B1", "Rust Book", Money::from_dollars(100), quantity)])
            .await
            .unwrap();
        funds
            .seed_if_empty([Account::new("A", "Alice", balance)])
            .await
            .unwrap();
        TransactionCoordinator::new(inventory, funds)
    }

    #[test]
    fn test_descriptor_matching_is_case_insensitive_and_exact() {
        assert!(matches_descriptor("Book 1", "book 1"));
        assert!(matches_descriptor("Book 1", " BOOK 1 "));
        assert!(!matches_descriptor("Book 1", "Book"));
        assert!(!matches_descriptor("Book 1", "Book 12"));
    }

    #[tokio::test]
    async fn test_receipt_describes_committed_purchase() {
        let coordinator = create_coordinator(Money::from_dollars(20_000), 5).await;

        let receipt = coordinator
            .start_transaction("rust book", 3, "ALICE")
            .await
            .unwrap();

        assert_eq!(receipt.item_id, EntityKey::from("B1"));
        assert_eq!(receipt.account_id, EntityKey::from("A"));
        assert_eq!(receipt.quantity, 3);
        assert_eq!(receipt.amount, Money::from_dollars(300));
        assert_eq!(receipt.phase, TransactionPhase::Committed);
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected_before_resolution() {
        let coordinator = create_coordinator(Money::from_dollars(1), 1).await;
        let result = coordinator.start_transaction("nope", 0, "nobody").await;
        assert!(matches!(result, Err(CoordinatorError::Validation(_))));
    }

    #[tokio::test]
    async fn test_overflowing_amount_is_a_validation_error() {
        let inventory = ResourceLedger::new(InMemoryLedgerStore::new("inventory"));
        let funds = ResourceLedger::new(InMemoryLedgerStore::new("funds"));
        inventory
            .seed_if_empty([Item::new("B1", "Gold", Money::from_cents(i64::MAX / 2), 10)])
            .await
            .unwrap();
        funds
            .seed_if_empty([Account::new("A", "Alice", Money::from_cents(i64::MAX))])
            .await
            .unwrap();
        let coordinator = TransactionCoordinator::new(inventory, funds);

        let result = coordinator.start_transaction("Gold", 3, "Alice").await;

        assert!(matches!(result, Err(CoordinatorError::Validation(_))));
        assert_eq!(coordinator.inventory().reservation_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejection_names_the_refusing_participant() {
        let coordinator = create_coordinator(Money::from_dollars(50), 5).await;

        let err = coordinator
            .start_transaction("Rust Book", 1, "Alice")
            .await
            .unwrap_err();

        match err {
            CoordinatorError::Rejected { participants, .. } => {
                assert_eq!(participants, vec!["funds"]);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}

//! Coordinator error types.

use common::TransactionId;
use ledger::LedgerError;
use thiserror::Error;

use crate::state::{ProtocolStep, TransactionPhase};

/// Errors surfaced by [`TransactionCoordinator::start_transaction`](crate::TransactionCoordinator::start_transaction).
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Caller input was rejected before any ledger was touched.
    #[error("{0}")]
    Validation(String),

    /// A descriptor matched no known entity. No reservation was created.
    #[error("{entity} '{descriptor}' doesn't exist")]
    Resolution {
        entity: &'static str,
        descriptor: String,
    },

    /// A ledger read failed before enlistment.
    #[error("{0}")]
    Lookup(#[source] LedgerError),

    /// At least one participant voted no; both were rolled back.
    #[error("Transaction {transaction_id} rejected by {}", participants.join(", "))]
    Rejected {
        transaction_id: TransactionId,
        participants: Vec<&'static str>,
    },

    /// The first participant refused to commit after re-validation; both were rolled back.
    #[error("Transaction {transaction_id} rejected at commit by {participant}")]
    CommitRejected {
        transaction_id: TransactionId,
        participant: &'static str,
        #[source]
        source: LedgerError,
    },

    /// A participant faulted during the protocol; both were rolled back.
    #[error("Transaction {transaction_id} failed during {step} on {participant}: {source}")]
    Protocol {
        transaction_id: TransactionId,
        step: ProtocolStep,
        participant: &'static str,
        #[source]
        source: LedgerError,
    },

    /// One participant committed and the other did not. Requires reconciliation.
    #[error(
        "Transaction {transaction_id} partially committed: {} committed, {failed} failed: {source}",
        committed.join(", ")
    )]
    PartialCommit {
        transaction_id: TransactionId,
        committed: Vec<&'static str>,
        failed: &'static str,
        #[source]
        source: LedgerError,
    },

    /// The coordinator attempted an illegal phase transition.
    #[error("Transaction {transaction_id} cannot move from {from} to {to}")]
    InvalidTransition {
        transaction_id: TransactionId,
        from: TransactionPhase,
        to: TransactionPhase,
    },
}

impl CoordinatorError {
    /// Returns the transaction id if the failure happened after one was generated.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            CoordinatorError::Rejected { transaction_id, .. }
            | CoordinatorError::CommitRejected { transaction_id, .. }
            | CoordinatorError::Protocol { transaction_id, .. }
            | CoordinatorError::PartialCommit { transaction_id, .. }
            | CoordinatorError::InvalidTransition { transaction_id, .. } => Some(*transaction_id),
            CoordinatorError::Validation(_)
            | CoordinatorError::Resolution { .. }
            | CoordinatorError::Lookup(_) => None,
        }
    }

    /// Returns true if global state is inconsistent and needs reconciliation.
    pub fn is_partial_commit(&self) -> bool {
        matches!(self, CoordinatorError::PartialCommit { .. })
    }
}

/// Convenience type alias for coordinator results.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

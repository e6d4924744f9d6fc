//! Per-transaction state machine.

use common::TransactionId;
use serde::{Deserialize, Serialize};

use crate::error::{CoordinatorError, Result};

/// The phase of a transaction as seen by the coordinator.
///
/// State transitions:
/// ```text
/// Created ──► Enlisted ──┬──► Prepared ──┬──► Committed
///    │           │       │               ├──► PartiallyCommitted
///    │           │       │               └──► RolledBack
///    │           │       └──► PrepareFailed ──► RolledBack
///    └───────────┴──────────────────────────► RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransactionPhase {
    /// Transaction id generated, nothing enlisted yet.
    #[default]
    Created,

    /// Both participants hold a reservation.
    Enlisted,

    /// Both participants voted yes.
    Prepared,

    /// At least one participant voted no.
    PrepareFailed,

    /// Both participants applied their reservation (terminal state).
    Committed,

    /// Reservations were abandoned (terminal state).
    RolledBack,

    /// One participant committed and the other did not (degraded terminal state).
    PartiallyCommitted,
}

impl TransactionPhase {
    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TransactionPhase) -> bool {
        use TransactionPhase::*;
        matches!(
            (self, next),
            (Created, Enlisted)
                | (Created, RolledBack)
                | (Enlisted, Prepared)
                | (Enlisted, PrepareFailed)
                | (Enlisted, RolledBack)
                | (Prepared, Committed)
                | (Prepared, RolledBack)
                | (Prepared, PartiallyCommitted)
                | (PrepareFailed, RolledBack)
        )
    }

    /// Returns true if participants may still be committed.
    pub fn can_commit(&self) -> bool {
        matches!(self, TransactionPhase::Prepared)
    }

    /// Returns true if reservations may still be rolled back.
    pub fn can_rollback(&self) -> bool {
        self.can_transition_to(TransactionPhase::RolledBack)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionPhase::Committed
                | TransactionPhase::RolledBack
                | TransactionPhase::PartiallyCommitted
        )
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionPhase::Created => "Created",
            TransactionPhase::Enlisted => "Enlisted",
            TransactionPhase::Prepared => "Prepared",
            TransactionPhase::PrepareFailed => "PrepareFailed",
            TransactionPhase::Committed => "Committed",
            TransactionPhase::RolledBack => "RolledBack",
            TransactionPhase::PartiallyCommitted => "PartiallyCommitted",
        }
    }
}

impl std::fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The protocol step a participant was executing when it faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolStep {
    Enlist,
    Prepare,
    Commit,
}

impl std::fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProtocolStep::Enlist => "enlist",
            ProtocolStep::Prepare => "prepare",
            ProtocolStep::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// A transaction held in the coordinator's execution context. Never persisted.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TransactionId,
    participants: Vec<&'static str>,
    phase: TransactionPhase,
}

impl Transaction {
    /// Starts a transaction under a fresh id.
    pub fn new() -> Self {
        Self::with_id(TransactionId::new())
    }

    /// Starts a transaction under the given id.
    pub fn with_id(id: TransactionId) -> Self {
        Self {
            id,
            participants: Vec::new(),
            phase: TransactionPhase::Created,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    /// Participants enlisted so far, in enlistment order.
    pub fn participants(&self) -> &[&'static str] {
        &self.participants
    }

    /// Records a participant as enlisted.
    pub fn enlist(&mut self, participant: &'static str) {
        if !self.participants.contains(&participant) {
            self.participants.push(participant);
        }
    }

    /// Moves the transaction to `next`, rejecting illegal transitions.
    pub fn advance(&mut self, next: TransactionPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(CoordinatorError::InvalidTransition {
                transaction_id: self.id,
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "transaction phase changed");
        self.phase = next;
        Ok(())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

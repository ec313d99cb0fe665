//! Transaction model - the append-only audit log of a jar.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{generate_id, now_millis};

/// Kind of change a transaction records.
///
/// The set is closed; `NameRemoved` and `Other` are accepted on the wire
/// but never produced by balance deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAction {
    NameAdded,
    NameRemoved,
    AmountAdded,
    AmountRemoved,
    Other,
}

impl TransactionAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameAdded => "name_added",
            Self::NameRemoved => "name_removed",
            Self::AmountAdded => "amount_added",
            Self::AmountRemoved => "amount_removed",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The exact delta applied to a member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub member_name: String,
    pub amount: f64,
}

/// A transaction that has been computed but not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    /// Free-form actor label shown in the log
    pub actor_id: String,
    pub action: TransactionAction,
    pub details: TransactionDetails,
}

/// An immutable, committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unique identifier, assigned at commit
    pub id: String,

    /// Jar this transaction belongs to
    pub jar_id: String,

    /// Jar revision produced by this transaction
    pub revision: u64,

    /// Commit time (ms since Unix epoch), not monotonic across writers
    pub timestamp: u64,

    /// Display label of whoever performed the change
    pub actor_id: String,

    pub action: TransactionAction,

    pub details: TransactionDetails,
}

impl Transaction {
    /// Seal a draft into a transaction with a fresh id and timestamp.
    pub fn commit(draft: TransactionDraft, jar_id: &str, revision: u64) -> Self {
        Self {
            id: generate_id(),
            jar_id: jar_id.to_string(),
            revision,
            timestamp: now_millis(),
            actor_id: draft.actor_id,
            action: draft.action,
            details: draft.details,
        }
    }
}

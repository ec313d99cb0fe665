//! Wire types shared by the node and its observers.

use serde::{Deserialize, Serialize};

use super::jar::Jar;
use super::transaction::Transaction;

/// Result of a committed balance change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MutationOutcome {
    pub jar: Jar,
    pub transaction: Transaction,
}

/// Frame pushed to real-time observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JarEvent {
    /// A committed transaction, fields inlined
    Transaction(Transaction),
    /// The observer fell behind and `missed` transactions were dropped
    Lagged { missed: u64 },
    /// Keep-alive
    Heartbeat { timestamp: u64 },
}

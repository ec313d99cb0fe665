//! Ledger models.
//!
//! # Core Types
//!
//! - [`Jar`] - The shared aggregate: members, balances, permissions
//! - [`Transaction`] - Immutable audit record of one balance change
//! - [`JarEvent`] - Frame pushed to real-time observers
//! - [`MutationOutcome`] - Jar and transaction returned by a committed change
//!
//! # Supporting Types
//!
//! - [`Member`] - A named balance inside a jar
//! - [`Permission`] - A per-user edit grant
//! - [`TransactionAction`] - Closed set of transaction kinds
//! - [`TransactionDetails`] - The exact delta a transaction applied
//! - [`TransactionDraft`] - An uncommitted transaction (no id, no revision)

mod event;
mod jar;
mod transaction;

pub use event::{JarEvent, MutationOutcome};
pub use jar::{Jar, Member, Permission};
pub use transaction::{Transaction, TransactionAction, TransactionDetails, TransactionDraft};

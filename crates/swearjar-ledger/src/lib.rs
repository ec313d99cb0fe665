//! Swear Jar Ledger
//!
//! Pure domain types for the shared swear jar tracker. Nothing in this crate
//! performs I/O: storage, locking and fan-out live in `swearjar-node`, and the
//! client-side reconciliation lives in `swearjar-view`.
//!
//! # Design
//!
//! A [`Jar`] is the only shared mutable aggregate. Every balance change is
//! described by exactly one immutable [`Transaction`], produced from a
//! [`TransactionDraft`] at commit time. The [`authz`] module is the
//! authorization gate deciding who may mutate a jar.
//!
//! Each committed change bumps the jar's `revision`; a transaction carries the
//! revision it produced, so the log of a jar is totally ordered.

pub mod authz;
pub mod error;
pub mod id;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    Jar, JarEvent, Member, MutationOutcome, Permission, Transaction, TransactionAction,
    TransactionDetails, TransactionDraft,
};

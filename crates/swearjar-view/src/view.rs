//! Local jar + transaction list reconciliation.

use crate::error::Result;
use swearjar_ledger::{Jar, JarEvent, MutationOutcome, Transaction};
use tracing::{debug, warn};

/// What happened to one incoming transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Next in sequence: balances updated, revision advanced
    Applied,
    /// Already in the local list
    Duplicate,
    /// Belongs to a different jar
    OtherJar,
    /// Already reflected in the local aggregate; added to the list only
    Recorded,
    /// Arrived ahead of a missing revision; the view needs a re-fetch
    Gap { expected: u64, received: u64 },
}

/// A client's view of one jar.
#[derive(Debug, Clone)]
pub struct JarView {
    jar: Jar,
    transactions: Vec<Transaction>,
    stale: bool,
}

impl JarView {
    /// Start from a fetched jar and its history.
    pub fn new(jar: Jar, history: Vec<Transaction>) -> Self {
        let mut view = Self {
            jar: jar.clone(),
            transactions: Vec::new(),
            stale: false,
        };
        view.load(jar, history);
        view
    }

    /// Replace local state with a fresh snapshot. Clears the stale flag.
    pub fn load(&mut self, jar: Jar, history: Vec<Transaction>) {
        let mut transactions: Vec<Transaction> = history
            .into_iter()
            .filter(|txn| txn.jar_id == jar.id)
            .collect();
        transactions.sort_by_key(|txn| txn.revision);
        transactions.dedup_by(|a, b| a.id == b.id);

        self.jar = jar;
        self.transactions = transactions;
        self.stale = false;
    }

    /// Apply one transaction pushed by the node.
    pub fn apply_transaction(&mut self, txn: Transaction) -> Applied {
        if txn.jar_id != self.jar.id {
            return Applied::OtherJar;
        }
        if self.transactions.iter().any(|known| known.id == txn.id) {
            debug!(txn_id = %txn.id, "Duplicate transaction ignored");
            return Applied::Duplicate;
        }

        let expected = self.jar.revision + 1;
        let applied = if txn.revision == expected {
            self.jar.replay(txn.action, &txn.details);
            self.jar.revision = txn.revision;
            Applied::Applied
        } else if txn.revision < expected {
            Applied::Recorded
        } else {
            warn!(
                jar_id = %self.jar.id,
                expected,
                received = txn.revision,
                "Revision gap, view needs refresh"
            );
            self.stale = true;
            Applied::Gap {
                expected,
                received: txn.revision,
            }
        };

        self.insert_ordered(txn);
        applied
    }

    /// Decode and apply one WebSocket text frame.
    ///
    /// Returns `None` for frames that carry no transaction.
    pub fn apply_frame(&mut self, frame: &str) -> Result<Option<Applied>> {
        match serde_json::from_str::<JarEvent>(frame)? {
            JarEvent::Transaction(txn) => Ok(Some(self.apply_transaction(txn))),
            JarEvent::Lagged { missed } => {
                warn!(jar_id = %self.jar.id, missed, "Feed lagged, view needs refresh");
                self.stale = true;
                Ok(None)
            }
            JarEvent::Heartbeat { .. } => Ok(None),
        }
    }

    /// Merge the result of a mutation this client made itself.
    ///
    /// The returned aggregate replaces the local one if it is newer; the
    /// transaction is added unless the feed already delivered it.
    pub fn merge_outcome(&mut self, outcome: MutationOutcome) {
        let MutationOutcome { jar, transaction } = outcome;
        if jar.id != self.jar.id {
            return;
        }
        if jar.revision > self.jar.revision {
            self.jar = jar;
        }
        if !self.transactions.iter().any(|known| known.id == transaction.id) {
            self.insert_ordered(transaction);
        }
    }

    fn insert_ordered(&mut self, txn: Transaction) {
        let at = self
            .transactions
            .partition_point(|known| known.revision <= txn.revision);
        self.transactions.insert(at, txn);
    }

    /// Whether the local copy may have missed changes.
    pub fn needs_refresh(&self) -> bool {
        self.stale
    }

    pub fn jar(&self) -> &Jar {
        &self.jar
    }

    /// Known transactions, in revision order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn balance_of(&self, member_name: &str) -> Option<f64> {
        self.jar.balance_of(member_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swearjar_ledger::{TransactionAction, TransactionDetails, TransactionDraft};

    fn jar() -> Jar {
        Jar::new("J1".into(), "Office".into(), "U1".into()).unwrap()
    }

    fn txn(jar_id: &str, revision: u64, action: TransactionAction, amount: f64) -> Transaction {
        Transaction::commit(
            TransactionDraft {
                actor_id: "U1".into(),
                action,
                details: TransactionDetails {
                    member_name: "Alice".into(),
                    amount,
                },
            },
            jar_id,
            revision,
        )
    }

    #[test]
    fn applies_in_sequence() {
        let mut view = JarView::new(jar(), Vec::new());
        let first = txn("J1", 1, TransactionAction::NameAdded, 10.0);
        let second = txn("J1", 2, TransactionAction::AmountRemoved, -4.0);

        assert_eq!(view.apply_transaction(first), Applied::Applied);
        assert_eq!(view.apply_transaction(second), Applied::Applied);
        assert_eq!(view.balance_of("Alice"), Some(6.0));
        assert_eq!(view.jar().revision, 2);
        assert_eq!(view.transactions().len(), 2);
        assert!(!view.needs_refresh());
    }

    #[test]
    fn duplicates_are_idempotent() {
        let mut view = JarView::new(jar(), Vec::new());
        let first = txn("J1", 1, TransactionAction::NameAdded, 10.0);

        assert_eq!(view.apply_transaction(first.clone()), Applied::Applied);
        assert_eq!(view.apply_transaction(first), Applied::Duplicate);
        assert_eq!(view.balance_of("Alice"), Some(10.0));
        assert_eq!(view.transactions().len(), 1);
    }

    #[test]
    fn other_jars_are_skipped() {
        let mut view = JarView::new(jar(), Vec::new());
        let foreign = txn("J2", 1, TransactionAction::NameAdded, 10.0);

        assert_eq!(view.apply_transaction(foreign), Applied::OtherJar);
        assert!(view.transactions().is_empty());
        assert_eq!(view.balance_of("Alice"), None);
    }

    #[test]
    fn gap_marks_stale_and_load_recovers() {
        let mut view = JarView::new(jar(), Vec::new());
        let first = txn("J1", 1, TransactionAction::NameAdded, 10.0);
        let third = txn("J1", 3, TransactionAction::AmountAdded, 2.0);

        assert_eq!(
            view.apply_transaction(third.clone()),
            Applied::Gap {
                expected: 1,
                received: 3
            }
        );
        assert!(view.needs_refresh());
        assert_eq!(view.balance_of("Alice"), None);

        // Late arrival still lands in revision order.
        assert_eq!(view.apply_transaction(first.clone()), Applied::Applied);
        assert_eq!(view.transactions()[0].id, first.id);
        assert_eq!(view.transactions()[1].id, third.id);

        let mut fresh = jar();
        fresh.replay(first.action, &first.details);
        fresh.replay(third.action, &third.details);
        fresh.revision = 3;
        view.load(fresh, vec![third, first]);
        assert!(!view.needs_refresh());
        assert_eq!(view.balance_of("Alice"), Some(12.0));
        assert_eq!(view.transactions()[0].revision, 1);
    }

    #[test]
    fn older_revisions_are_recorded_only() {
        let mut snapshot = jar();
        snapshot.replay(TransactionAction::NameAdded, &TransactionDetails {
            member_name: "Alice".into(),
            amount: 10.0,
        });
        snapshot.revision = 1;
        let mut view = JarView::new(snapshot, Vec::new());

        let first = txn("J1", 1, TransactionAction::NameAdded, 10.0);
        assert_eq!(view.apply_transaction(first), Applied::Recorded);
        assert_eq!(view.balance_of("Alice"), Some(10.0));
        assert_eq!(view.transactions().len(), 1);
    }

    #[test]
    fn frames_drive_the_view() {
        let mut view = JarView::new(jar(), Vec::new());
        let first = txn("J1", 1, TransactionAction::NameAdded, 10.0);
        let frame = serde_json::to_string(&JarEvent::Transaction(first)).unwrap();

        assert_eq!(view.apply_frame(&frame).unwrap(), Some(Applied::Applied));
        assert_eq!(
            view.apply_frame(r#"{"type":"heartbeat","timestamp":1}"#).unwrap(),
            None
        );
        assert!(!view.needs_refresh());

        assert_eq!(view.apply_frame(r#"{"type":"lagged","missed":4}"#).unwrap(), None);
        assert!(view.needs_refresh());

        assert!(view.apply_frame("not json").is_err());
    }

    #[test]
    fn merge_outcome_dedups_against_the_feed() {
        let mut view = JarView::new(jar(), Vec::new());
        let first = txn("J1", 1, TransactionAction::NameAdded, 10.0);

        let mut committed = jar();
        committed.replay(first.action, &first.details);
        committed.revision = 1;

        // Feed delivered it first.
        assert_eq!(view.apply_transaction(first.clone()), Applied::Applied);
        view.merge_outcome(MutationOutcome {
            jar: committed.clone(),
            transaction: first.clone(),
        });
        assert_eq!(view.transactions().len(), 1);
        assert_eq!(view.balance_of("Alice"), Some(10.0));

        // Outcome first, feed echo afterwards.
        let mut other = JarView::new(jar(), Vec::new());
        other.merge_outcome(MutationOutcome {
            jar: committed,
            transaction: first.clone(),
        });
        assert_eq!(other.jar().revision, 1);
        assert_eq!(other.apply_transaction(first), Applied::Duplicate);
        assert_eq!(other.balance_of("Alice"), Some(10.0));
    }
}

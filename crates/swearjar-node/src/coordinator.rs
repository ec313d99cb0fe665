//! Mutation coordinator - the single write path for jars.
//!
//! Balance changes run the authorization gate, the member-delta rules and
//! the commit inside one ledger unit of work, then hand the committed
//! transaction to the broadcaster. A failure anywhere before the commit
//! leaves both the jar and its log untouched; a broadcast problem never
//! undoes a commit.

use crate::broadcast::Broadcaster;
use crate::error::{Error, Result};
use crate::ledger::LedgerStore;
use std::sync::Arc;
use swearjar_ledger::{authz, Jar, MutationOutcome, TransactionDetails, TransactionDraft};
use tracing::{debug, info};

/// Coordinates every jar mutation.
pub struct MutationCoordinator {
    ledger: Arc<LedgerStore>,
    broadcaster: Arc<Broadcaster>,
}

impl MutationCoordinator {
    /// Create a coordinator writing to `ledger` and publishing to `broadcaster`.
    pub fn new(ledger: Arc<LedgerStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            ledger,
            broadcaster,
        }
    }

    /// Create a jar owned by the caller.
    pub fn create_jar(&self, name: &str, owner_id: &str) -> Result<Jar> {
        let jar = self.ledger.create_jar(name, owner_id)?;
        info!(jar_id = %jar.id, owner_id, name = %jar.name, "Created jar");
        Ok(jar)
    }

    /// Apply a signed amount to a member of a jar.
    ///
    /// Creates the member on a non-negative delta if absent. A negative delta
    /// on an absent member is [`Error::NotFound`]. Callers without edit
    /// rights get [`Error::Forbidden`].
    pub async fn apply_member_delta(
        &self,
        jar_id: &str,
        caller_id: &str,
        member_name: &str,
        signed_amount: f64,
        actor_label: &str,
    ) -> Result<MutationOutcome> {
        if actor_label.trim().is_empty() {
            return Err(Error::Validation("actor label is required".into()));
        }

        let broadcaster = &self.broadcaster;
        let result = self
            .ledger
            .atomic_apply(
                jar_id,
                |jar| {
                    authz::ensure_can_edit(jar, caller_id)?;
                    let action = jar.apply_member_delta(member_name, signed_amount)?;
                    Ok(TransactionDraft {
                        actor_id: actor_label.to_string(),
                        action,
                        details: TransactionDetails {
                            member_name: member_name.to_string(),
                            amount: signed_amount,
                        },
                    })
                },
                // Published under the jar lock so the feed is in revision order
                |transaction| broadcaster.publish(transaction),
            )
            .await;

        let (jar, transaction) = match result {
            Ok(committed) => committed,
            Err(e) => {
                debug!(jar_id, caller_id, member_name, error = %e, "Member delta rejected");
                return Err(e);
            }
        };

        info!(
            jar_id,
            txn_id = %transaction.id,
            revision = transaction.revision,
            action = %transaction.action,
            member_name,
            amount = signed_amount,
            "Committed member delta"
        );

        Ok(MutationOutcome { jar, transaction })
    }

    /// Give `target_user_id` edit rights. Owner only.
    pub async fn grant_permission(
        &self,
        jar_id: &str,
        caller_id: &str,
        target_user_id: &str,
    ) -> Result<Jar> {
        if target_user_id.trim().is_empty() {
            return Err(Error::Validation("target user id is required".into()));
        }

        let jar = self
            .ledger
            .atomic_update(jar_id, |jar| {
                authz::ensure_can_manage_permissions(jar, caller_id)?;
                if authz::can_edit(jar, target_user_id) {
                    return Err(Error::Conflict(format!(
                        "user {} can already edit jar {}",
                        target_user_id, jar.id
                    )));
                }
                jar.grant_edit(target_user_id);
                Ok(true)
            })
            .await?;

        info!(jar_id, target_user_id, revision = jar.revision, "Granted edit permission");
        Ok(jar)
    }

    /// Remove `target_user_id`'s permission entry. Owner only.
    ///
    /// Revoking a user without an entry is a no-op and writes nothing, so the
    /// revision does not move. The owner's implicit
    /// rights survive revoking their own entry.
    pub async fn revoke_permission(
        &self,
        jar_id: &str,
        caller_id: &str,
        target_user_id: &str,
    ) -> Result<Jar> {
        let mut removed = false;
        let jar = self
            .ledger
            .atomic_update(jar_id, |jar| {
                authz::ensure_can_manage_permissions(jar, caller_id)?;
                removed = jar.revoke(target_user_id);
                Ok(removed)
            })
            .await?;

        info!(jar_id, target_user_id, removed, revision = jar.revision, "Revoked edit permission");
        Ok(jar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Delivery;
    use crate::storage::Storage;
    use std::time::Duration;
    use swearjar_ledger::TransactionAction;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        ledger: Arc<LedgerStore>,
        broadcaster: Arc<Broadcaster>,
        coordinator: MutationCoordinator,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        let ledger = Arc::new(LedgerStore::new(storage, Duration::from_secs(1)));
        let broadcaster = Arc::new(Broadcaster::default());
        let coordinator = MutationCoordinator::new(Arc::clone(&ledger), Arc::clone(&broadcaster));
        Fixture {
            _dir: dir,
            ledger,
            broadcaster,
            coordinator,
        }
    }

    #[tokio::test]
    async fn add_adjust_and_go_negative() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();

        let first = f
            .coordinator
            .apply_member_delta(&jar.id, "U1", "Alice", 10.0, "U1")
            .await
            .unwrap();
        assert_eq!(first.jar.balance_of("Alice"), Some(10.0));
        assert_eq!(first.transaction.action, TransactionAction::NameAdded);
        assert_eq!(first.transaction.details.amount, 10.0);

        let second = f
            .coordinator
            .apply_member_delta(&jar.id, "U1", "Alice", 5.0, "U1")
            .await
            .unwrap();
        assert_eq!(second.jar.balance_of("Alice"), Some(15.0));
        assert_eq!(second.transaction.action, TransactionAction::AmountAdded);

        let third = f
            .coordinator
            .apply_member_delta(&jar.id, "U1", "Alice", -20.0, "U1")
            .await
            .unwrap();
        assert_eq!(third.jar.balance_of("Alice"), Some(-5.0));
        assert_eq!(third.transaction.action, TransactionAction::AmountRemoved);
        assert_eq!(third.transaction.details.amount, -20.0);

        let log = f.ledger.list_transactions(&jar.id).unwrap();
        assert_eq!(log, vec![first.transaction, second.transaction, third.transaction]);
    }

    #[tokio::test]
    async fn removing_from_unknown_member_changes_nothing() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();

        let err = f
            .coordinator
            .apply_member_delta(&jar.id, "U1", "Bob", -5.0, "U1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(f.ledger.get_jar(&jar.id).unwrap(), jar);
        assert!(f.ledger.list_transactions(&jar.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn stranger_is_forbidden() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();

        let err = f
            .coordinator
            .apply_member_delta(&jar.id, "U2", "Alice", 1.0, "U2")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(f.ledger.get_jar(&jar.id).unwrap(), jar);
        assert!(f.ledger.list_transactions(&jar.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn grant_then_revoke() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();

        f.coordinator.grant_permission(&jar.id, "U1", "U2").await.unwrap();
        f.coordinator
            .apply_member_delta(&jar.id, "U2", "Alice", 1.0, "U2")
            .await
            .unwrap();

        f.coordinator.revoke_permission(&jar.id, "U1", "U2").await.unwrap();
        let err = f
            .coordinator
            .apply_member_delta(&jar.id, "U2", "Alice", 1.0, "U2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(f.ledger.get_jar(&jar.id).unwrap().balance_of("Alice"), Some(1.0));
    }

    #[tokio::test]
    async fn only_owner_manages_permissions() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();
        f.coordinator.grant_permission(&jar.id, "U1", "U2").await.unwrap();

        let err = f
            .coordinator
            .grant_permission(&jar.id, "U2", "U3")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = f
            .coordinator
            .revoke_permission(&jar.id, "U2", "U1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn double_grant_conflicts() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();
        f.coordinator.grant_permission(&jar.id, "U1", "U2").await.unwrap();

        let err = f
            .coordinator
            .grant_permission(&jar.id, "U1", "U2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let err = f
            .coordinator
            .grant_permission(&jar.id, "U1", "U1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn owner_survives_self_revoke() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();

        let jar = f.coordinator.revoke_permission(&jar.id, "U1", "U1").await.unwrap();
        assert!(jar.permissions.is_empty());
        assert!(f
            .coordinator
            .apply_member_delta(&jar.id, "U1", "Alice", 1.0, "U1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn committed_delta_is_broadcast() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();
        let mut subscription = f.broadcaster.subscribe(Some(jar.id.clone()));

        let outcome = f
            .coordinator
            .apply_member_delta(&jar.id, "U1", "Alice", 2.0, "Uno")
            .await
            .unwrap();

        assert_eq!(outcome.transaction.actor_id, "Uno");
        assert_eq!(
            subscription.recv().await,
            Some(Delivery::Transaction(outcome.transaction))
        );
    }

    #[tokio::test]
    async fn rejected_delta_is_not_broadcast() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();
        let mut subscription = f.broadcaster.subscribe(None);

        let _ = f
            .coordinator
            .apply_member_delta(&jar.id, "U2", "Alice", 2.0, "U2")
            .await;

        let pending =
            tokio::time::timeout(Duration::from_millis(50), subscription.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn noop_revoke_keeps_revision() {
        let f = fixture();
        let jar = f.coordinator.create_jar("Office", "U1").unwrap();

        let same = f
            .coordinator
            .revoke_permission(&jar.id, "U1", "nobody")
            .await
            .unwrap();
        assert_eq!(same.revision, 0);
        assert_eq!(f.ledger.get_jar(&jar.id).unwrap().revision, 0);

        f.coordinator.grant_permission(&jar.id, "U1", "U2").await.unwrap();
        let revoked = f
            .coordinator
            .revoke_permission(&jar.id, "U1", "U2")
            .await
            .unwrap();
        assert_eq!(revoked.revision, 2);
    }
}

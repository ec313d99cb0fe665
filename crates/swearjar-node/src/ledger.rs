//! Ledger store - jars and their transaction logs with atomic commits.

use crate::error::{Error, Result};
use crate::locks::{JarGuard, JarLocks};
use crate::storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use swearjar_ledger::id::generate_id;
use swearjar_ledger::{Jar, Transaction, TransactionDraft};

/// Durable, queryable jar and transaction store.
///
/// Every write to an existing jar goes through [`LedgerStore::atomic_apply`]
/// or [`LedgerStore::atomic_update`], which hold the jar's lock across the
/// read, the caller's computation and the batched write.
pub struct LedgerStore {
    storage: Arc<Storage>,
    locks: JarLocks,
}

impl LedgerStore {
    /// Create a ledger over shared storage.
    pub fn new(storage: Arc<Storage>, lock_timeout: Duration) -> Self {
        Self {
            storage,
            locks: JarLocks::new(lock_timeout),
        }
    }

    /// Create an empty jar owned by `owner_id`.
    pub fn create_jar(&self, name: &str, owner_id: &str) -> Result<Jar> {
        let jar = Jar::new(generate_id(), name.trim().to_string(), owner_id.to_string())?;
        self.storage.insert_jar(&jar)?;
        Ok(jar)
    }

    /// Get a jar by ID.
    pub fn get_jar(&self, id: &str) -> Result<Jar> {
        self.storage
            .get_jar(id)?
            .ok_or_else(|| Error::NotFound(format!("jar {}", id)))
    }

    /// List all jars, oldest first.
    pub fn list_jars(&self) -> Result<Vec<Jar>> {
        self.storage.list_jars()
    }

    /// All transactions of an existing jar, in commit order.
    pub fn list_transactions(&self, jar_id: &str) -> Result<Vec<Transaction>> {
        self.get_jar(jar_id)?;
        self.storage.list_transactions(jar_id)
    }

    /// Apply a balance change and append its transaction as one unit.
    ///
    /// `mutate` sees the current jar and returns the draft describing what
    /// it changed. If it fails, nothing is written. On success the jar's
    /// revision is bumped, the jar plus the sealed transaction are written
    /// in a single batch, and `on_commit` runs before the jar is unlocked,
    /// so hooks observe commits of one jar in revision order.
    pub async fn atomic_apply<F, C>(
        &self,
        jar_id: &str,
        mutate: F,
        on_commit: C,
    ) -> Result<(Jar, Transaction)>
    where
        F: FnOnce(&mut Jar) -> Result<TransactionDraft>,
        C: FnOnce(&Transaction),
    {
        let _guard = self.lock_existing(jar_id).await?;

        let mut jar = self.get_jar(jar_id)?;
        let read_revision = jar.revision;
        let draft = mutate(&mut jar)?;

        jar.revision = read_revision + 1;
        let transaction = Transaction::commit(draft, &jar.id, jar.revision);
        self.storage.commit(read_revision, &jar, Some(&transaction))?;
        on_commit(&transaction);

        Ok((jar, transaction))
    }

    /// Apply an aggregate-only change (no transaction record).
    ///
    /// `mutate` reports whether it changed anything; an unchanged jar is
    /// returned as read, without a write or a revision bump.
    pub async fn atomic_update<F>(&self, jar_id: &str, mutate: F) -> Result<Jar>
    where
        F: FnOnce(&mut Jar) -> Result<bool>,
    {
        let _guard = self.lock_existing(jar_id).await?;

        let mut jar = self.get_jar(jar_id)?;
        let read_revision = jar.revision;
        if !mutate(&mut jar)? {
            return Ok(jar);
        }

        jar.revision = read_revision + 1;
        self.storage.commit(read_revision, &jar, None)?;

        Ok(jar)
    }

    /// Lock a jar that is known to exist. Unknown ids never reach the lock
    /// registry; jars are never deleted, so the registry stays bounded by
    /// the number of jars.
    async fn lock_existing(&self, jar_id: &str) -> Result<JarGuard> {
        if self.storage.get_jar(jar_id)?.is_none() {
            return Err(Error::NotFound(format!("jar {}", jar_id)));
        }
        self.locks.acquire(jar_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swearjar_ledger::{TransactionAction, TransactionDetails};
    use tempfile::{tempdir, TempDir};

    fn ledger() -> (TempDir, LedgerStore) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        (dir, LedgerStore::new(storage, Duration::from_secs(1)))
    }

    fn draft(name: &str, amount: f64) -> TransactionDraft {
        TransactionDraft {
            actor_id: "owner".into(),
            action: TransactionAction::AmountAdded,
            details: TransactionDetails {
                member_name: name.into(),
                amount,
            },
        }
    }

    #[test]
    fn create_and_get() {
        let (_dir, ledger) = ledger();
        let jar = ledger.create_jar("  Office  ", "owner").unwrap();

        assert_eq!(jar.name, "Office");
        assert_eq!(ledger.get_jar(&jar.id).unwrap(), jar);
        assert_eq!(ledger.list_jars().unwrap(), vec![jar]);
    }

    #[test]
    fn create_requires_name() {
        let (_dir, ledger) = ledger();
        assert!(matches!(ledger.create_jar("", "owner"), Err(Error::Validation(_))));
        assert!(ledger.list_jars().unwrap().is_empty());
    }

    #[test]
    fn missing_jar_is_not_found() {
        let (_dir, ledger) = ledger();
        assert!(matches!(ledger.get_jar("nope"), Err(Error::NotFound(_))));
        assert!(matches!(ledger.list_transactions("nope"), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn atomic_apply_commits_both() {
        let (_dir, ledger) = ledger();
        let jar = ledger.create_jar("Office", "owner").unwrap();

        let (updated, txn) = ledger
            .atomic_apply(
                &jar.id,
                |jar| {
                    jar.apply_member_delta("Alice", 4.0)?;
                    Ok(draft("Alice", 4.0))
                },
                |_| {},
            )
            .await
            .unwrap();

        assert_eq!(updated.revision, 1);
        assert_eq!(txn.revision, 1);
        assert_eq!(ledger.get_jar(&jar.id).unwrap(), updated);
        assert_eq!(ledger.list_transactions(&jar.id).unwrap(), vec![txn]);
    }

    #[tokio::test]
    async fn failed_mutation_writes_nothing() {
        let (_dir, ledger) = ledger();
        let jar = ledger.create_jar("Office", "owner").unwrap();

        let err = ledger
            .atomic_apply(
                &jar.id,
                |jar| {
                    jar.apply_member_delta("Alice", 4.0)?;
                    Err(Error::Forbidden("changed my mind".into()))
                },
                |_| panic!("nothing was committed"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(ledger.get_jar(&jar.id).unwrap(), jar);
        assert!(ledger.list_transactions(&jar.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn atomic_apply_on_missing_jar() {
        let (_dir, ledger) = ledger();
        let err = ledger
            .atomic_apply("nope", |_| Ok(draft("Alice", 1.0)), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_jars_leave_no_locks_behind() {
        let (_dir, ledger) = ledger();

        for i in 0..1000 {
            let id = format!("missing-{i}");
            let err = ledger
                .atomic_apply(&id, |_| Ok(draft("Alice", 1.0)), |_| {})
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotFound(_)));
            let err = ledger.atomic_update(&id, |_| Ok(true)).await.unwrap_err();
            assert!(matches!(err, Error::NotFound(_)));
        }
        assert!(ledger.locks.is_empty());

        let jar = ledger.create_jar("Office", "owner").unwrap();
        ledger.atomic_update(&jar.id, |_| Ok(true)).await.unwrap();
        assert_eq!(ledger.locks.len(), 1);
    }

    #[tokio::test]
    async fn commit_hook_sees_the_sealed_transaction() {
        let (_dir, ledger) = ledger();
        let jar = ledger.create_jar("Office", "owner").unwrap();

        let mut seen = Vec::new();
        let (_, txn) = ledger
            .atomic_apply(
                &jar.id,
                |jar| {
                    jar.apply_member_delta("Alice", 2.0)?;
                    Ok(draft("Alice", 2.0))
                },
                |txn| seen.push(txn.clone()),
            )
            .await
            .unwrap();

        assert_eq!(seen, vec![txn]);
    }

    #[tokio::test]
    async fn atomic_update_skips_log() {
        let (_dir, ledger) = ledger();
        let jar = ledger.create_jar("Office", "owner").unwrap();

        let updated = ledger
            .atomic_update(&jar.id, |jar| {
                jar.grant_edit("u2");
                Ok(true)
            })
            .await
            .unwrap();

        assert_eq!(updated.revision, 1);
        assert!(updated.permission("u2").is_some());
        assert!(ledger.list_transactions(&jar.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unchanged_update_writes_nothing() {
        let (_dir, ledger) = ledger();
        let jar = ledger.create_jar("Office", "owner").unwrap();

        let same = ledger.atomic_update(&jar.id, |_| Ok(false)).await.unwrap();

        assert_eq!(same, jar);
        assert_eq!(ledger.get_jar(&jar.id).unwrap().revision, 0);
    }
}

//! Persistent storage using RocksDB.
//!
//! Key layout:
//!
//! - `jar:{jar_id}` - jar aggregate
//! - `txn:{jar_id}:{revision:020}` - transaction log, sorted by revision
//! - `session:{token}` - access sessions
//! - `refresh:{token}` - refresh grants

use crate::error::{Error, Result};
use crate::sessions::{RefreshGrant, Session};
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use std::path::Path;
use swearjar_ledger::{Jar, Transaction};

/// Storage backend for ledger data.
pub struct Storage {
    db: DB,
}

fn jar_key(id: &str) -> String {
    format!("jar:{}", id)
}

fn txn_prefix(jar_id: &str) -> String {
    format!("txn:{}:", jar_id)
}

fn txn_key(jar_id: &str, revision: u64) -> String {
    format!("txn:{}:{:020}", jar_id, revision)
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let prefix = prefix.as_bytes();
        let mut items = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                items.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }

        Ok(items)
    }

    // --- Jars ---

    /// Store a brand new jar. Fails if the id is already taken.
    pub fn insert_jar(&self, jar: &Jar) -> Result<()> {
        let key = jar_key(&jar.id);
        if self.db.get(key.as_bytes())?.is_some() {
            return Err(Error::Conflict(format!("jar {} already exists", jar.id)));
        }
        self.db.put(key.as_bytes(), serde_json::to_vec(jar)?)?;
        Ok(())
    }

    /// Get a jar by ID.
    pub fn get_jar(&self, id: &str) -> Result<Option<Jar>> {
        self.get_json(&jar_key(id))
    }

    /// List all jars, oldest first.
    pub fn list_jars(&self) -> Result<Vec<Jar>> {
        let mut jars: Vec<Jar> = self.scan_prefix("jar:")?;
        jars.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jars)
    }

    /// Write an updated jar, and optionally its transaction, in one batch.
    ///
    /// The stored revision must still equal `expected_revision`. The caller
    /// holds the jar's lock, so the check and the write cannot interleave
    /// with another writer of the same jar.
    pub fn commit(
        &self,
        expected_revision: u64,
        jar: &Jar,
        transaction: Option<&Transaction>,
    ) -> Result<()> {
        let stored = self
            .get_jar(&jar.id)?
            .ok_or_else(|| Error::NotFound(format!("jar {}", jar.id)))?;
        if stored.revision != expected_revision {
            return Err(Error::Conflict(format!(
                "jar {} moved from revision {} to {}",
                jar.id, expected_revision, stored.revision
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put(jar_key(&jar.id).as_bytes(), serde_json::to_vec(jar)?);
        if let Some(txn) = transaction {
            batch.put(
                txn_key(&txn.jar_id, txn.revision).as_bytes(),
                serde_json::to_vec(txn)?,
            );
        }
        self.db.write(batch)?;
        Ok(())
    }

    // --- Transactions ---

    /// All transactions of a jar in commit order.
    pub fn list_transactions(&self, jar_id: &str) -> Result<Vec<Transaction>> {
        self.scan_prefix(&txn_prefix(jar_id))
    }

    // --- Sessions ---

    /// Store an access session.
    pub fn put_session(&self, session: &Session) -> Result<()> {
        let key = format!("session:{}", session.token);
        self.db.put(key.as_bytes(), serde_json::to_vec(session)?)?;
        Ok(())
    }

    /// Get an access session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        self.get_json(&format!("session:{}", token))
    }

    /// Delete an access session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let key = format!("session:{}", token);
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    /// Store a refresh grant.
    pub fn put_refresh(&self, grant: &RefreshGrant) -> Result<()> {
        let key = format!("refresh:{}", grant.token);
        self.db.put(key.as_bytes(), serde_json::to_vec(grant)?)?;
        Ok(())
    }

    /// Remove and return a refresh grant.
    pub fn take_refresh(&self, token: &str) -> Result<Option<RefreshGrant>> {
        let key = format!("refresh:{}", token);
        let grant = self.get_json(&key)?;
        if grant.is_some() {
            self.db.delete(key.as_bytes())?;
        }
        Ok(grant)
    }

    /// All stored access sessions.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        self.scan_prefix("session:")
    }

    /// All stored refresh grants.
    pub fn list_refresh_grants(&self) -> Result<Vec<RefreshGrant>> {
        self.scan_prefix("refresh:")
    }

    /// Delete a refresh grant.
    pub fn delete_refresh(&self, token: &str) -> Result<()> {
        let key = format!("refresh:{}", token);
        self.db.delete(key.as_bytes())?;
        Ok(())
    }
}

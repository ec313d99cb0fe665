//! Per-jar lock registry.
//!
//! One async mutex per jar id. Writers of the same jar queue on it for the
//! whole read-compute-write sequence; writers of different jars never touch
//! each other's mutex. Acquisition is bounded so a stuck writer turns into a
//! retryable conflict rather than an unbounded wait.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the duration of one unit of work on a jar.
pub type JarGuard = OwnedMutexGuard<()>;

/// Registry of jar locks.
pub struct JarLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl JarLocks {
    /// Create a registry whose acquisitions give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Acquire the lock of `jar_id`, or fail with [`Error::Conflict`].
    pub async fn acquire(&self, jar_id: &str) -> Result<JarGuard> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(jar_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(jar_id, timeout = ?self.timeout, "Jar lock acquisition timed out");
                Err(Error::Conflict(format!(
                    "jar {} is busy, lock not acquired within {:?}",
                    jar_id, self.timeout
                )))
            }
        }
    }

    /// Number of jars that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no jar has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn busy_jar_times_out_as_conflict() {
        let locks = JarLocks::new(Duration::from_millis(20));
        let _held = locks.acquire("a").await.unwrap();

        let err = locks.acquire("a").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn other_jars_are_not_blocked() {
        let locks = JarLocks::new(Duration::from_millis(20));
        let _held = locks.acquire("a").await.unwrap();

        assert!(locks.acquire("b").await.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_lock_can_be_reacquired() {
        let locks = JarLocks::new(Duration::from_millis(20));
        drop(locks.acquire("a").await.unwrap());
        assert!(locks.acquire("a").await.is_ok());
    }
}

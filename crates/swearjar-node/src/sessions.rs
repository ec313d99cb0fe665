//! Session store - resolves bearer tokens to caller identities.
//!
//! Access sessions and refresh grants are durable storage entries with an
//! explicit expiry. Refresh grants are single use: exchanging one deletes it
//! together with the access session it was issued alongside.

use crate::error::{Error, Result};
use crate::storage::Storage;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use swearjar_ledger::id::now_millis;

/// A stored access session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    /// Expiry (ms since Unix epoch)
    pub expires_at: u64,
}

/// A stored refresh grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshGrant {
    pub token: String,
    pub user_id: String,
    /// Access token issued together with this grant
    pub access_token: String,
    /// Expiry (ms since Unix epoch)
    pub expires_at: u64,
}

/// Token pair handed to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub user_id: String,
    pub access_token: String,
    pub access_expires_at: u64,
    pub refresh_token: String,
    pub refresh_expires_at: u64,
}

/// Expiry `ttl` after `now`, clamped instead of overflowing.
fn expiry(now: u64, ttl: Duration) -> u64 {
    now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues, resolves and rotates sessions.
pub struct SessionStore {
    storage: Arc<Storage>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    // Serializes refresh exchanges so a grant is consumed once
    refresh_lock: Mutex<()>,
}

impl SessionStore {
    /// Create a session store over shared storage.
    pub fn new(storage: Arc<Storage>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            storage,
            access_ttl,
            refresh_ttl,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Issue a fresh access session and refresh grant for `user_id`.
    pub fn issue(&self, user_id: &str) -> Result<SessionTokens> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation("user id is required".into()));
        }

        let now = now_millis();
        let session = Session {
            token: new_token(),
            user_id: user_id.to_string(),
            expires_at: expiry(now, self.access_ttl),
        };
        let grant = RefreshGrant {
            token: new_token(),
            user_id: user_id.to_string(),
            access_token: session.token.clone(),
            expires_at: expiry(now, self.refresh_ttl),
        };

        self.storage.put_session(&session)?;
        self.storage.put_refresh(&grant)?;
        tracing::debug!(user_id, "Issued session");

        Ok(SessionTokens {
            user_id: session.user_id,
            access_token: session.token,
            access_expires_at: session.expires_at,
            refresh_token: grant.token,
            refresh_expires_at: grant.expires_at,
        })
    }

    /// Resolve an access token to the caller's user id.
    pub fn resolve(&self, access_token: &str) -> Result<String> {
        let session = self
            .storage
            .get_session(access_token)?
            .ok_or_else(|| Error::Unauthorized("unknown session".into()))?;

        if now_millis() >= session.expires_at {
            self.storage.delete_session(access_token)?;
            return Err(Error::Unauthorized("session expired".into()));
        }

        Ok(session.user_id)
    }

    /// Exchange a refresh token for a new token pair.
    pub fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
        let _exchange = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let grant = self
            .storage
            .take_refresh(refresh_token)?
            .ok_or_else(|| Error::Unauthorized("unknown refresh token".into()))?;
        self.storage.delete_session(&grant.access_token)?;

        if now_millis() >= grant.expires_at {
            return Err(Error::Unauthorized("refresh token expired".into()));
        }

        self.issue(&grant.user_id)
    }

    /// Delete every expired session and refresh grant. Returns how many
    /// entries were removed.
    pub fn prune_expired(&self) -> Result<usize> {
        let now = now_millis();
        let mut removed = 0;

        for session in self.storage.list_sessions()? {
            if now >= session.expires_at {
                self.storage.delete_session(&session.token)?;
                removed += 1;
            }
        }

        let _exchange = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);
        for grant in self.storage.list_refresh_grants()? {
            if now >= grant.expires_at {
                self.storage.delete_refresh(&grant.token)?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Pruned expired sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn store(access_ttl: Duration, refresh_ttl: Duration) -> (TempDir, SessionStore) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        (dir, SessionStore::new(storage, access_ttl, refresh_ttl))
    }

    #[test]
    fn issue_and_resolve() {
        let (_dir, sessions) = store(Duration::from_secs(60), Duration::from_secs(600));
        let tokens = sessions.issue("u1").unwrap();

        assert_eq!(tokens.access_token.len(), 64);
        assert_ne!(tokens.access_token, tokens.refresh_token);
        assert_eq!(sessions.resolve(&tokens.access_token).unwrap(), "u1");
    }

    #[test]
    fn unknown_token_is_unauthorized() {
        let (_dir, sessions) = store(Duration::from_secs(60), Duration::from_secs(600));
        assert!(matches!(sessions.resolve("nope"), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn expired_session_is_rejected() {
        let (_dir, sessions) = store(Duration::ZERO, Duration::from_secs(600));
        let tokens = sessions.issue("u1").unwrap();
        assert!(matches!(
            sessions.resolve(&tokens.access_token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn refresh_rotates_tokens_once() {
        let (_dir, sessions) = store(Duration::from_secs(60), Duration::from_secs(600));
        let first = sessions.issue("u1").unwrap();

        let second = sessions.refresh(&first.refresh_token).unwrap();
        assert_eq!(second.user_id, "u1");
        assert_eq!(sessions.resolve(&second.access_token).unwrap(), "u1");

        // old pair is gone
        assert!(sessions.resolve(&first.access_token).is_err());
        assert!(matches!(
            sessions.refresh(&first.refresh_token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_refresh_is_rejected() {
        let (_dir, sessions) = store(Duration::from_secs(60), Duration::ZERO);
        let tokens = sessions.issue("u1").unwrap();
        assert!(sessions.refresh(&tokens.refresh_token).is_err());
    }

    #[test]
    fn huge_ttl_saturates() {
        let (_dir, sessions) = store(Duration::MAX, Duration::from_secs(u64::MAX));
        let tokens = sessions.issue("u1").unwrap();

        assert_eq!(tokens.access_expires_at, u64::MAX);
        assert_eq!(tokens.refresh_expires_at, u64::MAX);
        assert_eq!(sessions.resolve(&tokens.access_token).unwrap(), "u1");
    }

    #[test]
    fn prune_removes_only_expired_entries() {
        let (dir, expired) = store(Duration::ZERO, Duration::ZERO);
        expired.issue("u1").unwrap();
        expired.issue("u2").unwrap();

        let live = SessionStore::new(
            Arc::clone(&expired.storage),
            Duration::from_secs(60),
            Duration::from_secs(600),
        );
        let kept = live.issue("u3").unwrap();

        assert_eq!(live.prune_expired().unwrap(), 4);
        assert_eq!(live.prune_expired().unwrap(), 0);
        assert_eq!(live.resolve(&kept.access_token).unwrap(), "u3");
        assert_eq!(expired.storage.list_sessions().unwrap().len(), 1);
        assert_eq!(expired.storage.list_refresh_grants().unwrap().len(), 1);
        drop(dir);
    }

    #[test]
    fn blank_user_rejected() {
        let (_dir, sessions) = store(Duration::from_secs(60), Duration::from_secs(600));
        assert!(matches!(sessions.issue(" "), Err(Error::Validation(_))));
    }
}

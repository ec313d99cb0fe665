//! Authorization gate.
//!
//! Pure decisions over a jar snapshot. Callers must evaluate these inside the
//! same unit of work as the mutation they guard, against the snapshot they
//! are about to write.

use crate::error::{Error, Result};
use crate::models::Jar;

/// May `user_id` change balances in `jar`?
pub fn can_edit(jar: &Jar, user_id: &str) -> bool {
    jar.owner_id == user_id
        || jar
            .permissions
            .iter()
            .any(|p| p.user_id == user_id && p.can_edit)
}

/// May `user_id` grant or revoke permissions on `jar`?
pub fn can_manage_permissions(jar: &Jar, user_id: &str) -> bool {
    jar.owner_id == user_id
}

/// [`can_edit`] as a `Result`.
pub fn ensure_can_edit(jar: &Jar, user_id: &str) -> Result<()> {
    if can_edit(jar, user_id) {
        Ok(())
    } else {
        Err(Error::Forbidden {
            user_id: user_id.to_string(),
            jar_id: jar.id.clone(),
            action: "edit",
        })
    }
}

/// [`can_manage_permissions`] as a `Result`.
pub fn ensure_can_manage_permissions(jar: &Jar, user_id: &str) -> Result<()> {
    if can_manage_permissions(jar, user_id) {
        Ok(())
    } else {
        Err(Error::Forbidden {
            user_id: user_id.to_string(),
            jar_id: jar.id.clone(),
            action: "manage permissions of",
        })
    }
}

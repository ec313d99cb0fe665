//! Jar model - a named shared ledger of member balances.

use serde::{Deserialize, Serialize};

use super::transaction::{TransactionAction, TransactionDetails};
use crate::error::{Error, Result};
use crate::id::now_millis;

/// A named balance inside a jar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    /// Unique within the jar, case-sensitive
    pub name: String,

    /// Signed accumulator, no floor
    pub balance: f64,
}

/// Edit grant for a single user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub user_id: String,
    pub can_edit: bool,
}

/// A shared swear jar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Jar {
    /// Opaque unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Creating user, always allowed to edit and manage permissions
    pub owner_id: String,

    /// Members in insertion order
    #[serde(default)]
    pub members: Vec<Member>,

    /// Edit grants, at most one entry per user
    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Commit counter, bumped by one on every stored change
    #[serde(default)]
    pub revision: u64,

    /// Creation time (ms since Unix epoch)
    #[serde(default)]
    pub created_at: u64,
}

impl Jar {
    /// Create an empty jar. The owner is granted edit permission up front.
    pub fn new(id: String, name: String, owner_id: String) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("jar name is required".into()));
        }
        if owner_id.trim().is_empty() {
            return Err(Error::InvalidInput("owner id is required".into()));
        }

        let permissions = vec![Permission {
            user_id: owner_id.clone(),
            can_edit: true,
        }];

        Ok(Self {
            id,
            name,
            owner_id,
            members: Vec::new(),
            permissions,
            revision: 0,
            created_at: now_millis(),
        })
    }

    /// Look up a member by exact name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    fn member_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.name == name)
    }

    /// Current balance of a member, if present.
    pub fn balance_of(&self, name: &str) -> Option<f64> {
        self.member(name).map(|m| m.balance)
    }

    /// Permission entry for a user, if present.
    pub fn permission(&self, user_id: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.user_id == user_id)
    }

    /// Apply a signed delta to a member and classify the change.
    ///
    /// - absent member, `amount >= 0`: member created, [`TransactionAction::NameAdded`]
    /// - present member: balance adjusted, `AmountAdded` or `AmountRemoved` by sign
    /// - absent member, `amount < 0`: [`Error::MemberNotFound`], jar untouched
    ///
    /// The member row is updated in place; it is never removed, even at zero.
    pub fn apply_member_delta(&mut self, member_name: &str, amount: f64) -> Result<TransactionAction> {
        validate_delta(member_name, amount)?;

        if let Some(member) = self.member_mut(member_name) {
            member.balance += amount;
            return Ok(if amount >= 0.0 {
                TransactionAction::AmountAdded
            } else {
                TransactionAction::AmountRemoved
            });
        }

        if amount < 0.0 {
            return Err(Error::MemberNotFound(member_name.to_string()));
        }

        self.members.push(Member {
            name: member_name.to_string(),
            balance: amount,
        });
        Ok(TransactionAction::NameAdded)
    }

    /// Replay an already-committed delta onto a local copy of the jar.
    ///
    /// Used by observers that only receive transactions. Unlike
    /// [`Jar::apply_member_delta`] this never fails: the delta was accepted
    /// by the store, so a missing member is simply created.
    pub fn replay(&mut self, action: TransactionAction, details: &TransactionDetails) {
        match action {
            TransactionAction::NameAdded
            | TransactionAction::AmountAdded
            | TransactionAction::AmountRemoved => match self.member_mut(&details.member_name) {
                Some(member) => member.balance += details.amount,
                None => self.members.push(Member {
                    name: details.member_name.clone(),
                    balance: details.amount,
                }),
            },
            TransactionAction::NameRemoved | TransactionAction::Other => {}
        }
    }

    /// Grant edit rights to a user, inserting or updating their entry.
    pub fn grant_edit(&mut self, user_id: &str) {
        match self.permissions.iter_mut().find(|p| p.user_id == user_id) {
            Some(entry) => entry.can_edit = true,
            None => self.permissions.push(Permission {
                user_id: user_id.to_string(),
                can_edit: true,
            }),
        }
    }

    /// Remove a user's entry. Returns whether one existed.
    pub fn revoke(&mut self, user_id: &str) -> bool {
        let before = self.permissions.len();
        self.permissions.retain(|p| p.user_id != user_id);
        self.permissions.len() != before
    }
}

fn validate_delta(member_name: &str, amount: f64) -> Result<()> {
    if member_name.trim().is_empty() {
        return Err(Error::InvalidInput("member name is required".into()));
    }
    if !amount.is_finite() {
        return Err(Error::InvalidInput(format!("amount must be finite, got {amount}")));
    }
    Ok(())
}

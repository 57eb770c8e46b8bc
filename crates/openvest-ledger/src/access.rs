//! Capability checks for administrative mutations.

use std::collections::{BTreeSet, HashMap};

use openvest_types::{Action, Address, OpenvestError, Result};

/// Answers whether an identity may perform an action.
pub trait Permissions {
    fn has_permission(&self, caller: &Address, action: Action) -> bool;
}

/// Fail with `Unauthorized` unless `caller` holds `action`.
///
/// # Errors
/// `Unauthorized` naming the missing capability.
pub fn require(perms: &impl Permissions, caller: &Address, action: Action) -> Result<()> {
    if perms.has_permission(caller, action) {
        Ok(())
    } else {
        tracing::warn!(caller = %caller, action = %action, "Capability check failed");
        Err(OpenvestError::Unauthorized {
            reason: format!("{caller} lacks {action}"),
        })
    }
}

/// Explicit per-identity capability sets.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    grants: HashMap<Address, BTreeSet<Action>>,
}

impl CapabilityTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table in which `root` holds every action.
    #[must_use]
    pub fn with_root(root: Address) -> Self {
        let mut table = Self::new();
        table.grants.insert(root, Action::ALL.into_iter().collect());
        table
    }

    /// Grant `action` to `who`. Requires [`Action::Grant`].
    ///
    /// # Errors
    /// `Unauthorized` if `caller` may not grant, `InvalidParameter` for the
    /// zero address.
    pub fn grant(&mut self, caller: &Address, who: Address, action: Action) -> Result<()> {
        require(self, caller, Action::Grant)?;
        if who.is_zero() {
            return Err(OpenvestError::InvalidParameter {
                reason: "cannot grant to the zero address".into(),
            });
        }
        self.grants.entry(who).or_default().insert(action);
        tracing::info!(caller = %caller, who = %who, action = %action, "Capability granted");
        Ok(())
    }

    /// Revoke `action` from `who`. Requires [`Action::Grant`].
    ///
    /// # Errors
    /// `Unauthorized` if `caller` may not grant.
    pub fn revoke(&mut self, caller: &Address, who: Address, action: Action) -> Result<()> {
        require(self, caller, Action::Grant)?;
        if let Some(set) = self.grants.get_mut(&who) {
            set.remove(&action);
            if set.is_empty() {
                self.grants.remove(&who);
            }
        }
        tracing::info!(caller = %caller, who = %who, action = %action, "Capability revoked");
        Ok(())
    }

    #[must_use]
    pub fn capabilities_of(&self, who: &Address) -> Vec<Action> {
        self.grants
            .get(who)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Permissions for CapabilityTable {
    fn has_permission(&self, caller: &Address, action: Action) -> bool {
        self.grants
            .get(caller)
            .is_some_and(|set| set.contains(&action))
    }
}

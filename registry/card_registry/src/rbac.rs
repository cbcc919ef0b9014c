//! # Role-Based Access Control
//!
//! Every identity holds a (possibly empty) set of [`Role`]s.
//!
//! | Role            | May                                                    |
//! |-----------------|--------------------------------------------------------|
//! | `Administrator` | pause / unpause, grant and revoke `Issuer` / `Trader`  |
//! | `Issuer`        | mint                                                   |
//! | `Trader`        | trade cards between owners                             |
//!
//! `Administrator` membership is fixed at genesis: the deployer receives
//! `Administrator` and `Issuer`, and neither `grant` nor `revoke` accepts
//! `Administrator` as the role argument.
//!
//! `has_role` never fails; an unknown identity simply holds no roles.
//! `grant` and `revoke` are idempotent and report whether anything changed.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::Address;
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Issuer,
    Trader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Issuer => "issuer",
            Self::Trader => "trader",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAuthority {
    roles: HashMap<Address, BTreeSet<Role>>,
}

impl RoleAuthority {
    /// Authority whose only member is `deployer`, holding `Administrator` and `Issuer`.
    pub fn with_genesis(deployer: Address) -> Self {
        let mut roles = HashMap::new();
        roles.insert(
            deployer,
            BTreeSet::from([Role::Administrator, Role::Issuer]),
        );
        Self { roles }
    }

    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        self.roles
            .get(account)
            .is_some_and(|held| held.contains(&role))
    }

    pub fn roles_of(&self, account: &Address) -> BTreeSet<Role> {
        self.roles.get(account).cloned().unwrap_or_default()
    }

    /// Grant `role` to `account`. Returns `true` if the role was newly added.
    pub fn grant(&mut self, caller: &Address, account: Address, role: Role) -> Result<bool, Error> {
        self.require_admin(caller)?;
        require_assignable(role)?;
        Ok(self.roles.entry(account).or_default().insert(role))
    }

    /// Revoke `role` from `account`. Returns `true` if the role was held.
    pub fn revoke(&mut self, caller: &Address, account: &Address, role: Role) -> Result<bool, Error> {
        self.require_admin(caller)?;
        require_assignable(role)?;
        let Some(held) = self.roles.get_mut(account) else {
            return Ok(false);
        };
        let removed = held.remove(&role);
        if held.is_empty() {
            self.roles.remove(account);
        }
        Ok(removed)
    }

    pub fn require_role(&self, caller: &Address, role: Role) -> Result<(), Error> {
        if self.has_role(caller, role) {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }

    pub fn require_admin(&self, caller: &Address) -> Result<(), Error> {
        self.require_role(caller, Role::Administrator)
    }
}

fn require_assignable(role: Role) -> Result<(), Error> {
    match role {
        Role::Administrator => Err(Error::Unauthorized),
        Role::Issuer | Role::Trader => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn genesis_holds_admin_and_issuer() {
        let auth = RoleAuthority::with_genesis(addr(1));
        assert!(auth.has_role(&addr(1), Role::Administrator));
        assert!(auth.has_role(&addr(1), Role::Issuer));
        assert!(!auth.has_role(&addr(1), Role::Trader));
    }

    #[test]
    fn unknown_identity_has_no_roles() {
        let auth = RoleAuthority::with_genesis(addr(1));
        assert!(!auth.has_role(&addr(7), Role::Issuer));
        assert!(auth.roles_of(&addr(7)).is_empty());
    }

    #[test]
    fn grant_and_revoke_are_idempotent() {
        let mut auth = RoleAuthority::with_genesis(addr(1));
        assert_eq!(auth.grant(&addr(1), addr(2), Role::Trader), Ok(true));
        assert_eq!(auth.grant(&addr(1), addr(2), Role::Trader), Ok(false));
        assert!(auth.has_role(&addr(2), Role::Trader));

        assert_eq!(auth.revoke(&addr(1), &addr(2), Role::Trader), Ok(true));
        assert_eq!(auth.revoke(&addr(1), &addr(2), Role::Trader), Ok(false));
        assert!(!auth.has_role(&addr(2), Role::Trader));
    }

    #[test]
    fn non_admin_cannot_grant_or_revoke() {
        let mut auth = RoleAuthority::with_genesis(addr(1));
        auth.grant(&addr(1), addr(2), Role::Issuer).unwrap();
        assert_eq!(
            auth.grant(&addr(2), addr(3), Role::Trader),
            Err(Error::Unauthorized)
        );
        assert_eq!(
            auth.revoke(&addr(2), &addr(1), Role::Issuer),
            Err(Error::Unauthorized)
        );
        assert!(auth.has_role(&addr(1), Role::Issuer));
    }

    #[test]
    fn administrator_is_fixed_at_genesis() {
        let mut auth = RoleAuthority::with_genesis(addr(1));
        assert_eq!(
            auth.grant(&addr(1), addr(2), Role::Administrator),
            Err(Error::Unauthorized)
        );
        assert_eq!(
            auth.revoke(&addr(1), &addr(1), Role::Administrator),
            Err(Error::Unauthorized)
        );
        assert!(auth.has_role(&addr(1), Role::Administrator));
        assert!(!auth.has_role(&addr(2), Role::Administrator));
    }

    #[test]
    fn roles_of_lists_all_held_roles() {
        let mut auth = RoleAuthority::with_genesis(addr(1));
        auth.grant(&addr(1), addr(2), Role::Issuer).unwrap();
        auth.grant(&addr(1), addr(2), Role::Trader).unwrap();
        assert_eq!(
            auth.roles_of(&addr(2)),
            BTreeSet::from([Role::Issuer, Role::Trader])
        );
    }
}

// SPDX-License-Identifier: Apache-2.0
//! Role sets and the explicit-caller access-control table.

use std::collections::BTreeMap;

use prism_types::Addr;

/// The four capabilities of the governance model.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Role {
    /// Role grant/revoke and pause.
    Admin,
    /// May commit manifest roots.
    Commit,
    /// May apply routes and trigger activation.
    Apply,
    /// Guardian: pause, freeze, and role takeover.
    Emergency,
}

impl Role {
    fn bit(self) -> u8 {
        match self {
            Self::Admin => 1,
            Self::Commit => 2,
            Self::Apply => 4,
            Self::Emergency => 8,
        }
    }
}

/// Compact set of [`Role`]s held by one address.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct RoleSet(u8);

impl RoleSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Set containing exactly `role`.
    #[must_use]
    pub fn just(role: Role) -> Self {
        Self(role.bit())
    }

    /// Returns `true` if `role` is in the set.
    #[must_use]
    pub fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    /// Union with `role`.
    #[must_use]
    pub fn with(self, role: Role) -> Self {
        Self(self.0 | role.bit())
    }

    /// Set minus `role`.
    #[must_use]
    pub fn without(self, role: Role) -> Self {
        Self(self.0 & !role.bit())
    }

    /// Returns `true` if no roles are held.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Authorization failures.
///
/// These are checked before any other validation in every mutating
/// operation, per the error-handling policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Caller does not hold the required role.
    #[error("[MISSING_ROLE] {caller} lacks {role:?}")]
    MissingRole {
        /// The rejected caller.
        caller: Addr,
        /// The role the operation required.
        role: Role,
    },
    /// Caller may not administer roles (needs Admin or Emergency).
    #[error("[NOT_ROLE_ADMIN] {caller} may not grant or revoke roles")]
    NotRoleAdmin {
        /// The rejected caller.
        caller: Addr,
    },
    /// The zero address can never hold roles.
    #[error("[ZERO_ADDR_ROLE] the zero address cannot hold roles")]
    ZeroAddress,
}

/// A role grant or revocation, recorded for audit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RoleEvent {
    /// `by` granted `role` to `who`.
    Granted {
        /// Receiving address.
        who: Addr,
        /// Role granted.
        role: Role,
        /// Granting caller.
        by: Addr,
    },
    /// `by` revoked `role` from `who`.
    Revoked {
        /// Losing address.
        who: Addr,
        /// Role revoked.
        role: Role,
        /// Revoking caller.
        by: Addr,
    },
}

/// Address → role-set table with explicit-caller mutation.
///
/// Admin holders administer roles; Emergency holders may too (the guardian
/// takeover path: a guardian can seat a new Admin without the old one's
/// cooperation). Governance rotation is a usage pattern on top: grant the
/// new holder Admin+Emergency, then the *new* holder revokes the old one —
/// the table is never role-less mid-rotation and both ends of the handoff
/// appear in the event log.
#[derive(Default)]
pub struct AccessControl {
    table: BTreeMap<Addr, RoleSet>,
    events: Vec<RoleEvent>,
}

impl AccessControl {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bootstrap table with `root` holding all four roles.
    ///
    /// Used at construction time only; afterwards all changes go through
    /// `grant`/`revoke`.
    pub fn with_root(root: Addr) -> Self {
        let mut table = BTreeMap::new();
        table.insert(
            root,
            RoleSet::just(Role::Admin)
                .with(Role::Commit)
                .with(Role::Apply)
                .with(Role::Emergency),
        );
        Self {
            table,
            events: Vec::new(),
        }
    }

    /// Roles currently held by `who`.
    pub fn roles_of(&self, who: Addr) -> RoleSet {
        self.table.get(&who).copied().unwrap_or(RoleSet::EMPTY)
    }

    /// Returns `true` if `who` holds `role`.
    pub fn has_role(&self, who: Addr, role: Role) -> bool {
        self.roles_of(who).contains(role)
    }

    /// Require `who` to hold `role`.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingRole`] otherwise.
    pub fn require(&self, who: Addr, role: Role) -> Result<(), AuthError> {
        if self.has_role(who, role) {
            Ok(())
        } else {
            Err(AuthError::MissingRole { caller: who, role })
        }
    }

    /// Require `who` to hold at least one of `roles`.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingRole`] (for the first listed role) if none held.
    pub fn require_any(&self, who: Addr, roles: &[Role]) -> Result<(), AuthError> {
        if roles.iter().any(|r| self.has_role(who, *r)) {
            Ok(())
        } else {
            Err(AuthError::MissingRole {
                caller: who,
                role: roles[0],
            })
        }
    }

    fn require_role_admin(&self, caller: Addr) -> Result<(), AuthError> {
        let held = self.roles_of(caller);
        if held.contains(Role::Admin) || held.contains(Role::Emergency) {
            Ok(())
        } else {
            Err(AuthError::NotRoleAdmin { caller })
        }
    }

    /// Grant `role` to `who`. Caller must hold Admin or Emergency.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotRoleAdmin`], [`AuthError::ZeroAddress`].
    pub fn grant(&mut self, caller: Addr, who: Addr, role: Role) -> Result<(), AuthError> {
        self.require_role_admin(caller)?;
        if who.is_zero() {
            return Err(AuthError::ZeroAddress);
        }
        let updated = self.roles_of(who).with(role);
        self.table.insert(who, updated);
        self.events.push(RoleEvent::Granted {
            who,
            role,
            by: caller,
        });
        Ok(())
    }

    /// Revoke `role` from `who`. Caller must hold Admin or Emergency.
    ///
    /// Revoking a role that is not held is a no-op that still records the
    /// event (auditable intent).
    ///
    /// # Errors
    ///
    /// [`AuthError::NotRoleAdmin`].
    pub fn revoke(&mut self, caller: Addr, who: Addr, role: Role) -> Result<(), AuthError> {
        self.require_role_admin(caller)?;
        let updated = self.roles_of(who).without(role);
        if updated.is_empty() {
            self.table.remove(&who);
        } else {
            self.table.insert(who, updated);
        }
        self.events.push(RoleEvent::Revoked {
            who,
            role,
            by: caller,
        });
        Ok(())
    }

    /// Audit log of all grants and revocations, in order.
    pub fn events(&self) -> &[RoleEvent] {
        &self.events
    }

    /// Addresses currently holding any role, in address order.
    pub fn holders(&self) -> impl Iterator<Item = (Addr, RoleSet)> + '_ {
        self.table.iter().map(|(addr, set)| (*addr, *set))
    }
}

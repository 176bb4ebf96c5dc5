//! Central access policy for tenant-scoped operations.
//!
//! Every administrative operation in the system funnels through the three
//! functions here: [`authorize`] for single-record mutations and reads,
//! [`scope_filter`] for list queries, and [`require_role`] for route guards.
//! The policy is pure and stateless; the caller supplies the [`Actor`]
//! resolved from the request's own credentials, never from client input.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Staff roles, in descending order of privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    FirmAdmin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::FirmAdmin => "firm_admin",
            Role::Employee => "employee",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "super_admin" => Some(Role::SuperAdmin),
            "firm_admin" => Some(Role::FirmAdmin),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated identity with its tenant affiliation.
///
/// `firm_id` is `None` for super admins (cross-tenant) and for misconfigured
/// firm admins, which the policy treats as deny-everything rather than
/// allow-everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub firm_id: Option<Uuid>,
}

impl Actor {
    pub fn new(id: Uuid, email: impl Into<String>, role: Role, firm_id: Option<Uuid>) -> Self {
        Self { id, email: email.into(), role, firm_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::List => "list",
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InsufficientRole,
    TenantMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Scope predicate that list queries must AND into their filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Super admin: no implicit constraint; an explicit firm narrowing may
    /// still be supplied by the caller.
    Unrestricted,
    /// Firm admin: rows of this firm only, regardless of caller filters.
    Firm(Uuid),
    /// Employees and firm admins without a firm: no rows at all.
    DenyAll,
}

/// Decide one operation against one target tenant.
///
/// `target_firm` is the firm owning the target resource; `None` means the
/// resource has no tenant affiliation, which only a super admin may touch.
pub fn authorize(actor: &Actor, operation: Operation, target_firm: Option<Uuid>) -> Decision {
    let decision = match actor.role {
        Role::SuperAdmin => Decision::Allow,
        Role::FirmAdmin => match (actor.firm_id, target_firm) {
            (Some(own), Some(target)) if own == target => Decision::Allow,
            // Misconfigured admin (no firm) or foreign/unowned target
            _ => Decision::Deny(DenyReason::TenantMismatch),
        },
        Role::Employee => Decision::Deny(DenyReason::InsufficientRole),
    };

    if let Decision::Deny(reason) = decision {
        tracing::debug!(
            actor = %actor.id,
            role = %actor.role,
            %operation,
            ?target_firm,
            ?reason,
            "operation denied"
        );
    }
    decision
}

/// The tenant constraint for list/search operations by this actor.
pub fn scope_filter(actor: &Actor) -> ScopeFilter {
    match actor.role {
        Role::SuperAdmin => ScopeFilter::Unrestricted,
        Role::FirmAdmin => match actor.firm_id {
            Some(firm) => ScopeFilter::Firm(firm),
            None => ScopeFilter::DenyAll,
        },
        Role::Employee => ScopeFilter::DenyAll,
    }
}

/// Route guard: is the actor's role one of `allowed`?
pub fn require_role(actor: &Actor, allowed: &[Role]) -> Decision {
    if allowed.contains(&actor.role) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn super_admin() -> Actor {
        Actor::new(Uuid::new_v4(), "root@safework.example", Role::SuperAdmin, None)
    }

    fn firm_admin(firm: Option<Uuid>) -> Actor {
        Actor::new(Uuid::new_v4(), "admin@acme.example", Role::FirmAdmin, firm)
    }

    #[test]
    fn super_admin_is_unrestricted() {
        let actor = super_admin();
        for op in [Operation::List, Operation::Read, Operation::Create, Operation::Update, Operation::Delete] {
            assert_eq!(authorize(&actor, op, Some(Uuid::new_v4())), Decision::Allow);
            assert_eq!(authorize(&actor, op, None), Decision::Allow);
        }
        assert_eq!(scope_filter(&actor), ScopeFilter::Unrestricted);
    }

    #[test]
    fn firm_admin_matches_own_firm_only() {
        let firm = Uuid::new_v4();
        let actor = firm_admin(Some(firm));
        assert_eq!(authorize(&actor, Operation::Update, Some(firm)), Decision::Allow);
        assert_eq!(
            authorize(&actor, Operation::Update, Some(Uuid::new_v4())),
            Decision::Deny(DenyReason::TenantMismatch)
        );
        assert_eq!(
            authorize(&actor, Operation::Read, None),
            Decision::Deny(DenyReason::TenantMismatch)
        );
        assert_eq!(scope_filter(&actor), ScopeFilter::Firm(firm));
    }

    #[test]
    fn firm_admin_without_firm_is_denied_everything() {
        let actor = firm_admin(None);
        assert_eq!(
            authorize(&actor, Operation::List, Some(Uuid::new_v4())),
            Decision::Deny(DenyReason::TenantMismatch)
        );
        assert_eq!(scope_filter(&actor), ScopeFilter::DenyAll);
    }

    #[test]
    fn employees_have_no_admin_access() {
        let firm = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), "worker@acme.example", Role::Employee, Some(firm));
        assert_eq!(
            authorize(&actor, Operation::Read, Some(firm)),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        assert_eq!(scope_filter(&actor), ScopeFilter::DenyAll);
    }

    #[test]
    fn require_role_guards() {
        let actor = firm_admin(Some(Uuid::new_v4()));
        assert!(require_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin]).is_allow());
        assert_eq!(
            require_role(&actor, &[Role::SuperAdmin]),
            Decision::Deny(DenyReason::InsufficientRole)
        );
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::SuperAdmin, Role::FirmAdmin, Role::Employee] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }
}

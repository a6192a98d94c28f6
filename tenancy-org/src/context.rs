//! Request-scoped identity and tenant context
//!
//! This module provides the typed values that travel with an inbound request:
//! the authenticated caller placed there by the authentication layer, and the
//! tenant context attached once the caller's membership has been resolved.
//! Both are looked up by type rather than by string key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::membership::Membership;
use crate::roles::Role;

/// Identity established by the authentication layer.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use tenancy_org::AuthenticatedUser;
///
/// let user_id = Uuid::now_v7();
/// let caller = AuthenticatedUser(user_id);
/// assert_eq!(caller.user_id(), user_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthenticatedUser(pub Uuid);

impl AuthenticatedUser {
    /// The authenticated user's ID.
    pub fn user_id(&self) -> Uuid {
        self.0
    }
}

/// The caller's active tenant for the current request.
///
/// Built from the membership that connects the authenticated user to the
/// selected organization. Downstream handlers read the active organization,
/// role and membership from here instead of re-querying storage.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use tenancy_org::{Membership, Role, TenantContext};
///
/// let membership = Membership::new(Uuid::now_v7(), Uuid::now_v7(), Role::Admin);
/// let ctx = TenantContext::from_membership(&membership);
/// assert_eq!(ctx.organization_id, membership.organization_id);
/// assert_eq!(ctx.membership_id, membership.id);
/// assert_eq!(ctx.role, Role::Admin);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Active organization
    pub organization_id: Uuid,

    /// Role held in the active organization
    pub role: Role,

    /// Membership the role came from
    pub membership_id: Uuid,

    /// When the membership was resolved
    pub resolved_at: DateTime<Utc>,
}

impl TenantContext {
    /// Build the context from a resolved membership.
    pub fn from_membership(membership: &Membership) -> Self {
        Self {
            user_id: membership.user_id,
            organization_id: membership.organization_id,
            role: membership.role,
            membership_id: membership.id,
            resolved_at: Utc::now(),
        }
    }

    /// Check if the active role is at least `role`.
    pub fn has_role_at_least(&self, role: Role) -> bool {
        self.role.is_at_least(role)
    }
}

//! Membership domain models
//!
//! This module provides the membership entity that links users to organizations.
//! A membership is the only place a role lives: a user has no role outside an
//! organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::Role;

/// Organization membership linking a user to an organization.
///
/// At most one membership exists per `(user_id, organization_id)` pair; the
/// membership store enforces this.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use tenancy_org::{Membership, Role};
///
/// let org_id = Uuid::now_v7();
/// let user_id = Uuid::now_v7();
/// let membership = Membership::new(user_id, org_id, Role::Editor);
/// assert_eq!(membership.role, Role::Editor);
/// assert!(membership.invited_by.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Unique membership ID
    pub id: Uuid,

    /// Organization ID
    pub organization_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the organization
    pub role: Role,

    /// When the user joined
    pub joined_at: DateTime<Utc>,

    /// Who invited this user (if the membership came from an invite)
    #[serde(default)]
    pub invited_by: Option<Uuid>,
}

impl Membership {
    /// Creates a new organization membership.
    ///
    /// The membership is created with:
    /// - A newly generated UUID v7 ID
    /// - Current timestamp for joined_at
    ///
    /// # Arguments
    ///
    /// * `user_id` - The user ID
    /// * `organization_id` - The organization ID
    /// * `role` - The user's role in the organization
    pub fn new(user_id: Uuid, organization_id: Uuid, role: Role) -> Self {
        Self {
            id: Uuid::now_v7(),
            organization_id,
            user_id,
            role,
            joined_at: Utc::now(),
            invited_by: None,
        }
    }

    /// Set who invited this user.
    pub fn with_inviter(mut self, inviter_id: Uuid) -> Self {
        self.invited_by = Some(inviter_id);
        self
    }

    /// Check whether this membership links the given user and organization.
    pub fn connects(&self, user_id: Uuid, organization_id: Uuid) -> bool {
        self.user_id == user_id && self.organization_id == organization_id
    }
}

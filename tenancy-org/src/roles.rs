//! Roles and admission policies
//!
//! This module defines the closed role hierarchy for organization memberships
//! and the named policies the authorization gates evaluate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// User role within an organization.
///
/// Roles are ordered by privilege: Member < Editor < Admin < Owner.
///
/// # Permission Model
///
/// - **Member**: Baseline access to organization resources
/// - **Editor**: Can create and edit content
/// - **Admin**: Can list and manage members
/// - **Owner**: Granted only when an organization is created
///
/// # Examples
///
/// ```
/// use tenancy_org::Role;
///
/// assert!(Role::Owner > Role::Admin);
/// assert!(Role::Admin.is_at_least(Role::Editor));
/// assert_eq!(Role::parse("EDITOR"), Some(Role::Editor));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Baseline access
    Member = 1,

    /// Can create and edit content
    Editor = 2,

    /// Can manage members
    Admin = 3,

    /// Full organization control
    Owner = 4,
}

impl Role {
    /// Check if this role is at least as privileged as `other`.
    pub fn is_at_least(&self, other: Role) -> bool {
        *self >= other
    }

    /// Parse role from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive, surrounding whitespace ignored)
    ///
    /// # Returns
    ///
    /// `Some(Role)` if valid, `None` otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use tenancy_org::Role;
    ///
    /// assert_eq!(Role::parse("admin"), Some(Role::Admin));
    /// assert_eq!(Role::parse(" Owner "), Some(Role::Owner));
    /// assert_eq!(Role::parse("superuser"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "member" => Some(Self::Member),
            "editor" => Some(Self::Editor),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Get string representation of the role.
    ///
    /// # Returns
    ///
    /// Lowercase string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Editor => "editor",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Member => "Member",
            Self::Editor => "Editor",
            Self::Admin => "Admin",
            Self::Owner => "Owner",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Member
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule deciding which roles pass an authorization gate.
///
/// # Examples
///
/// ```
/// use tenancy_org::{AdmissionPolicy, Role};
///
/// let exact = AdmissionPolicy::Exactly(Role::Admin);
/// assert!(exact.admits(Role::Admin));
/// assert!(!exact.admits(Role::Owner));
///
/// let at_least = AdmissionPolicy::AtLeast(Role::Admin);
/// assert!(at_least.admits(Role::Owner));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "role", rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Only this exact role is admitted
    Exactly(Role),

    /// This role and every more privileged role are admitted
    AtLeast(Role),
}

impl AdmissionPolicy {
    /// Check whether `role` passes this policy.
    pub fn admits(&self, role: Role) -> bool {
        match self {
            Self::Exactly(required) => role == *required,
            Self::AtLeast(minimum) => role.is_at_least(*minimum),
        }
    }
}

/// Policy gating the member listing of an organization.
///
/// Only an exact `admin` is admitted, so owners are currently refused as
/// well. Whether owners should pass is unresolved; switching to
/// `AtLeast(Role::Admin)` here is the single change needed to admit them.
pub const MEMBER_LISTING_POLICY: AdmissionPolicy = AdmissionPolicy::Exactly(Role::Admin);

/// Policy applied by the per-request tenancy gate. Same caveat as
/// [`MEMBER_LISTING_POLICY`].
pub const TENANT_ADMISSION_POLICY: AdmissionPolicy = AdmissionPolicy::Exactly(Role::Admin);

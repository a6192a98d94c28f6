//! Organization domain models
//!
//! This module provides the Organization entity. Organizations are the tenants:
//! the isolation boundary for members and resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization represents a tenant in the multi-tenant system.
///
/// Users can belong to multiple organizations with different roles.
/// The creating user is recorded as `owner_id` and receives an owner
/// membership at the same time the organization is persisted.
///
/// # Architecture
///
/// ```text
/// Organization
///   ├─ Owner (owner_id, Role::Owner membership)
///   ├─ Members (via Membership)
///   └─ Pending invites
/// ```
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use tenancy_org::Organization;
///
/// let owner_id = Uuid::now_v7();
/// let org = Organization::new(owner_id, "Acme Co");
/// assert_eq!(org.name, "Acme Co");
/// assert!(org.is_owned_by(owner_id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier for the organization
    pub id: Uuid,

    /// Human-readable name
    pub name: String,

    /// Owner user ID (the user who created the org)
    pub owner_id: Uuid,

    /// When the organization was created
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Creates a new organization.
    ///
    /// The organization is created with:
    /// - A newly generated UUID v7 ID
    /// - Current timestamp for created_at
    ///
    /// Name length is not checked here; the service validates it before
    /// calling this constructor.
    ///
    /// # Arguments
    ///
    /// * `owner_id` - The user ID who owns this organization
    /// * `name` - The organization name
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            owner_id,
            created_at: Utc::now(),
        }
    }

    /// Check whether the given user is the recorded owner.
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

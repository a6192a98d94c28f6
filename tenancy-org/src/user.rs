//! User domain model
//!
//! Users are global identities. They carry no tenant and no role; both come
//! from a [`Membership`](crate::Membership).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A global user identity.
///
/// # Examples
///
/// ```
/// use tenancy_org::User;
///
/// let user = User::new("a@x.com", "Alice");
/// assert_eq!(user.email, "a@x.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user
    pub id: Uuid,

    /// Email address (unique across the system)
    pub email: String,

    /// Display name
    pub name: String,

    /// When the user was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with a fresh UUID v7 and the current timestamp.
    ///
    /// No validation happens here; the email is stored as given.
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            email: email.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

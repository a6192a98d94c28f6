//! Invitation domain models
//!
//! An invite is a time-boxed bearer credential: whoever presents its token
//! before `expires_at` may join the organization with the invite's role.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::roles::Role;

/// Lifetime of an invite when no other TTL is configured.
pub const DEFAULT_INVITE_TTL_HOURS: i64 = 24;

/// Delivery and acceptance state of an invite.
///
/// An invite only becomes `Sent` after the notification succeeded, and
/// `Accepted` once a membership has been created from it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    /// Persisted, notification not yet confirmed
    #[default]
    Pending,

    /// Notification delivered to the invitee
    Sent,

    /// Consumed by creating a membership
    Accepted,
}

impl InviteStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
        }
    }
}

/// A pending invitation for someone to join an organization.
///
/// `Debug` output redacts the token.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use tenancy_org::{Invite, InviteStatus, Role};
///
/// let invite = Invite::new(Uuid::now_v7(), Uuid::now_v7(), "b@x.com", Role::Editor, "tok");
/// assert_eq!(invite.status, InviteStatus::Pending);
/// assert!(!invite.is_expired_at(invite.created_at));
/// assert!(invite.is_expired_at(invite.expires_at));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Unique invite ID
    pub id: Uuid,

    /// The organization the invitee is being invited to
    pub organization_id: Uuid,

    /// The user who sent the invite
    pub inviter_id: Uuid,

    /// Email of the person being invited
    pub invitee_email: String,

    /// Role granted on acceptance
    pub role: Role,

    /// Opaque secret carried in the acceptance link
    pub token: String,

    /// When the invite was created
    pub created_at: DateTime<Utc>,

    /// Instant from which the invite no longer verifies
    pub expires_at: DateTime<Utc>,

    /// Delivery and acceptance state
    #[serde(default)]
    pub status: InviteStatus,

    /// When the invite was consumed
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invite {
    /// Creates a new invite expiring [`DEFAULT_INVITE_TTL_HOURS`] after creation.
    ///
    /// # Arguments
    ///
    /// * `organization_id` - Organization being joined
    /// * `inviter_id` - User sending the invite
    /// * `invitee_email` - Recipient address
    /// * `role` - Role the membership will carry
    /// * `token` - Secret token, generated by the caller
    pub fn new(
        organization_id: Uuid,
        inviter_id: Uuid,
        invitee_email: impl Into<String>,
        role: Role,
        token: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            organization_id,
            inviter_id,
            invitee_email: invitee_email.into(),
            role,
            token: token.into(),
            created_at: now,
            expires_at: now + Duration::hours(DEFAULT_INVITE_TTL_HOURS),
            status: InviteStatus::Pending,
            accepted_at: None,
        }
    }

    /// Move the creation instant to `at`, keeping the current lifetime.
    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        let ttl = self.expires_at - self.created_at;
        self.created_at = at;
        self.expires_at = at + ttl;
        self
    }

    /// Recompute `expires_at` as `created_at + ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = self.created_at + ttl;
        self
    }

    /// Check whether the invite has expired at `now`.
    ///
    /// The expiry instant itself counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check whether the invite has already been consumed.
    pub fn is_accepted(&self) -> bool {
        self.status == InviteStatus::Accepted
    }

    /// Record that the notification was delivered.
    pub fn mark_sent(&mut self) {
        self.status = InviteStatus::Sent;
    }

    /// Record that a membership was created from this invite.
    pub fn mark_accepted(&mut self, at: DateTime<Utc>) {
        self.status = InviteStatus::Accepted;
        self.accepted_at = Some(at);
    }
}

impl fmt::Debug for Invite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invite")
            .field("id", &self.id)
            .field("organization_id", &self.organization_id)
            .field("inviter_id", &self.inviter_id)
            .field("invitee_email", &self.invitee_email)
            .field("role", &self.role)
            .field("token", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("status", &self.status)
            .field("accepted_at", &self.accepted_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> Invite {
        Invite::new(Uuid::now_v7(), Uuid::now_v7(), "b@x.com", Role::Editor, "secret-token")
    }

    #[test]
    fn test_invite_expires_after_24_hours() {
        let invite = invite();

        assert_eq!(invite.expires_at - invite.created_at, Duration::hours(24));
        assert_eq!(invite.status, InviteStatus::Pending);
        assert!(invite.accepted_at.is_none());
    }

    #[test]
    fn test_with_ttl() {
        let invite = invite().with_ttl(Duration::minutes(30));
        assert_eq!(invite.expires_at - invite.created_at, Duration::minutes(30));
    }

    #[test]
    fn test_issued_at_keeps_lifetime() {
        let at = Utc::now() - Duration::days(3);
        let invite = invite().with_ttl(Duration::hours(2)).issued_at(at);

        assert_eq!(invite.created_at, at);
        assert_eq!(invite.expires_at, at + Duration::hours(2));
        assert!(invite.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_expiry_boundary() {
        let invite = invite();

        assert!(!invite.is_expired_at(invite.expires_at - Duration::seconds(1)));
        assert!(invite.is_expired_at(invite.expires_at));
        assert!(invite.is_expired_at(invite.expires_at + Duration::hours(1)));
    }

    #[test]
    fn test_status_transitions() {
        let mut invite = invite();

        invite.mark_sent();
        assert_eq!(invite.status, InviteStatus::Sent);
        assert!(!invite.is_accepted());

        let now = Utc::now();
        invite.mark_accepted(now);
        assert!(invite.is_accepted());
        assert_eq!(invite.accepted_at, Some(now));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", invite());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}

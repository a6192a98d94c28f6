//! Persistence and notification ports
//!
//! The service depends only on these traits. Adapters own durable storage and
//! their own concurrency control (unique constraints, row locks), and must
//! honor the [`CallContext`] deadline they are handed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tenancy_org::{Invite, InviteStatus, Membership, Organization, User};
use uuid::Uuid;

use crate::call::CallContext;
use crate::error::{EmailError, StoreResult};

/// Durable storage for organizations.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Persist a new organization.
    async fn create(&self, ctx: &CallContext, organization: &Organization) -> StoreResult<()>;

    /// Fetch by ID, `NotFound` on miss.
    async fn get(&self, ctx: &CallContext, id: Uuid) -> StoreResult<Organization>;

    /// Remove an organization. Used to undo a creation whose owner
    /// membership could not be written; deleting a missing row succeeds.
    async fn delete(&self, ctx: &CallContext, id: Uuid) -> StoreResult<()>;
}

/// Durable storage for users.
///
/// There is deliberately no role lookup here: roles are resolved per
/// organization through [`MembershipStore::find`].
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user, `DuplicateKey` when the email is taken.
    async fn create(&self, ctx: &CallContext, user: &User) -> StoreResult<()>;

    /// Fetch by ID, `NotFound` on miss.
    async fn get(&self, ctx: &CallContext, id: Uuid) -> StoreResult<User>;

    /// Fetch by (normalised) email, `NotFound` on miss.
    async fn find_by_email(&self, ctx: &CallContext, email: &str) -> StoreResult<User>;
}

/// Durable storage for memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Persist a membership, `DuplicateKey` when the user already belongs to
    /// the organization.
    async fn create(&self, ctx: &CallContext, membership: &Membership) -> StoreResult<()>;

    /// All memberships of an organization.
    async fn list_by_organization(
        &self,
        ctx: &CallContext,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Membership>>;

    /// The membership connecting a user and an organization, `NotFound` on miss.
    async fn find(
        &self,
        ctx: &CallContext,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Membership>;
}

/// Durable storage for invitations.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    /// Persist a new invite, `DuplicateKey` on a token collision.
    async fn create(&self, ctx: &CallContext, invite: &Invite) -> StoreResult<()>;

    /// The full invite matching `token`, `NotFound` on miss.
    async fn find_by_token(&self, ctx: &CallContext, token: &str) -> StoreResult<Invite>;

    /// Record a status change.
    async fn update_status(
        &self,
        ctx: &CallContext,
        id: Uuid,
        status: InviteStatus,
        accepted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Remove an invite whose notification failed; deleting a missing row
    /// succeeds.
    async fn delete(&self, ctx: &CallContext, id: Uuid) -> StoreResult<()>;
}

/// Outbound notification port.
///
/// `send_invitation` returns only once delivery was handed off or failed.
#[async_trait]
pub trait Emailer: Send + Sync {
    /// Deliver the invitation to `invite.invitee_email`.
    async fn send_invitation(&self, ctx: &CallContext, invite: &Invite) -> Result<(), EmailError>;
}

#[async_trait]
impl<T: Emailer + ?Sized> Emailer for Arc<T> {
    async fn send_invitation(&self, ctx: &CallContext, invite: &Invite) -> Result<(), EmailError> {
        (**self).send_invitation(ctx, invite).await
    }
}

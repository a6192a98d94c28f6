//! Tenancy service
//!
//! [`TenancyService`] orchestrates every domain operation: it validates
//! input, builds entities, delegates writes to the store ports, sends
//! invitations through the emailer, and enforces the cross-entity invariants:
//!
//! - an organization is never left without its owner membership;
//! - an invite is never left behind when its notification failed;
//! - an expired or consumed invite never verifies;
//! - an accepted invite grants exactly the role it was issued with.
//!
//! The service holds no mutable state of its own, so a single instance can
//! be cloned into every request handler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tenancy_org::{
    Invite, InviteStatus, Membership, Organization, Role, User, MEMBER_LISTING_POLICY,
};
use uuid::Uuid;

use crate::call::CallContext;
use crate::clock::{Clock, SystemClock};
use crate::config::TenancyConfig;
use crate::error::{EmailError, ErrorKind, StoreError, StoreResult, TenancyError, TenancyResult};
use crate::stores::{Emailer, InvitationStore, MembershipStore, OrganizationStore, UserStore};
use crate::token::{fingerprint, generate_token};

/// Proof that an invitation token was verified.
///
/// Only [`TenancyService::verify_invitation`] creates this value. It carries
/// the full invite so acceptance uses the organization and role the invite
/// was issued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInvite {
    invite: Invite,
}

impl VerifiedInvite {
    /// The verified invite.
    pub fn invite(&self) -> &Invite {
        &self.invite
    }

    /// Organization the invite grants access to.
    pub fn organization_id(&self) -> Uuid {
        self.invite.organization_id
    }

    /// Role the membership will carry.
    pub fn role(&self) -> Role {
        self.invite.role
    }

    /// Consume the proof, returning the invite.
    pub fn into_invite(self) -> Invite {
        self.invite
    }
}

/// Orchestrates users, organizations, memberships and invitations.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tenancy_service::memory::{
///     MemoryInvitationStore, MemoryMembershipStore, MemoryOrganizationStore, MemoryUserStore,
///     RecordingEmailer,
/// };
/// use tenancy_service::{CallContext, TenancyService};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tenancy_service::TenancyError> {
/// let service = TenancyService::new(
///     Arc::new(MemoryOrganizationStore::new()),
///     Arc::new(MemoryUserStore::new()),
///     Arc::new(MemoryMembershipStore::new()),
///     Arc::new(MemoryInvitationStore::new()),
///     Arc::new(RecordingEmailer::new()),
/// );
///
/// let ctx = CallContext::background();
/// let owner = service.create_user(&ctx, "a@x.com", "Alice").await?;
/// let org = service.create_organization(&ctx, "Acme Co", owner.id).await?;
/// let membership = service.get_membership(&ctx, owner.id, org.id).await?;
/// assert_eq!(membership.role.as_str(), "owner");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TenancyService {
    organizations: Arc<dyn OrganizationStore>,
    users: Arc<dyn UserStore>,
    memberships: Arc<dyn MembershipStore>,
    invitations: Arc<dyn InvitationStore>,
    emailer: Arc<dyn Emailer>,
    config: Arc<TenancyConfig>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TenancyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenancyService")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Run a store call within the deadline, tagging failures with `operation`.
async fn call<T, F>(ctx: &CallContext, operation: &'static str, fut: F) -> TenancyResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    ctx.run(fut, StoreError::deadline_exceeded)
        .await
        .map_err(TenancyError::store(operation))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl TenancyService {
    /// Create a service over the given ports with default configuration.
    pub fn new(
        organizations: Arc<dyn OrganizationStore>,
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn MembershipStore>,
        invitations: Arc<dyn InvitationStore>,
        emailer: Arc<dyn Emailer>,
    ) -> Self {
        Self {
            organizations,
            users,
            memberships,
            invitations,
            emailer,
            config: Arc::new(TenancyConfig::default()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: TenancyConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Replace the clock used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    fn bounded(&self, ctx: &CallContext) -> CallContext {
        ctx.or_timeout(self.config.call_timeout())
    }

    // Compensation gets its own deadline; the caller's may already be spent.
    fn compensation_context(&self) -> CallContext {
        CallContext::with_timeout(self.config.call_timeout())
    }

    /// Create an organization owned by `owner_id`, together with the owner's
    /// membership.
    ///
    /// # Errors
    ///
    /// - `Validation` if the trimmed name is shorter than the configured minimum
    /// - the store error of either write; if the membership write fails the
    ///   organization is removed again before returning
    pub async fn create_organization(
        &self,
        ctx: &CallContext,
        name: &str,
        owner_id: Uuid,
    ) -> TenancyResult<Organization> {
        let ctx = self.bounded(ctx);
        let name = name.trim();
        if name.chars().count() < self.config.min_org_name_len {
            return Err(TenancyError::Validation(format!(
                "organization name must be at least {} characters",
                self.config.min_org_name_len
            )));
        }

        let organization = Organization::new(owner_id, name);
        call(
            &ctx,
            "create organization",
            self.organizations.create(&ctx, &organization),
        )
        .await?;

        let owner = Membership::new(owner_id, organization.id, Role::Owner);
        if let Err(err) = call(
            &ctx,
            "create owner membership",
            self.memberships.create(&ctx, &owner),
        )
        .await
        {
            tracing::warn!(
                org_id = %organization.id,
                owner_id = %owner_id,
                error = %err,
                "Owner membership write failed, removing organization"
            );
            let cleanup = self.compensation_context();
            if let Err(cleanup_err) = call(
                &cleanup,
                "remove organization",
                self.organizations.delete(&cleanup, organization.id),
            )
            .await
            {
                tracing::error!(
                    org_id = %organization.id,
                    error = %cleanup_err,
                    cause = %err,
                    "Organization left without owner membership"
                );
            }
            return Err(err);
        }

        tracing::info!(
            org_id = %organization.id,
            owner_id = %owner_id,
            membership_id = %owner.id,
            "Organization created"
        );
        Ok(organization)
    }

    /// Register a new user. The email is trimmed and lower-cased.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty email or one without `@`
    /// - `DuplicateKey` when the email is already registered
    pub async fn create_user(
        &self,
        ctx: &CallContext,
        email: &str,
        name: &str,
    ) -> TenancyResult<User> {
        let ctx = self.bounded(ctx);
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(TenancyError::Validation(
                "a valid email address is required".to_string(),
            ));
        }

        let user = User::new(email, name.trim());
        call(&ctx, "create user", self.users.create(&ctx, &user)).await?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Fetch a user by ID.
    pub async fn get_user(&self, ctx: &CallContext, id: Uuid) -> TenancyResult<User> {
        let ctx = self.bounded(ctx);
        call(&ctx, "get user", self.users.get(&ctx, id)).await
    }

    /// Fetch an organization by ID.
    pub async fn get_organization(
        &self,
        ctx: &CallContext,
        id: Uuid,
    ) -> TenancyResult<Organization> {
        let ctx = self.bounded(ctx);
        call(&ctx, "get organization", self.organizations.get(&ctx, id)).await
    }

    /// Look a user up by email, normalised the same way as [`create_user`](Self::create_user).
    pub async fn find_user_by_email(&self, ctx: &CallContext, email: &str) -> TenancyResult<User> {
        let ctx = self.bounded(ctx);
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(TenancyError::Validation("email is required".to_string()));
        }
        call(&ctx, "find user by email", self.users.find_by_email(&ctx, &email)).await
    }

    /// Add `user_id` to `organization_id` with `role`.
    ///
    /// Uniqueness of the pair is enforced by the membership store.
    pub async fn create_membership(
        &self,
        ctx: &CallContext,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> TenancyResult<Membership> {
        let ctx = self.bounded(ctx);
        let membership = Membership::new(user_id, organization_id, role);
        call(
            &ctx,
            "create membership",
            self.memberships.create(&ctx, &membership),
        )
        .await?;

        tracing::info!(
            org_id = %organization_id,
            user_id = %user_id,
            role = %role,
            "Membership created"
        );
        Ok(membership)
    }

    /// List the members of an organization on behalf of `requester_id`.
    ///
    /// The requester must pass [`MEMBER_LISTING_POLICY`]. Non-members are
    /// denied rather than told the organization is missing. Owners are
    /// currently denied as well.
    pub async fn get_members(
        &self,
        ctx: &CallContext,
        requester_id: Uuid,
        organization_id: Uuid,
    ) -> TenancyResult<Vec<Membership>> {
        let ctx = self.bounded(ctx);
        let requester = match call(
            &ctx,
            "resolve requester membership",
            self.memberships.find(&ctx, requester_id, organization_id),
        )
        .await
        {
            Ok(membership) => membership,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(TenancyError::PermissionDenied(format!(
                    "user {} is not a member of organization {}",
                    requester_id, organization_id
                )));
            }
            Err(err) => return Err(err),
        };

        if !MEMBER_LISTING_POLICY.admits(requester.role) {
            tracing::debug!(
                org_id = %organization_id,
                user_id = %requester_id,
                role = %requester.role,
                "Member listing refused"
            );
            return Err(TenancyError::PermissionDenied(format!(
                "role '{}' may not list members",
                requester.role
            )));
        }

        call(
            &ctx,
            "list members",
            self.memberships.list_by_organization(&ctx, organization_id),
        )
        .await
    }

    /// The membership connecting `user_id` and `organization_id`.
    ///
    /// Carries the membership ID and role. `NotFound` when the user does not
    /// belong to the organization.
    pub async fn get_membership(
        &self,
        ctx: &CallContext,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> TenancyResult<Membership> {
        let ctx = self.bounded(ctx);
        call(
            &ctx,
            "get membership",
            self.memberships.find(&ctx, user_id, organization_id),
        )
        .await
    }

    /// Create an invitation and email it to `invitee_email`.
    ///
    /// The invite is persisted first, then sent. If sending fails the invite
    /// is deleted and `Notification` is returned, so no invite ever looks
    /// sent without a delivered email. The returned invite has status `Sent`
    /// unless recording that status failed, in which case it stays `Pending`
    /// (it still verifies).
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty invitee email or an `owner` role; nothing
    ///   is persisted or sent
    /// - the invitation store error, or `Notification`
    pub async fn create_invitation(
        &self,
        ctx: &CallContext,
        organization_id: Uuid,
        inviter_id: Uuid,
        invitee_email: &str,
        role: Role,
    ) -> TenancyResult<Invite> {
        let ctx = self.bounded(ctx);
        let invitee_email = normalize_email(invitee_email);
        if invitee_email.is_empty() {
            return Err(TenancyError::Validation(
                "invitee email is required".to_string(),
            ));
        }
        if role == Role::Owner {
            return Err(TenancyError::Validation(
                "ownership cannot be granted by invitation".to_string(),
            ));
        }

        let mut invite = Invite::new(
            organization_id,
            inviter_id,
            invitee_email,
            role,
            generate_token(),
        )
        .issued_at(self.clock.now())
        .with_ttl(self.config.invite_ttl());
        let token_fingerprint = fingerprint(&invite.token);

        call(&ctx, "create invitation", self.invitations.create(&ctx, &invite)).await?;

        if let Err(source) = ctx
            .run(
                self.emailer.send_invitation(&ctx, &invite),
                EmailError::deadline_exceeded,
            )
            .await
        {
            tracing::warn!(
                invite_id = %invite.id,
                org_id = %organization_id,
                token_fingerprint = %token_fingerprint,
                error = %source,
                "Invitation email failed, withdrawing invite"
            );
            let cleanup = self.compensation_context();
            if let Err(cleanup_err) = call(
                &cleanup,
                "withdraw invitation",
                self.invitations.delete(&cleanup, invite.id),
            )
            .await
            {
                tracing::error!(
                    invite_id = %invite.id,
                    error = %cleanup_err,
                    cause = %source,
                    "Unsent invitation could not be withdrawn"
                );
            }
            return Err(TenancyError::Notification { source });
        }

        match call(
            &ctx,
            "mark invitation sent",
            self.invitations
                .update_status(&ctx, invite.id, InviteStatus::Sent, None),
        )
        .await
        {
            Ok(()) => invite.mark_sent(),
            Err(err) => tracing::warn!(
                invite_id = %invite.id,
                error = %err,
                "Invitation delivered but status not recorded"
            ),
        }

        tracing::info!(
            invite_id = %invite.id,
            org_id = %organization_id,
            inviter_id = %inviter_id,
            role = %role,
            token_fingerprint = %token_fingerprint,
            expires_at = %invite.expires_at,
            "Invitation sent"
        );
        Ok(invite)
    }

    /// Check an invitation token.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty token
    /// - `NotFound` for an unknown token
    /// - `InvitationConsumed` when the invite was already accepted
    /// - `InvitationExpired` at or after `expires_at`
    pub async fn verify_invitation(
        &self,
        ctx: &CallContext,
        token: &str,
    ) -> TenancyResult<VerifiedInvite> {
        let ctx = self.bounded(ctx);
        let token = token.trim();
        if token.is_empty() {
            return Err(TenancyError::Validation("token is required".to_string()));
        }

        let invite = call(
            &ctx,
            "find invitation",
            self.invitations.find_by_token(&ctx, token),
        )
        .await?;

        if invite.is_accepted() {
            return Err(TenancyError::InvitationConsumed);
        }
        if invite.is_expired_at(self.clock.now()) {
            tracing::debug!(
                invite_id = %invite.id,
                token_fingerprint = %fingerprint(token),
                "Expired invitation presented"
            );
            return Err(TenancyError::InvitationExpired {
                expires_at: invite.expires_at,
            });
        }

        Ok(VerifiedInvite { invite })
    }

    /// Add `user_id` to the invite's organization with the invite's role.
    ///
    /// The user's email must match the invitee email. On success the invite
    /// is marked accepted so its token no longer verifies.
    ///
    /// # Errors
    ///
    /// - `InvitationExpired` if the invite expired since verification
    /// - `NotFound` for an unknown user
    /// - `PermissionDenied` when the user is not the invitee
    /// - `DuplicateKey` when the user is already a member
    pub async fn add_member_to_organization(
        &self,
        ctx: &CallContext,
        verified: &VerifiedInvite,
        user_id: Uuid,
    ) -> TenancyResult<Membership> {
        let ctx = self.bounded(ctx);
        let invite = &verified.invite;
        if invite.is_expired_at(self.clock.now()) {
            return Err(TenancyError::InvitationExpired {
                expires_at: invite.expires_at,
            });
        }

        let user = call(&ctx, "get invitee", self.users.get(&ctx, user_id)).await?;
        if !user.email.eq_ignore_ascii_case(&invite.invitee_email) {
            return Err(TenancyError::PermissionDenied(format!(
                "invitation {} was issued to a different email address",
                invite.id
            )));
        }

        let membership = Membership::new(user.id, invite.organization_id, invite.role)
            .with_inviter(invite.inviter_id);
        call(
            &ctx,
            "create membership",
            self.memberships.create(&ctx, &membership),
        )
        .await?;

        let accepted_at = self.clock.now();
        if let Err(err) = call(
            &ctx,
            "mark invitation accepted",
            self.invitations.update_status(
                &ctx,
                invite.id,
                InviteStatus::Accepted,
                Some(accepted_at),
            ),
        )
        .await
        {
            tracing::error!(
                invite_id = %invite.id,
                membership_id = %membership.id,
                error = %err,
                "Membership created but invitation not marked accepted"
            );
        }

        tracing::info!(
            invite_id = %invite.id,
            org_id = %invite.organization_id,
            user_id = %user.id,
            role = %invite.role,
            "Invitation accepted"
        );
        Ok(membership)
    }

    /// Verify `token` and add `user_id` with the invite's role.
    pub async fn accept_invitation(
        &self,
        ctx: &CallContext,
        token: &str,
        user_id: Uuid,
    ) -> TenancyResult<Membership> {
        let verified = self.verify_invitation(ctx, token).await?;
        self.add_member_to_organization(ctx, &verified, user_id).await
    }
}

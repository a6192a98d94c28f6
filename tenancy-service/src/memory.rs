//! In-memory port implementations
//!
//! These adapters are suitable for single-process applications and tests.
//! Each store counts its calls and can be told to fail or stall, so tests can
//! assert on side effects and exercise compensation paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tenancy_org::{Invite, InviteStatus, Membership, Organization, User};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::call::CallContext;
use crate::error::{EmailError, StoreError, StoreResult};
use crate::stores::{Emailer, InvitationStore, MembershipStore, OrganizationStore, UserStore};
use crate::token::token_digest;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Call counter and fault injection shared by the in-memory stores.
#[derive(Debug, Default)]
pub struct FaultInjector {
    calls: AtomicUsize,
    fail_next: Mutex<VecDeque<StoreError>>,
    latency: Mutex<Option<Duration>>,
}

impl FaultInjector {
    /// Number of port calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call (after any already queued failures) fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        lock(&self.fail_next).push_back(error);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    async fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let injected = lock(&self.fail_next).pop_front();
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// In-memory organization store.
#[derive(Debug, Default)]
pub struct MemoryOrganizationStore {
    organizations: RwLock<HashMap<Uuid, Organization>>,
    faults: FaultInjector,
}

impl MemoryOrganizationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call counter and fault injection.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Snapshot of all stored organizations.
    pub async fn all(&self) -> Vec<Organization> {
        self.organizations.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl OrganizationStore for MemoryOrganizationStore {
    async fn create(&self, _ctx: &CallContext, organization: &Organization) -> StoreResult<()> {
        self.faults.enter().await?;

        let mut organizations = self.organizations.write().await;
        if organizations.contains_key(&organization.id) {
            return Err(StoreError::DuplicateKey(format!(
                "organization {}",
                organization.id
            )));
        }
        organizations.insert(organization.id, organization.clone());
        Ok(())
    }

    async fn get(&self, _ctx: &CallContext, id: Uuid) -> StoreResult<Organization> {
        self.faults.enter().await?;

        self.organizations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("organization {}", id)))
    }

    async fn delete(&self, _ctx: &CallContext, id: Uuid) -> StoreResult<()> {
        self.faults.enter().await?;

        self.organizations.write().await.remove(&id);
        Ok(())
    }
}

/// In-memory user store. Emails are unique case-insensitively.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
    faults: FaultInjector,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call counter and fault injection.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Snapshot of all stored users.
    pub async fn all(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, _ctx: &CallContext, user: &User) -> StoreResult<()> {
        self.faults.enter().await?;

        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::DuplicateKey(format!("email {}", user.email)));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::DuplicateKey(format!("user {}", user.id)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, _ctx: &CallContext, id: Uuid) -> StoreResult<User> {
        self.faults.enter().await?;

        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    async fn find_by_email(&self, _ctx: &CallContext, email: &str) -> StoreResult<User> {
        self.faults.enter().await?;

        self.users
            .read()
            .await
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user with email {}", email)))
    }
}

/// In-memory membership store. At most one membership per (user, organization).
#[derive(Debug, Default)]
pub struct MemoryMembershipStore {
    memberships: RwLock<HashMap<Uuid, Membership>>,
    faults: FaultInjector,
}

impl MemoryMembershipStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call counter and fault injection.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Snapshot of all stored memberships.
    pub async fn all(&self) -> Vec<Membership> {
        self.memberships.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn create(&self, _ctx: &CallContext, membership: &Membership) -> StoreResult<()> {
        self.faults.enter().await?;

        let mut memberships = self.memberships.write().await;
        if memberships
            .values()
            .any(|existing| existing.connects(membership.user_id, membership.organization_id))
        {
            return Err(StoreError::DuplicateKey(format!(
                "membership of user {} in organization {}",
                membership.user_id, membership.organization_id
            )));
        }
        memberships.insert(membership.id, membership.clone());
        Ok(())
    }

    async fn list_by_organization(
        &self,
        _ctx: &CallContext,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Membership>> {
        self.faults.enter().await?;

        let mut members: Vec<Membership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    async fn find(
        &self,
        _ctx: &CallContext,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Membership> {
        self.faults.enter().await?;

        self.memberships
            .read()
            .await
            .values()
            .find(|m| m.connects(user_id, organization_id))
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "membership of user {} in organization {}",
                    user_id, organization_id
                ))
            })
    }
}

#[derive(Debug, Default)]
struct InviteTable {
    by_id: HashMap<Uuid, Invite>,
    // token digest -> invite id
    by_token: HashMap<String, Uuid>,
}

/// In-memory invitation store, indexed by token digest.
#[derive(Debug, Default)]
pub struct MemoryInvitationStore {
    table: RwLock<InviteTable>,
    faults: FaultInjector,
}

impl MemoryInvitationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call counter and fault injection.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Snapshot of all stored invites.
    pub async fn all(&self) -> Vec<Invite> {
        self.table.read().await.by_id.values().cloned().collect()
    }
}

#[async_trait]
impl InvitationStore for MemoryInvitationStore {
    async fn create(&self, _ctx: &CallContext, invite: &Invite) -> StoreResult<()> {
        self.faults.enter().await?;

        let digest = token_digest(&invite.token);
        let mut table = self.table.write().await;
        if table.by_token.contains_key(&digest) || table.by_id.contains_key(&invite.id) {
            return Err(StoreError::DuplicateKey(format!("invite {}", invite.id)));
        }
        table.by_token.insert(digest, invite.id);
        table.by_id.insert(invite.id, invite.clone());
        Ok(())
    }

    async fn find_by_token(&self, _ctx: &CallContext, token: &str) -> StoreResult<Invite> {
        self.faults.enter().await?;

        let table = self.table.read().await;
        table
            .by_token
            .get(&token_digest(token))
            .and_then(|id| table.by_id.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("invite for token".to_string()))
    }

    async fn update_status(
        &self,
        _ctx: &CallContext,
        id: Uuid,
        status: InviteStatus,
        accepted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        self.faults.enter().await?;

        let mut table = self.table.write().await;
        let invite = table
            .by_id
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("invite {}", id)))?;
        match status {
            InviteStatus::Accepted => invite.mark_accepted(accepted_at.unwrap_or_else(Utc::now)),
            InviteStatus::Sent => invite.mark_sent(),
            InviteStatus::Pending => {
                invite.status = InviteStatus::Pending;
                invite.accepted_at = None;
            }
        }
        Ok(())
    }

    async fn delete(&self, _ctx: &CallContext, id: Uuid) -> StoreResult<()> {
        self.faults.enter().await?;

        let mut table = self.table.write().await;
        if let Some(invite) = table.by_id.remove(&id) {
            table.by_token.remove(&token_digest(&invite.token));
        }
        Ok(())
    }
}

/// Emailer test double that records every delivered invite.
#[derive(Debug, Default)]
pub struct RecordingEmailer {
    calls: AtomicUsize,
    sent: Mutex<Vec<Invite>>,
    fail_next: Mutex<VecDeque<EmailError>>,
}

impl RecordingEmailer {
    /// Create an emailer that succeeds until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send (after any already queued failures) fail with `error`.
    pub fn fail_next(&self, error: EmailError) {
        lock(&self.fail_next).push_back(error);
    }

    /// Number of send attempts, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invites delivered successfully, in order.
    pub fn sent(&self) -> Vec<Invite> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Emailer for RecordingEmailer {
    async fn send_invitation(&self, _ctx: &CallContext, invite: &Invite) -> Result<(), EmailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let injected = lock(&self.fail_next).pop_front();
        if let Some(error) = injected {
            return Err(error);
        }
        lock(&self.sent).push(invite.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenancy_org::Role;

    fn ctx() -> CallContext {
        CallContext::background()
    }

    #[tokio::test]
    async fn test_user_email_is_unique_case_insensitively() {
        let store = MemoryUserStore::new();
        store.create(&ctx(), &User::new("a@x.com", "A")).await.unwrap();

        let result = store.create(&ctx(), &User::new("A@X.com", "B")).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey(_))));

        let found = store.find_by_email(&ctx(), "a@x.com").await.unwrap();
        assert_eq!(found.name, "A");
        assert_eq!(store.faults().calls(), 3);
    }

    #[tokio::test]
    async fn test_membership_pair_is_unique() {
        let store = MemoryMembershipStore::new();
        let user_id = Uuid::now_v7();
        let org_id = Uuid::now_v7();

        store
            .create(&ctx(), &Membership::new(user_id, org_id, Role::Member))
            .await
            .unwrap();
        let result = store
            .create(&ctx(), &Membership::new(user_id, org_id, Role::Admin))
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateKey(_))));

        let members = store.list_by_organization(&ctx(), org_id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, Role::Member);
    }

    #[tokio::test]
    async fn test_invite_lookup_and_delete() {
        let store = MemoryInvitationStore::new();
        let invite = Invite::new(Uuid::now_v7(), Uuid::now_v7(), "b@x.com", Role::Editor, "tok");
        store.create(&ctx(), &invite).await.unwrap();

        let found = store.find_by_token(&ctx(), "tok").await.unwrap();
        assert_eq!(found.id, invite.id);
        assert!(matches!(
            store.find_by_token(&ctx(), "other").await,
            Err(StoreError::NotFound(_))
        ));

        store.delete(&ctx(), invite.id).await.unwrap();
        assert!(store.find_by_token(&ctx(), "tok").await.is_err());
        assert!(store.delete(&ctx(), invite.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_status() {
        let store = MemoryInvitationStore::new();
        let invite = Invite::new(Uuid::now_v7(), Uuid::now_v7(), "b@x.com", Role::Editor, "tok");
        store.create(&ctx(), &invite).await.unwrap();

        let at = Utc::now();
        store
            .update_status(&ctx(), invite.id, InviteStatus::Accepted, Some(at))
            .await
            .unwrap();

        let found = store.find_by_token(&ctx(), "tok").await.unwrap();
        assert_eq!(found.status, InviteStatus::Accepted);
        assert_eq!(found.accepted_at, Some(at));
    }

    #[tokio::test]
    async fn test_update_status_follows_invite_transitions() {
        let store = MemoryInvitationStore::new();
        let invite = Invite::new(Uuid::now_v7(), Uuid::now_v7(), "b@x.com", Role::Member, "tok");
        store.create(&ctx(), &invite).await.unwrap();

        store
            .update_status(&ctx(), invite.id, InviteStatus::Sent, None)
            .await
            .unwrap();
        let found = store.find_by_token(&ctx(), "tok").await.unwrap();
        assert_eq!(found.status, InviteStatus::Sent);
        assert!(found.accepted_at.is_none());

        store
            .update_status(&ctx(), invite.id, InviteStatus::Accepted, None)
            .await
            .unwrap();
        let found = store.find_by_token(&ctx(), "tok").await.unwrap();
        assert!(found.is_accepted());
        assert!(found.accepted_at.is_some());
    }

    #[tokio::test]
    async fn test_fault_injection_is_consumed_once() {
        let store = MemoryOrganizationStore::new();
        store
            .faults()
            .fail_next(StoreError::Unavailable("db down".into()));

        let org = Organization::new(Uuid::now_v7(), "Acme Co");
        assert!(matches!(
            store.create(&ctx(), &org).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.create(&ctx(), &org).await.is_ok());
        assert_eq!(store.all().await.len(), 1);
    }
}

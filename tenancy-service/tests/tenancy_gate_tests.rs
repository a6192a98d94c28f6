//! End-to-end tests for the per-request tenancy gate.
//!
//! Requests are built with `http::Request`, carrying the identity extension
//! the authentication layer would insert, and run through [`TenancyGate`].

use std::sync::Arc;

use http::{Request, StatusCode};
use tenancy_org::{AdmissionPolicy, AuthenticatedUser, Role, TenantContext};
use tenancy_service::memory::{
    MemoryInvitationStore, MemoryMembershipStore, MemoryOrganizationStore, MemoryUserStore,
    RecordingEmailer,
};
use tenancy_service::{CallContext, StoreError, TenancyGate, TenancyRejection, TenancyService};
use uuid::Uuid;

/// Test fixture with one organization and an admin member.
struct TestFixture {
    /// Membership store, exposed for fault injection.
    memberships: Arc<MemoryMembershipStore>,
    /// Gate under test.
    gate: TenancyGate,
    /// Service behind the gate.
    service: TenancyService,
    /// The organization's owner.
    owner_id: Uuid,
    /// An admin of the organization.
    admin_id: Uuid,
    /// The organization.
    org_id: Uuid,
}

impl TestFixture {
    async fn new() -> Self {
        let memberships = Arc::new(MemoryMembershipStore::new());
        let service = TenancyService::new(
            Arc::new(MemoryOrganizationStore::new()),
            Arc::new(MemoryUserStore::new()),
            memberships.clone(),
            Arc::new(MemoryInvitationStore::new()),
            Arc::new(RecordingEmailer::new()),
        );
        let ctx = CallContext::background();

        let owner = service.create_user(&ctx, "o@x.com", "Owner").await.unwrap();
        let org = service
            .create_organization(&ctx, "Acme Co", owner.id)
            .await
            .unwrap();
        let admin = service.create_user(&ctx, "a@x.com", "Admin").await.unwrap();
        service
            .create_membership(&ctx, admin.id, org.id, Role::Admin)
            .await
            .unwrap();

        Self {
            memberships,
            gate: TenancyGate::new(service.clone()),
            service,
            owner_id: owner.id,
            admin_id: admin.id,
            org_id: org.id,
        }
    }

    async fn admit(
        &self,
        user: Option<Uuid>,
        tenant: Option<String>,
    ) -> Result<Request<()>, TenancyRejection> {
        let mut builder = Request::builder().method("GET").uri("/api/v1/projects");
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-ID", tenant);
        }
        if let Some(user) = user {
            builder = builder.extension(AuthenticatedUser(user));
        }
        let request = builder.body(()).unwrap();

        self.gate.admit(&CallContext::background(), request).await
    }
}

#[tokio::test]
async fn test_admin_gets_tenant_context() {
    let fixture = TestFixture::new().await;

    let request = fixture
        .admit(Some(fixture.admin_id), Some(fixture.org_id.to_string()))
        .await
        .unwrap();

    let tenant = request.extensions().get::<TenantContext>().unwrap();
    assert_eq!(tenant.organization_id, fixture.org_id);
    assert_eq!(tenant.role, Role::Admin);

    let membership = fixture
        .service
        .get_membership(&CallContext::background(), fixture.admin_id, fixture.org_id)
        .await
        .unwrap();
    assert_eq!(tenant.membership_id, membership.id);
}

#[tokio::test]
async fn test_status_mapping() {
    let fixture = TestFixture::new().await;
    let tenant = Some(fixture.org_id.to_string());

    let cases = [
        (None, tenant.clone(), StatusCode::INTERNAL_SERVER_ERROR, "MISSING_IDENTITY"),
        (Some(fixture.admin_id), None, StatusCode::BAD_REQUEST, "MISSING_TENANT"),
        (
            Some(fixture.admin_id),
            Some("not-a-uuid".to_string()),
            StatusCode::BAD_REQUEST,
            "INVALID_TENANT",
        ),
        (Some(Uuid::now_v7()), tenant.clone(), StatusCode::FORBIDDEN, "NOT_A_MEMBER"),
        (Some(fixture.owner_id), tenant, StatusCode::FORBIDDEN, "INSUFFICIENT_ROLE"),
    ];

    for (user, tenant, status, code) in cases {
        let rejection = fixture.admit(user, tenant).await.unwrap_err();
        assert_eq!(rejection.status_code(), status, "{}", code);
        assert_eq!(rejection.error_code(), code);

        let response = rejection.to_response();
        assert_eq!(response.status(), status);
        let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body["error"]["code"], code);
    }
}

#[tokio::test]
async fn test_relaxed_policy_admits_owner() {
    let fixture = TestFixture::new().await;
    let gate = fixture
        .gate
        .clone()
        .with_policy(AdmissionPolicy::AtLeast(Role::Admin));

    let request = Request::builder()
        .header("x-tenant-id", fixture.org_id.to_string())
        .extension(AuthenticatedUser(fixture.owner_id))
        .body(())
        .unwrap();
    let request = gate.admit(&CallContext::background(), request).await.unwrap();

    assert_eq!(
        request.extensions().get::<TenantContext>().unwrap().role,
        Role::Owner
    );
}

#[tokio::test]
async fn test_resolution_failure_is_unavailable() {
    let fixture = TestFixture::new().await;
    fixture
        .memberships
        .faults()
        .fail_next(StoreError::Canceled("connection reset".into()));

    let rejection = fixture
        .admit(Some(fixture.admin_id), Some(fixture.org_id.to_string()))
        .await
        .unwrap_err();

    assert!(matches!(rejection, TenancyRejection::Resolution(_)));
    assert_eq!(rejection.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(rejection.is_server_error());
}

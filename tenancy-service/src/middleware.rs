//! Per-request tenancy resolution
//!
//! [`TenancyGate`] sits behind the authentication layer. It reads the
//! [`AuthenticatedUser`] extension and the tenant header, resolves the
//! caller's membership, applies the admission policy and, on success, inserts
//! a [`TenantContext`] into the request extensions for downstream handlers.
//!
//! The gate works on plain `http` types, so any framework built on them can
//! call [`TenancyGate::admit`] or [`TenancyGate::admit_parts`] from its own
//! middleware hook.

use http::header::{HeaderName, CONTENT_TYPE};
use http::request::Parts;
use http::{Extensions, HeaderMap, HeaderValue, Request, Response, StatusCode};
use tenancy_org::{
    AdmissionPolicy, AuthenticatedUser, Role, TenantContext, TENANT_ADMISSION_POLICY,
};
use thiserror::Error;
use uuid::Uuid;

use crate::call::CallContext;
use crate::error::{ErrorKind, TenancyError};
use crate::service::TenancyService;

/// Reasons the gate refuses a request.
#[derive(Debug, Error)]
pub enum TenancyRejection {
    /// The authentication layer did not run before the gate
    #[error("Authenticated user missing from request")]
    MissingIdentity,

    /// Tenant header absent
    #[error("Missing tenant header '{0}'")]
    MissingTenant(HeaderName),

    /// Tenant header present but not a UUID
    #[error("Invalid tenant identifier: {0}")]
    InvalidTenant(String),

    /// Caller has no membership in the tenant
    #[error("User {user_id} is not a member of organization {organization_id}")]
    NotAMember {
        /// Authenticated caller
        user_id: Uuid,
        /// Requested tenant
        organization_id: Uuid,
    },

    /// Caller's role does not pass the admission policy
    #[error("Role '{role}' is not admitted")]
    InsufficientRole {
        /// Caller's role in the tenant
        role: Role,
        /// Policy that refused it
        policy: AdmissionPolicy,
    },

    /// Membership lookup failed
    #[error("Tenant resolution failed: {0}")]
    Resolution(#[source] TenancyError),
}

impl TenancyRejection {
    /// HTTP status for this rejection.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TenancyRejection::MissingIdentity => StatusCode::INTERNAL_SERVER_ERROR,
            TenancyRejection::MissingTenant(_) | TenancyRejection::InvalidTenant(_) => {
                StatusCode::BAD_REQUEST
            }
            TenancyRejection::NotAMember { .. } | TenancyRejection::InsufficientRole { .. } => {
                StatusCode::FORBIDDEN
            }
            TenancyRejection::Resolution(err) => match err.kind() {
                ErrorKind::Unavailable | ErrorKind::Canceled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            TenancyRejection::MissingIdentity => "MISSING_IDENTITY",
            TenancyRejection::MissingTenant(_) => "MISSING_TENANT",
            TenancyRejection::InvalidTenant(_) => "INVALID_TENANT",
            TenancyRejection::NotAMember { .. } => "NOT_A_MEMBER",
            TenancyRejection::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            TenancyRejection::Resolution(_) => "TENANT_RESOLUTION_FAILED",
        }
    }

    /// Check if this rejection indicates a fault on our side.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Render as a JSON error response.
    ///
    /// Server-side failures get a generic message; the detail stays in the log.
    pub fn to_response(&self) -> Response<String> {
        let message = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": message,
            }
        })
        .to_string();

        let mut response = Response::new(body);
        *response.status_mut() = self.status_code();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

/// Resolves the caller's tenant membership for each request.
#[derive(Debug, Clone)]
pub struct TenancyGate {
    service: TenancyService,
    header: HeaderName,
    policy: AdmissionPolicy,
}

impl TenancyGate {
    /// Build a gate reading the tenant header named in the service config.
    ///
    /// An unusable header name in the config falls back to `X-Tenant-ID`.
    pub fn new(service: TenancyService) -> Self {
        let header = HeaderName::try_from(service.config().tenant_header.as_str())
            .unwrap_or_else(|_| {
                tracing::warn!(
                    header = %service.config().tenant_header,
                    "Invalid tenant header name, using default"
                );
                HeaderName::from_static("x-tenant-id")
            });

        Self {
            service,
            header,
            policy: TENANT_ADMISSION_POLICY,
        }
    }

    /// Override the admission policy.
    pub fn with_policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Header carrying the tenant selector.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Admission policy in force.
    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Resolve the tenant context for a request's extensions and headers.
    pub async fn resolve(
        &self,
        ctx: &CallContext,
        extensions: &Extensions,
        headers: &HeaderMap,
    ) -> Result<TenantContext, TenancyRejection> {
        let user = extensions
            .get::<AuthenticatedUser>()
            .ok_or(TenancyRejection::MissingIdentity)?;
        let organization_id = self.tenant_id(headers)?;

        let membership = self
            .service
            .get_membership(ctx, user.user_id(), organization_id)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => TenancyRejection::NotAMember {
                    user_id: user.user_id(),
                    organization_id,
                },
                _ => TenancyRejection::Resolution(err),
            })?;

        if !self.policy.admits(membership.role) {
            return Err(TenancyRejection::InsufficientRole {
                role: membership.role,
                policy: self.policy,
            });
        }

        Ok(TenantContext::from_membership(&membership))
    }

    /// Run the gate over a full request, inserting [`TenantContext`] on success.
    pub async fn admit<B>(
        &self,
        ctx: &CallContext,
        mut request: Request<B>,
    ) -> Result<Request<B>, TenancyRejection> {
        let resolved = self
            .resolve(ctx, request.extensions(), request.headers())
            .await;
        let tenant = self.finish(resolved)?;
        request.extensions_mut().insert(tenant);
        Ok(request)
    }

    /// Run the gate over request parts, inserting [`TenantContext`] on success.
    pub async fn admit_parts(
        &self,
        ctx: &CallContext,
        parts: &mut Parts,
    ) -> Result<TenantContext, TenancyRejection> {
        let resolved = self.resolve(ctx, &parts.extensions, &parts.headers).await;
        let tenant = self.finish(resolved)?;
        parts.extensions.insert(tenant.clone());
        Ok(tenant)
    }

    fn tenant_id(&self, headers: &HeaderMap) -> Result<Uuid, TenancyRejection> {
        let value = headers
            .get(&self.header)
            .ok_or_else(|| TenancyRejection::MissingTenant(self.header.clone()))?;
        let value = value
            .to_str()
            .map_err(|_| TenancyRejection::InvalidTenant("header is not valid UTF-8".to_string()))?;

        Uuid::parse_str(value.trim())
            .map_err(|_| TenancyRejection::InvalidTenant(format!("'{}' is not a UUID", value)))
    }

    fn finish(
        &self,
        resolved: Result<TenantContext, TenancyRejection>,
    ) -> Result<TenantContext, TenancyRejection> {
        match &resolved {
            Ok(tenant) => tracing::debug!(
                org_id = %tenant.organization_id,
                user_id = %tenant.user_id,
                role = %tenant.role,
                "Tenant resolved"
            ),
            Err(rejection) if rejection.is_server_error() => tracing::error!(
                code = rejection.error_code(),
                error = %rejection,
                "Tenant resolution failed"
            ),
            Err(rejection) => tracing::warn!(
                code = rejection.error_code(),
                error = %rejection,
                "Request rejected by tenancy gate"
            ),
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TenancyConfig, DEFAULT_TENANT_HEADER};
    use crate::error::StoreError;
    use crate::memory::{
        MemoryInvitationStore, MemoryMembershipStore, MemoryOrganizationStore, MemoryUserStore,
        RecordingEmailer,
    };
    use std::sync::Arc;

    fn service(memberships: Arc<MemoryMembershipStore>) -> TenancyService {
        TenancyService::new(
            Arc::new(MemoryOrganizationStore::new()),
            Arc::new(MemoryUserStore::new()),
            memberships,
            Arc::new(MemoryInvitationStore::new()),
            Arc::new(RecordingEmailer::new()),
        )
    }

    fn request(user: Option<Uuid>, tenant: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/projects");
        if let Some(tenant) = tenant {
            builder = builder.header(DEFAULT_TENANT_HEADER, tenant);
        }
        let mut request = builder.body(()).unwrap();
        if let Some(user) = user {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
        request
    }

    async fn member(service: &TenancyService, role: Role) -> (Uuid, Uuid) {
        let user_id = Uuid::now_v7();
        let org_id = Uuid::now_v7();
        service
            .create_membership(&CallContext::background(), user_id, org_id, role)
            .await
            .unwrap();
        (user_id, org_id)
    }

    #[tokio::test]
    async fn test_admin_is_admitted() {
        let service = service(Arc::new(MemoryMembershipStore::new()));
        let (user_id, org_id) = member(&service, Role::Admin).await;
        let gate = TenancyGate::new(service);

        let request = gate
            .admit(
                &CallContext::background(),
                request(Some(user_id), Some(&org_id.to_string())),
            )
            .await
            .unwrap();

        let tenant = request.extensions().get::<TenantContext>().unwrap();
        assert_eq!(tenant.organization_id, org_id);
        assert_eq!(tenant.user_id, user_id);
        assert_eq!(tenant.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_rejection_statuses() {
        let service = service(Arc::new(MemoryMembershipStore::new()));
        let (editor_id, org_id) = member(&service, Role::Editor).await;
        let gate = TenancyGate::new(service);
        let ctx = CallContext::background();
        let tenant = org_id.to_string();

        let err = gate.admit(&ctx, request(None, Some(&tenant))).await.unwrap_err();
        assert!(matches!(err, TenancyRejection::MissingIdentity));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = gate.admit(&ctx, request(Some(editor_id), None)).await.unwrap_err();
        assert!(matches!(err, TenancyRejection::MissingTenant(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = gate
            .admit(&ctx, request(Some(editor_id), Some("acme")))
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyRejection::InvalidTenant(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = gate
            .admit(&ctx, request(Some(Uuid::now_v7()), Some(&tenant)))
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyRejection::NotAMember { .. }));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = gate
            .admit(&ctx, request(Some(editor_id), Some(&tenant)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TenancyRejection::InsufficientRole { role: Role::Editor, .. }
        ));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_owner_is_refused_unless_policy_relaxed() {
        let service = service(Arc::new(MemoryMembershipStore::new()));
        let (owner_id, org_id) = member(&service, Role::Owner).await;
        let ctx = CallContext::background();

        let gate = TenancyGate::new(service);
        let err = gate
            .admit(&ctx, request(Some(owner_id), Some(&org_id.to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyRejection::InsufficientRole { .. }));

        let gate = gate.with_policy(AdmissionPolicy::AtLeast(Role::Admin));
        assert!(gate
            .admit(&ctx, request(Some(owner_id), Some(&org_id.to_string())))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_store_outage_is_service_unavailable() {
        let memberships = Arc::new(MemoryMembershipStore::new());
        let service = service(memberships.clone());
        let gate = TenancyGate::new(service);
        memberships
            .faults()
            .fail_next(StoreError::Unavailable("db down".into()));

        let err = gate
            .admit(
                &CallContext::background(),
                request(Some(Uuid::now_v7()), Some(&Uuid::now_v7().to_string())),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TenancyRejection::Resolution(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let response = err.to_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!response.body().contains("db down"));
    }

    #[tokio::test]
    async fn test_admit_parts_and_custom_header() {
        let memberships = Arc::new(MemoryMembershipStore::new());
        let service = service(memberships).with_config(TenancyConfig {
            tenant_header: "X-Org".to_string(),
            ..TenancyConfig::default()
        });
        let (user_id, org_id) = member(&service, Role::Admin).await;
        let gate = TenancyGate::new(service);
        assert_eq!(gate.header().as_str(), "x-org");

        let (mut parts, ()) = Request::builder()
            .header("X-Org", org_id.to_string())
            .extension(AuthenticatedUser(user_id))
            .body(())
            .unwrap()
            .into_parts();

        let tenant = gate
            .admit_parts(&CallContext::background(), &mut parts)
            .await
            .unwrap();
        assert_eq!(tenant.organization_id, org_id);
        assert!(parts.extensions.get::<TenantContext>().is_some());
    }

    #[test]
    fn test_rejection_response_body() {
        let response = TenancyRejection::InvalidTenant("'acme' is not a UUID".into()).to_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body["error"]["code"], "INVALID_TENANT");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("acme"));
    }
}

//! # Tenancy Service
//!
//! Orchestration layer of the multi-tenant identity core: users,
//! organizations, memberships and invitations behind pluggable store and
//! emailer ports, plus a per-request gate resolving the caller's tenant.
//!
//! ## Overview
//!
//! - **Service**: [`TenancyService`] validates input and enforces the
//!   cross-entity invariants (owner membership, invite withdrawal, expiry)
//! - **Ports**: [`OrganizationStore`], [`UserStore`], [`MembershipStore`],
//!   [`InvitationStore`] and [`Emailer`], implemented by the host
//! - **Gate**: [`TenancyGate`] turns an authenticated request plus tenant
//!   header into a [`TenantContext`](tenancy_org::TenantContext)
//! - **Adapters**: in-memory stores, a log emailer and a retrying emailer
//!
//! ## Architecture
//!
//! ```text
//! request ─→ auth layer ─→ TenancyGate ─→ handler
//!                              │
//!                              ▼
//!                       TenancyService ─→ stores / emailer
//! ```
//!
//! Every call takes a [`CallContext`] carrying an optional deadline. Without
//! one the configured call timeout applies.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tenancy_org::Role;
//! use tenancy_service::memory::{
//!     MemoryInvitationStore, MemoryMembershipStore, MemoryOrganizationStore, MemoryUserStore,
//!     RecordingEmailer,
//! };
//! use tenancy_service::{CallContext, TenancyService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tenancy_service::TenancyError> {
//! let emailer = Arc::new(RecordingEmailer::new());
//! let service = TenancyService::new(
//!     Arc::new(MemoryOrganizationStore::new()),
//!     Arc::new(MemoryUserStore::new()),
//!     Arc::new(MemoryMembershipStore::new()),
//!     Arc::new(MemoryInvitationStore::new()),
//!     emailer.clone(),
//! );
//! let ctx = CallContext::background();
//!
//! let alice = service.create_user(&ctx, "a@x.com", "Alice").await?;
//! let org = service.create_organization(&ctx, "Acme Co", alice.id).await?;
//! service
//!     .create_invitation(&ctx, org.id, alice.id, "b@x.com", Role::Editor)
//!     .await?;
//!
//! let bob = service.create_user(&ctx, "b@x.com", "Bob").await?;
//! let token = emailer.sent()[0].token.clone();
//! let membership = service.accept_invitation(&ctx, &token, bob.id).await?;
//! assert_eq!(membership.role, Role::Editor);
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod clock;
pub mod config;
pub mod emailer;
pub mod error;
pub mod logging;
pub mod memory;
pub mod middleware;
pub mod retry;
pub mod service;
pub mod stores;
pub mod token;

pub use call::CallContext;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LogFormat, LoggingConfig, TenancyConfig};
pub use emailer::{LogEmailer, RetryingEmailer};
pub use error::{EmailError, ErrorKind, StoreError, StoreResult, TenancyError, TenancyResult};
pub use logging::init_logging;
pub use middleware::{TenancyGate, TenancyRejection};
pub use retry::RetryConfig;
pub use service::{TenancyService, VerifiedInvite};
pub use stores::{Emailer, InvitationStore, MembershipStore, OrganizationStore, UserStore};

pub use tenancy_org;

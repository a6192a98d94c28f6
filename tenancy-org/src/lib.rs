//! # Tenancy Domain Model
//!
//! This crate provides the inert value objects of the multi-tenant identity
//! layer. Nothing here performs I/O or business validation; orchestration and
//! invariants live in `tenancy-service`.
//!
//! ## Overview
//!
//! - **Users**: Global identities, never scoped to a tenant
//! - **Organizations**: The tenants
//! - **Memberships**: User-organization links carrying a [`Role`]
//! - **Invites**: Time-boxed, token-bearing offers of membership
//! - **Roles**: Closed, ordered privilege levels plus admission policies
//! - **Context**: The resolved tenant of an inbound request
//!
//! ## Architecture
//!
//! ```text
//! User
//!   └─ Membership (role) ─→ Organization
//!                              └─ Invite (role, token, expires_at)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use tenancy_org::{Invite, Membership, Organization, Role, User};
//!
//! let owner = User::new("a@x.com", "Alice");
//! let org = Organization::new(owner.id, "Acme Co");
//! let membership = Membership::new(owner.id, org.id, Role::Owner);
//! assert_eq!(membership.organization_id, org.id);
//!
//! let invite = Invite::new(org.id, owner.id, "b@x.com", Role::Editor, "opaque-token");
//! assert_eq!(invite.expires_at - invite.created_at, chrono::Duration::hours(24));
//! ```

pub mod context;
pub mod invite;
pub mod membership;
pub mod organization;
pub mod roles;
pub mod user;

// Re-export main types for convenience
pub use context::{AuthenticatedUser, TenantContext};
pub use invite::{Invite, InviteStatus, DEFAULT_INVITE_TTL_HOURS};
pub use membership::Membership;
pub use organization::Organization;
pub use roles::{AdmissionPolicy, Role, MEMBER_LISTING_POLICY, TENANT_ADMISSION_POLICY};
pub use user::User;

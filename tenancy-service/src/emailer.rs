//! Emailer adapters
//!
//! Concrete transports (SMTP, provider APIs) live in the host. This module
//! provides the acceptance-link format every transport should use, a
//! development emailer that only logs, and a retrying decorator.

use async_trait::async_trait;
use tenancy_org::Invite;

use crate::call::CallContext;
use crate::config::TenancyConfig;
use crate::error::EmailError;
use crate::retry::{with_retry_if, RetryConfig};
use crate::stores::Emailer;
use crate::token::fingerprint;

/// Build the invitation acceptance link for `token`.
///
/// # Examples
///
/// ```
/// use tenancy_service::emailer::accept_link;
///
/// assert_eq!(
///     accept_link("https://app.example.com/accept-invite", "abc"),
///     "https://app.example.com/accept-invite?token=abc"
/// );
/// assert_eq!(
///     accept_link("https://app.example.com/accept?src=mail", "abc"),
///     "https://app.example.com/accept?src=mail&token=abc"
/// );
/// ```
pub fn accept_link(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, token)
}

/// Subject line used for invitation emails.
pub const INVITATION_SUBJECT: &str = "You're invited to join an organization!";

/// Plain-text invitation body pointing at `link`.
pub fn invitation_body(invite: &Invite, link: &str) -> String {
    format!(
        "Hello! You have been invited to join an organization as {}. \
         Please open the link to accept: {}\n\nThis invitation expires at {}.",
        invite.role.display_name(),
        link,
        invite.expires_at.to_rfc2822(),
    )
}

/// Emailer that records invitations in the log instead of sending them.
///
/// Only the token fingerprint is logged.
#[derive(Debug, Clone)]
pub struct LogEmailer {
    accept_url_base: String,
}

impl LogEmailer {
    /// Create a log emailer building links from `accept_url_base`.
    pub fn new(accept_url_base: impl Into<String>) -> Self {
        Self {
            accept_url_base: accept_url_base.into(),
        }
    }

    /// Create a log emailer using the configured acceptance page.
    pub fn from_config(config: &TenancyConfig) -> Self {
        Self::new(config.accept_url_base.clone())
    }

    /// Base URL acceptance links are built from.
    pub fn accept_url_base(&self) -> &str {
        &self.accept_url_base
    }
}

#[async_trait]
impl Emailer for LogEmailer {
    async fn send_invitation(&self, _ctx: &CallContext, invite: &Invite) -> Result<(), EmailError> {
        let link = accept_link(&self.accept_url_base, &invite.token);
        let body = invitation_body(invite, &link);

        tracing::info!(
            invite_id = %invite.id,
            to = %invite.invitee_email,
            subject = INVITATION_SUBJECT,
            token_fingerprint = %fingerprint(&invite.token),
            body_len = body.len(),
            "Invitation email (log transport)"
        );
        Ok(())
    }
}

/// Decorator retrying transient failures of another emailer.
///
/// Assumes the wrapped transport tolerates a duplicate send when an attempt
/// fails after the message was actually handed off.
#[derive(Debug, Clone)]
pub struct RetryingEmailer<E> {
    inner: E,
    config: RetryConfig,
}

impl<E: Emailer> RetryingEmailer<E> {
    /// Wrap `inner` with the given retry policy.
    pub fn new(inner: E, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Wrap `inner` with the configured email retry policy.
    pub fn from_config(inner: E, config: &TenancyConfig) -> Self {
        Self::new(inner, config.email_retry.clone())
    }

    /// Retry policy in force.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.config
    }

    /// The wrapped emailer.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: Emailer> Emailer for RetryingEmailer<E> {
    async fn send_invitation(&self, ctx: &CallContext, invite: &Invite) -> Result<(), EmailError> {
        with_retry_if(
            &self.config,
            || self.inner.send_invitation(ctx, invite),
            EmailError::is_transient,
        )
        .await
    }
}

//! Error types for tenancy operations
//!
//! Store and emailer adapters report [`StoreError`] and [`EmailError`]. The
//! service wraps them in [`TenancyError`], which keeps the underlying cause as
//! its `source` and exposes a stable [`ErrorKind`] for callers to branch on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Stable classification of every error the service returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad caller input, never worth retrying
    Validation,
    /// Referenced entity is absent
    NotFound,
    /// Unique constraint violated
    DuplicateKey,
    /// Authorization gate refused the caller
    PermissionDenied,
    /// Invitation past its expiry or already consumed
    Expired,
    /// Transient store or notifier failure
    Unavailable,
    /// Deadline exceeded or operation canceled
    Canceled,
    /// Anything unclassified
    Unknown,
}

impl ErrorKind {
    /// Get the error code used in API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DuplicateKey => "DUPLICATE_KEY",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::Expired => "EXPIRED",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Canceled => "CANCELED",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Check whether a caller may reasonably retry.
    ///
    /// The service itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Unavailable | ErrorKind::Canceled)
    }
}

/// Errors reported by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record matched
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend unreachable or overloaded
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Deadline exceeded or canceled
    #[error("Store operation canceled: {0}")]
    Canceled(String),

    /// Anything else
    #[error("Store error: {0}")]
    Unknown(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Error produced when a call outlives its deadline.
    pub fn deadline_exceeded() -> Self {
        StoreError::Canceled("deadline exceeded".to_string())
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::DuplicateKey(_) => ErrorKind::DuplicateKey,
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
            StoreError::Canceled(_) => ErrorKind::Canceled,
            StoreError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

/// Errors reported by emailer adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    /// Transport unreachable, worth retrying
    #[error("Email transport unavailable: {0}")]
    Unavailable(String),

    /// Message refused by the transport
    #[error("Email rejected: {0}")]
    Rejected(String),

    /// Deadline exceeded or canceled
    #[error("Email send canceled: {0}")]
    Canceled(String),
}

impl EmailError {
    /// Error produced when a send outlives its deadline.
    pub fn deadline_exceeded() -> Self {
        EmailError::Canceled("deadline exceeded".to_string())
    }

    /// Check whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmailError::Unavailable(_))
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmailError::Unavailable(_) => ErrorKind::Unavailable,
            EmailError::Rejected(_) => ErrorKind::Unknown,
            EmailError::Canceled(_) => ErrorKind::Canceled,
        }
    }
}

/// Tenancy service error types.
#[derive(Debug, Error)]
pub enum TenancyError {
    /// Caller input rejected before any side effect
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Authorization gate refused the caller
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invitation token is past its expiry
    #[error("Invitation expired at {expires_at}")]
    InvitationExpired {
        /// When the invitation stopped being valid
        expires_at: DateTime<Utc>,
    },

    /// Invitation token was already used
    #[error("Invitation has already been accepted")]
    InvitationConsumed,

    /// A store port failed
    #[error("Failed to {operation}: {source}")]
    Store {
        /// What the service was doing
        operation: &'static str,
        /// Adapter error
        #[source]
        source: StoreError,
    },

    /// The emailer failed; the invitation was withdrawn
    #[error("Failed to send invitation: {source}")]
    Notification {
        /// Adapter error
        #[source]
        source: EmailError,
    },
}

/// Result type for tenancy operations.
pub type TenancyResult<T> = Result<T, TenancyError>;

impl TenancyError {
    /// Build a mapper that wraps a [`StoreError`] with the failed operation.
    pub fn store(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| TenancyError::Store { operation, source }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TenancyError::Validation(_) => ErrorKind::Validation,
            TenancyError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            TenancyError::InvitationExpired { .. } | TenancyError::InvitationConsumed => {
                ErrorKind::Expired
            }
            TenancyError::Store { source, .. } => source.kind(),
            TenancyError::Notification { source } => source.kind(),
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Check if this error should be logged at error level.
    ///
    /// Validation, not-found and permission failures are expected outcomes.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Unavailable | ErrorKind::Canceled | ErrorKind::Unknown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_store_error_classification() {
        let err = TenancyError::store("get user")(StoreError::NotFound("user".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_server_error());

        let err = TenancyError::store("create user")(StoreError::Unavailable("down".into()));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_server_error());
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn test_source_is_preserved() {
        let err = TenancyError::store("create user")(StoreError::DuplicateKey("email".into()));

        let source = err.source().expect("store errors keep their cause");
        assert_eq!(source.to_string(), "Duplicate key: email");
        assert!(err.to_string().contains("create user"));
    }

    #[test]
    fn test_notification_classification() {
        let err = TenancyError::Notification {
            source: EmailError::Rejected("bad address".into()),
        };
        assert_eq!(err.kind(), ErrorKind::Unknown);

        let err = TenancyError::Notification {
            source: EmailError::deadline_exceeded(),
        };
        assert_eq!(err.kind(), ErrorKind::Canceled);
    }

    #[test]
    fn test_invitation_errors_classify_as_expired() {
        assert_eq!(TenancyError::InvitationConsumed.kind(), ErrorKind::Expired);
        assert_eq!(
            TenancyError::InvitationExpired { expires_at: Utc::now() }.kind(),
            ErrorKind::Expired
        );
    }

    #[test]
    fn test_email_transience() {
        assert!(EmailError::Unavailable("smtp".into()).is_transient());
        assert!(!EmailError::Rejected("spam".into()).is_transient());
        assert!(!EmailError::deadline_exceeded().is_transient());
    }
}

//! Deadline-bearing call context
//!
//! Every service operation and every port method receives a [`CallContext`].
//! Cancellation itself is structural: dropping an operation's future cancels
//! it. The context adds a deadline, enforced around each port call.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline carried through a single logical call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tenancy_service::CallContext;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = CallContext::with_timeout(Duration::from_secs(5));
/// assert!(ctx.deadline().is_some());
/// assert!(!ctx.is_expired());
///
/// let background = CallContext::background();
/// assert!(background.deadline().is_none());
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context without a deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// A context expiring `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// without a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// A context expiring at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// The deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Check whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Apply `fallback` as the timeout when no deadline is set.
    ///
    /// An existing deadline is kept even if it is later than the fallback.
    pub fn or_timeout(self, fallback: Duration) -> Self {
        match self.deadline {
            Some(_) => self,
            None => Self::with_timeout(fallback),
        }
    }

    /// Run `fut` within the deadline.
    ///
    /// When the deadline passes first, the future is dropped and
    /// `on_deadline` supplies the error.
    pub async fn run<F, T, E>(&self, fut: F, on_deadline: impl FnOnce() -> E) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                Ok(result) => result,
                Err(_) => Err(on_deadline()),
            },
            None => fut.await,
        }
    }
}

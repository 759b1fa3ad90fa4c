//! Polling wait engine for asynchronous provider operations.
//!
//! Most mutating calls return before the provider has finished the work. A
//! [`WaitSpec`] turns "accepted" into "completed" by re-evaluating a predicate
//! every poll interval until it reports success, reports an error, the timeout
//! elapses, or the caller cancels.
//!
//! Resource wrappers do not write their own state machines: they describe
//! their provider statuses with a [`StatusTable`] and let the engine drive the
//! loop.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default delay between two predicate evaluations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default total budget of a wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Parameters of one blocking wait.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    description: String,
    poll_interval: Duration,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl WaitSpec {
    /// Create a wait with default interval and timeout.
    ///
    /// `description` appears in timeout and cancellation errors, e.g.
    /// `"instance web/1 to be running"`.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
            cancel: None,
        }
    }

    /// Set the delay between predicate evaluations.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the total budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort the wait when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Human-readable description of what is awaited.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Delay between predicate evaluations.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Total budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `predicate` until it returns `Ok(true)`.
    ///
    /// The predicate is first evaluated one interval after the call, never
    /// immediately. `Ok(false)` keeps polling; an `Err` is returned as-is
    /// without further polls. A sleep never extends past the deadline: the
    /// last evaluation happens at the deadline itself.
    ///
    /// # Errors
    ///
    /// The predicate's error, [`Error::Timeout`] once the budget is spent,
    /// or [`Error::Cancelled`] if the cancellation token fires.
    pub async fn wait<F, Fut>(&self, mut predicate: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut polls: u32 = 0;

        debug!(
            description = %self.description,
            interval = ?self.poll_interval,
            timeout = ?self.timeout,
            "waiting"
        );

        loop {
            self.tick(deadline).await?;
            polls += 1;

            match predicate().await {
                Ok(true) => {
                    info!(description = %self.description, polls, "wait completed");
                    return Ok(());
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(description = %self.description, polls, error = %err, "wait failed");
                    return Err(err);
                }
            }

            if Instant::now() >= deadline {
                warn!(description = %self.description, polls, "wait timed out");
                return Err(Error::Timeout(self.description.clone()));
            }

            debug!(description = %self.description, polls, "still pending");
        }
    }

    async fn tick(&self, deadline: Instant) -> Result<()> {
        let wake = std::cmp::min(Instant::now() + self.poll_interval, deadline);
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => {
                        warn!(description = %self.description, "wait cancelled");
                        Err(Error::Cancelled(self.description.clone()))
                    }
                    () = sleep_until(wake) => Ok(()),
                }
            }
            None => {
                sleep_until(wake).await;
                Ok(())
            }
        }
    }
}

/// Meaning of a provider status for the operation being awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Still in progress; keep polling.
    Pending,
    /// The state the caller is waiting for.
    Ready,
    /// Terminal failure; stop polling.
    Failed,
}

/// Declarative `{status -> outcome}` mapping for one wait.
///
/// Lookups ignore ASCII case. Statuses missing from the table map to the
/// table's default, [`Outcome::Pending`] unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTable {
    entries: &'static [(&'static str, Outcome)],
    default: Outcome,
}

impl StatusTable {
    /// Build a table from `(status, outcome)` pairs.
    #[must_use]
    pub const fn new(entries: &'static [(&'static str, Outcome)]) -> Self {
        Self {
            entries,
            default: Outcome::Pending,
        }
    }

    /// Outcome for statuses not listed in the table.
    #[must_use]
    pub const fn with_default(mut self, outcome: Outcome) -> Self {
        self.default = outcome;
        self
    }

    /// Look up the outcome of `status`.
    #[must_use]
    pub fn outcome(&self, status: &str) -> Outcome {
        self.entries
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(status))
            .map_or(self.default, |(_, outcome)| *outcome)
    }

    /// Translate a status into a wait predicate result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] naming `subject` when the status is
    /// a failure state. `detail` is the provider's reason, if it gave one.
    pub fn classify(&self, subject: &str, status: &str, detail: Option<&str>) -> Result<bool> {
        match self.outcome(status) {
            Outcome::Ready => Ok(true),
            Outcome::Pending => Ok(false),
            Outcome::Failed => Err(Error::OperationFailed(match detail {
                Some(detail) if !detail.is_empty() => {
                    format!("{subject} entered status `{status}`: {detail}")
                }
                _ => format!("{subject} entered status `{status}`"),
            })),
        }
    }
}

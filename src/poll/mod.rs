//! Bounded polling of readiness predicates.
//!
//! A [`Poller`] evaluates a boolean predicate at a fixed interval until it
//! holds or the timeout elapses. The loop runs on a worker thread while the
//! caller waits at most `timeout` (plus a short grace) for a verdict, so a
//! predicate that blocks forever (an `ssh` probe without a connect timeout,
//! say) cannot hang the caller. Abandoned workers are not cancelled; they
//! finish on their own once the predicate returns.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Default overall budget for a readiness wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default delay between two predicate evaluations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Slack granted to the worker beyond the timeout before it is abandoned, so
/// a final check that lands on the deadline can still report its verdict.
pub(crate) const GUARD_GRACE: Duration = Duration::from_millis(250);

/// Outcome of a bounded wait.
///
/// Expiry is a value rather than an error so callers can probe ("is it
/// reachable yet?") without treating a negative answer as fatal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub enum WaitOutcome {
    /// The predicate held after the given time, measured from the first check.
    Ready(Duration),
    /// The predicate never held within the timeout.
    TimedOut,
}

impl WaitOutcome {
    /// Returns `true` when the predicate held.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Elapsed time until the predicate held, if it did.
    #[must_use]
    pub const fn elapsed(self) -> Option<Duration> {
        match self {
            Self::Ready(elapsed) => Some(elapsed),
            Self::TimedOut => None,
        }
    }
}

/// Timeout and interval pair used for readiness polling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl Poller {
    /// Creates a poller with the given overall timeout and check interval.
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Overall budget of a wait.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay between two checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls `predicate` until it returns `true` or the timeout elapses.
    ///
    /// The predicate is checked immediately and then once per interval. The
    /// returned duration is the time between the first check and the one
    /// that succeeded.
    pub fn wait_for<F>(&self, mut predicate: F) -> WaitOutcome
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let Self { timeout, interval } = *self;
        let verdict = run_bounded(Some(timeout.saturating_add(GUARD_GRACE)), move || {
            let start = Instant::now();
            loop {
                if predicate() {
                    return WaitOutcome::Ready(start.elapsed());
                }
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return WaitOutcome::TimedOut;
                }
                tracing::trace!(?elapsed, "readiness predicate not yet satisfied");
                thread::sleep(interval.min(timeout.saturating_sub(elapsed)));
            }
        });
        let outcome = verdict.unwrap_or(WaitOutcome::TimedOut);
        match outcome {
            WaitOutcome::Ready(elapsed) => tracing::debug!(?elapsed, "readiness reached"),
            WaitOutcome::TimedOut => tracing::debug!(?timeout, "readiness wait timed out"),
        }
        outcome
    }
}

/// Runs `job` on a worker thread and waits at most `budget` for its result.
///
/// With no budget the call waits for the job to finish. `None` means the
/// budget expired (or the worker could not be started or panicked); the
/// worker is left running and its eventual result is discarded.
pub fn run_bounded<T, F>(budget: Option<Duration>, job: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name(String::from("lxc-bounded-wait"))
        .spawn(move || {
            // The receiver is gone once the caller stopped waiting.
            sender.send(job()).ok();
        });
    if let Err(err) = spawned {
        tracing::warn!(%err, "failed to start bounded wait worker");
        return None;
    }

    let result = match budget {
        Some(limit) => receiver.recv_timeout(limit).ok(),
        None => receiver.recv().ok(),
    };
    if result.is_none() {
        tracing::warn!(?budget, "abandoning bounded wait worker");
    }
    result
}

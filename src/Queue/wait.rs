// Bounded, cancellable waiting on queue futex words

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::error::Status;
use crate::Core::futex;

/// Everything that can end a blocking wait early.
#[derive(Clone, Copy)]
pub struct WaitPolicy<'a> {
    /// `None` waits until cancelled.
    pub deadline: Option<Instant>,
    /// Longest single park between checks of the cancellation sources.
    pub poll: Duration,
    /// Cooperative early-out token.
    pub early_out: Option<&'a AtomicBool>,
    /// Process-wide liveness flag.
    pub running: &'a AtomicBool,
}

impl<'a> WaitPolicy<'a> {
    pub fn new(timeout: Option<Duration>, poll: Duration, running: &'a AtomicBool) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            poll: poll.max(Duration::from_micros(1)),
            early_out: None,
            running,
        }
    }

    pub fn with_early_out(mut self, early_out: Option<&'a AtomicBool>) -> Self {
        self.early_out = early_out;
        self
    }

    fn cancelled(&self) -> bool {
        !self.running.load(Ordering::Acquire)
            || self
                .early_out
                .map(|flag| flag.load(Ordering::Acquire))
                .unwrap_or(false)
    }
}

/// Park on `signal` until `ready()` holds.
///
/// Returns `Success` once `ready()` is true, `Timeout` when the deadline
/// passes first and `Failure` when cancelled (early-out or not running).
/// The condition is always re-checked after the signal value is sampled, so a
/// wake between the check and the park cannot be lost.
pub fn wait_on(signal: &AtomicU32, policy: &WaitPolicy<'_>, mut ready: impl FnMut() -> bool) -> Status {
    loop {
        let seen = signal.load(Ordering::Acquire);
        if ready() {
            return Status::Success;
        }
        if policy.cancelled() {
            return Status::Failure;
        }

        let slice = match policy.deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Status::Timeout;
                }
                (deadline - now).min(policy.poll)
            }
            None => policy.poll,
        };

        futex::futex_wait(signal, seen, slice);
    }
}

// Producer-side batch gate for one outbound command queue

use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct BatchState {
    owner: Option<ThreadId>,
    depth: usize,
    pushed: usize,
}

/// Exclusive, per-thread re-entrant gate around the producer cursors.
///
/// `begin`/`end` may be called from separate functions (or nested through
/// [`crate::Bridge::Command`]), so the gate tracks its owner explicitly instead
/// of handing out a guard. Other threads park on a condvar until the owner's
/// outermost `end`.
#[derive(Debug, Default)]
pub struct BatchGate {
    state: Mutex<BatchState>,
    released: Condvar,
}

impl BatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the batch, blocking while another thread owns it.
    pub fn begin(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                Some(owner) if owner == me => break,
                Some(_) => self.released.wait(&mut state),
                None => {
                    state.owner = Some(me);
                    state.pushed = 0;
                    break;
                }
            }
        }
        state.depth += 1;
    }

    /// Leave one level of the batch.
    ///
    /// Returns the number of records pushed since the outermost `begin`, or
    /// `None` when the calling thread does not own the gate.
    pub fn end(&self) -> Option<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return None;
        }
        state.depth -= 1;
        let pushed = state.pushed;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
        Some(pushed)
    }

    /// Count one record against the current batch.
    pub fn record_push(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.pushed += 1;
        }
    }
}

//! Error surface of the bridge.
//!
//! Two layers: [`BridgeError`] for setup failures that must stop `init`
//! (I/O, layout, version mismatches), and [`Status`] for the protocol
//! operations, which degrade to a result code instead of erroring.

use std::io;
use thiserror::Error;

/// Outcome of a protocol operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum Status {
    Success,
    /// Generic failure, already logged. Also returned by waits while the
    /// bridge is not running.
    Failure,
    /// A bounded wait expired without its condition being met.
    Timeout,
}

impl Status {
    #[inline]
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    #[inline]
    pub fn is_failure(self) -> bool {
        !self.is_success()
    }
}

/// Convenience result alias for fallible setup operations.
pub type BridgeResult<T, E = BridgeError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("shared memory error: {0}")]
    Io(#[from] io::Error),

    #[error("{what} capacity {requested} must be a non-zero power of two")]
    InvalidCapacity { what: &'static str, requested: usize },

    #[error("channel {name} needs at least {required} bytes but only {mem_size} were configured")]
    MemoryTooSmall {
        name: String,
        mem_size: usize,
        required: usize,
    },

    #[error("channel {name} is not a bridge segment (magic {found:#x})")]
    BadMagic { name: String, found: u64 },

    #[error("channel {name} layout mismatch: {field} is {found} here but {expected} in the segment")]
    LayoutMismatch {
        name: String,
        field: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("channel {0} is already bound in this process")]
    AlreadyBound(String),
}

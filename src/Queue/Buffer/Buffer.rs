// This is the fixed-capacity circular buffer both bridge queues are built on

use super::layout::QueueHeader;

use std::marker::PhantomData;
use std::sync::atomic::AtomicU64;

/// A single-producer, single-consumer circular buffer view over shared memory.
///
/// This struct is NOT stored in shared memory. It is a transient, per-process
/// view that holds pointers to a [`QueueHeader`] and the slot array behind it.
///
/// ### Position protocol:
/// - The producer writes slots at its local `write_cursor` and only makes them
///   visible by publishing the cursor into `QueueHeader::write_pos` (Release).
///   Several slots can therefore be written and published as one unit.
/// - The consumer reads slots at its local `read_cursor` and hands them back to
///   the producer by publishing into `QueueHeader::read_pos`. Publication can be
///   deferred (read batches) so slots being inspected are not overwritten.
/// - Positions never decrease; the physical slot is `pos & mask`.
pub struct CircularBuffer<T> {
    /// Pointer to the control block in shared memory.
    pub(crate) header: *const QueueHeader,

    /// Pointer to the first slot.
    pub(crate) slots: *mut T,

    /// Number of slots (power of two).
    pub(crate) capacity: usize,

    /// `capacity - 1`, used to wrap positions onto slots.
    pub(crate) mask: usize,

    /// Producer-side position including writes not yet published.
    pub(crate) write_cursor: AtomicU64,

    /// Consumer-side position including reads not yet published.
    pub(crate) read_cursor: AtomicU64,

    pub(crate) _slot: PhantomData<T>,
}

unsafe impl<T: Send> Send for CircularBuffer<T> {}
unsafe impl<T: Send> Sync for CircularBuffer<T> {}

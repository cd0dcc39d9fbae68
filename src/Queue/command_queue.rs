// Queue of fixed-size message headers

use crate::error::Status;
use crate::Queue::batch::BatchGate;
use crate::Queue::wait::{wait_on, WaitPolicy};
use crate::Queue::Buffer::layout::QueueHeader;
use crate::Queue::Buffer::CircularBuffer;
use crate::Queue::Structs::Header;

/// Circular buffer of [`Header`] records plus the producer batch gate.
///
/// One process pushes, the other peeks and pops. Within the producing
/// process any number of threads may push, serialized by
/// [`CommandQueue::begin_write_batch`] / [`CommandQueue::end_write_batch`].
pub struct CommandQueue {
    pub(crate) buffer: CircularBuffer<Header>,
    gate: BatchGate,
}

impl CommandQueue {
    /// # Safety
    /// Same contract as [`CircularBuffer::new`].
    pub(crate) unsafe fn new(header: *const QueueHeader, slots: *mut Header) -> Self {
        Self {
            buffer: CircularBuffer::new(header, slots),
            gate: BatchGate::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn buffer(&self) -> &CircularBuffer<Header> {
        &self.buffer
    }

    // ---------------------------------------------------------------------
    // Writer side
    // ---------------------------------------------------------------------

    /// Open (or nest) a producer batch for the calling thread.
    pub fn begin_write_batch(&self) -> Status {
        self.gate.begin();
        Status::Success
    }

    /// Close one batch level; returns the headers pushed during the batch,
    /// or 0 when the calling thread holds no batch.
    pub fn end_write_batch(&self) -> usize {
        self.gate.end().unwrap_or(0)
    }

    /// Push a header without waiting. False when the queue is full.
    pub fn try_push(&self, header: Header) -> bool {
        let pushed = self.buffer.push(header);
        if pushed {
            self.gate.record_push();
        }
        pushed
    }

    /// Push a header, waiting for a free slot within `policy`.
    pub fn push(&self, header: Header, policy: &WaitPolicy<'_>) -> Status {
        let signal = &self.buffer.header().space_signal;
        match wait_on(signal, policy, || self.buffer.free_slots() > 0) {
            Status::Success => {
                if self.try_push(header) {
                    Status::Success
                } else {
                    Status::Failure
                }
            }
            other => other,
        }
    }

    // ---------------------------------------------------------------------
    // Reader side
    // ---------------------------------------------------------------------

    /// Number of headers waiting to be popped.
    pub fn len(&self) -> usize {
        self.buffer.available()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The next header, left in the queue.
    pub fn peek(&self) -> Option<Header> {
        self.buffer.peek()
    }

    /// Remove and return the next header.
    ///
    /// Must only be called after a successful wait (or a `peek` that returned
    /// `Some`). Popping an empty queue moves the read cursor past the producer
    /// and leaves the queue unusable; debug builds assert instead.
    pub fn pop_front(&self) -> Header {
        debug_assert!(!self.buffer.is_empty(), "pop_front on an empty command queue");
        let header = unsafe { self.buffer.read_unchecked(0) };
        self.buffer.advance_read(1);
        self.buffer.publish_read();
        header
    }

    /// Block until at least one header is queued.
    pub fn wait_for_header(&self, policy: &WaitPolicy<'_>) -> Status {
        let signal = &self.buffer.header().data_signal;
        wait_on(signal, policy, || !self.buffer.is_empty())
    }

    /// Discard every queued header. Returns how many were dropped.
    pub(crate) fn drain(&self) -> usize {
        let pending = self.buffer.available();
        if pending > 0 {
            self.buffer.advance_read(pending);
            self.buffer.publish_read();
        }
        pending
    }
}

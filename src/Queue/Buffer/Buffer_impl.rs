use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use bytemuck::Pod;

use super::layout::QueueHeader;
use super::Buffer::CircularBuffer;
use crate::Core::futex;

impl<T: Pod> CircularBuffer<T> {
    /// Create a buffer view over an existing, initialized control block.
    ///
    /// Local cursors start at the published positions, so a process can attach
    /// to a queue that already carries traffic.
    ///
    /// # Safety
    /// `header` must point to a [`QueueHeader`] initialized by
    /// [`CircularBuffer::init_header`] and `slots` to `capacity` slots of `T`,
    /// both valid for the lifetime of the view.
    pub unsafe fn new(header: *const QueueHeader, slots: *mut T) -> Self {
        let capacity = (*header).capacity as usize;
        Self {
            header,
            slots,
            capacity,
            mask: capacity - 1,
            write_cursor: AtomicU64::new((*header).write_pos.load(Acquire)),
            read_cursor: AtomicU64::new((*header).read_pos.load(Acquire)),
            _slot: PhantomData,
        }
    }

    /// Write a fresh control block for `capacity` slots of `T`.
    /// This should ONLY be called by the creator process.
    ///
    /// # Safety
    /// Caller guarantees `header` points to writable memory no other view uses yet.
    pub unsafe fn init_header(header: *mut QueueHeader, capacity: usize) {
        let h = &mut *header;
        h.capacity = capacity as u64;
        h.slot_size = Self::slot_stride() as u32;
        h.flags = 0;
        h.data_signal.store(0, Relaxed);
        h.space_signal.store(0, Relaxed);
        h.write_pos.store(0, Relaxed);
        h.read_pos.store(0, Release);
    }

    /// Size in bytes of one slot in memory.
    #[inline]
    pub fn slot_stride() -> usize {
        size_of::<T>()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn header(&self) -> &QueueHeader {
        unsafe { &*self.header }
    }

    #[inline]
    pub(crate) fn index_of(&self, pos: u64) -> usize {
        (pos as usize) & self.mask
    }

    #[inline]
    unsafe fn slot_mut(&self, index: usize) -> *mut T {
        self.slots.add(index)
    }

    /// Raw pointer to the slot at physical `index`.
    ///
    /// # Safety
    /// `index < capacity`; the caller owns the slot under the position protocol.
    #[inline]
    pub(crate) unsafe fn slot_ptr(&self, index: usize) -> *mut T {
        debug_assert!(index < self.capacity);
        self.slot_mut(index)
    }

    // ---------------------------------------------------------------------
    // Producer side
    // ---------------------------------------------------------------------

    /// Producer position including unpublished writes.
    #[inline]
    pub fn write_cursor(&self) -> u64 {
        self.write_cursor.load(Relaxed)
    }

    /// Physical slot the next write lands in.
    #[inline]
    pub fn write_index(&self) -> usize {
        self.index_of(self.write_cursor())
    }

    /// Slots the producer can still fill before it would overrun the consumer.
    #[inline]
    pub fn free_slots(&self) -> usize {
        let read = self.header().read_pos.load(Acquire);
        let used = self.write_cursor().wrapping_sub(read) as usize;
        self.capacity.saturating_sub(used)
    }

    /// Store `value` at the write cursor and advance it without publishing.
    ///
    /// # Safety
    /// Caller must have checked [`CircularBuffer::free_slots`].
    #[inline]
    pub(crate) unsafe fn write_next(&self, value: T) {
        let pos = self.write_cursor();
        ptr::write(self.slot_mut(self.index_of(pos)), value);
        self.write_cursor.store(pos + 1, Relaxed);
    }

    /// Advance the write cursor by `count` slots without touching them.
    pub(crate) fn skip_write(&self, count: usize) {
        self.write_cursor.fetch_add(count as u64, Relaxed);
    }

    /// Make every write up to the cursor visible to the consumer and wake it.
    pub fn publish_write(&self) {
        let header = self.header();
        header.write_pos.store(self.write_cursor(), Release);
        header.data_signal.fetch_add(1, Release);
        futex::futex_wake(&header.data_signal);
    }

    /// Push one slot and publish it. Returns false when the buffer is full.
    pub fn push(&self, value: T) -> bool {
        if self.free_slots() == 0 {
            return false;
        }
        unsafe { self.write_next(value) };
        self.publish_write();
        true
    }

    /// Push all of `values` and publish them together, or nothing at all.
    pub fn push_slice(&self, values: &[T]) -> bool {
        if values.len() > self.free_slots() {
            return false;
        }
        for value in values {
            unsafe { self.write_next(*value) };
        }
        self.publish_write();
        true
    }

    // ---------------------------------------------------------------------
    // Consumer side
    // ---------------------------------------------------------------------

    /// Consumer position including unpublished reads.
    #[inline]
    pub fn read_cursor(&self) -> u64 {
        self.read_cursor.load(Relaxed)
    }

    /// Physical slot the next read comes from.
    #[inline]
    pub fn read_index(&self) -> usize {
        self.index_of(self.read_cursor())
    }

    /// Slots published by the producer and not yet read.
    #[inline]
    pub fn available(&self) -> usize {
        let write = self.header().write_pos.load(Acquire);
        write.wrapping_sub(self.read_cursor()) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Copy of the slot at the read cursor, if one is published.
    pub fn peek(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        Some(unsafe { self.read_unchecked(0) })
    }

    /// Copy of the slot `offset` positions past the read cursor.
    ///
    /// # Safety
    /// Reads whatever the slot holds; the caller guarantees it was published.
    #[inline]
    pub(crate) unsafe fn read_unchecked(&self, offset: usize) -> T {
        let pos = self.read_cursor() + offset as u64;
        ptr::read(self.slot_mut(self.index_of(pos)))
    }

    /// Advance the read cursor by `count` without publishing it.
    pub(crate) fn advance_read(&self, count: usize) {
        self.read_cursor.fetch_add(count as u64, Relaxed);
    }

    /// Hand every slot read so far back to the producer and wake it.
    pub fn publish_read(&self) {
        let header = self.header();
        header.read_pos.store(self.read_cursor(), Release);
        header.space_signal.fetch_add(1, Release);
        futex::futex_wake(&header.space_signal);
    }

    /// Pull one slot and publish the read. `None` when empty.
    pub fn pull(&self) -> Option<T> {
        let value = self.peek()?;
        self.advance_read(1);
        self.publish_read();
        Some(value)
    }

    /// Published positions, for diagnostics.
    pub fn published_positions(&self) -> (u64, u64) {
        let header = self.header();
        (
            header.write_pos.load(Acquire),
            header.read_pos.load(Acquire),
        )
    }
}

// Queue of 32-bit words carrying variable-length payloads

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytemuck::Pod;

use crate::error::Status;
use crate::Queue::wait::{wait_on, WaitPolicy};
use crate::Queue::Buffer::layout::{align_up, QueueHeader, WORD_SIZE};
use crate::Queue::Buffer::CircularBuffer;

/// Written in place of a length prefix when a blob would straddle the end of
/// the buffer: the reader jumps to index 0 of the next lap.
pub const SKIP_MARKER: u32 = u32::MAX;

/// Slots needed for a length-prefixed blob of `size` bytes.
#[inline]
pub const fn words_for(size: usize) -> usize {
    align_up(size, WORD_SIZE) / WORD_SIZE + 1
}

/// Writable window into the data queue handed out by
/// [`DataQueue::begin_blob_push`]. Nothing written here is visible to the
/// reader until [`DataQueue::end_blob_push`].
pub struct BlobSlot<'a> {
    ptr: *mut u8,
    len: usize,
    _queue: PhantomData<&'a DataQueue>,
}

impl<'a> BlobSlot<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Copy `bytes` to the start of the window. Extra input is ignored.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.len);
        self.as_mut_slice()[..n].copy_from_slice(&bytes[..n]);
        n
    }
}

/// Circular buffer of data words with blob framing and read batches.
pub struct DataQueue {
    pub(crate) buffer: CircularBuffer<u32>,
    /// Writer: a two-phase blob is reserved but unpublished.
    blob_open: AtomicBool,
    /// Reader: read positions are held back until `end_batch`.
    read_batch: AtomicBool,
    batch_start: AtomicU64,
}

impl DataQueue {
    /// # Safety
    /// Same contract as [`CircularBuffer::new`].
    pub(crate) unsafe fn new(header: *const QueueHeader, slots: *mut u32) -> Self {
        Self {
            buffer: CircularBuffer::new(header, slots),
            blob_open: AtomicBool::new(false),
            read_batch: AtomicBool::new(false),
            batch_start: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn buffer(&self) -> &CircularBuffer<u32> {
        &self.buffer
    }

    // ---------------------------------------------------------------------
    // Writer side
    // ---------------------------------------------------------------------

    /// Physical index the next word will be written to.
    pub fn write_pos(&self) -> usize {
        self.buffer.write_index()
    }

    /// Slots a write of `words` really consumes, counting the tail that is
    /// skipped when `pos_reset_on_last_index` asks for a contiguous blob.
    pub fn reservation(&self, words: usize, pos_reset_on_last_index: bool) -> usize {
        let index = self.buffer.write_index();
        let tail = self.capacity() - index;
        if pos_reset_on_last_index && index != 0 && words > tail {
            words + tail
        } else {
            words
        }
    }

    /// True when writing `reservation` more slots carries the writer into a
    /// new lap of the buffer (reaching the boundary exactly counts).
    pub fn crosses_lap(&self, reservation: usize) -> bool {
        let cap = self.capacity() as u64;
        let cursor = self.buffer.write_cursor();
        (cursor + reservation as u64) / cap > cursor / cap
    }

    /// Block until `reservation` slots are free.
    pub fn wait_for_space(&self, reservation: usize, policy: &WaitPolicy<'_>) -> Status {
        let signal = &self.buffer.header().space_signal;
        wait_on(signal, policy, || self.buffer.free_slots() >= reservation)
    }

    pub fn free_slots(&self) -> usize {
        self.buffer.free_slots()
    }

    /// Push a single word.
    pub fn push(&self, word: u32) -> Status {
        if self.buffer.push(word) {
            Status::Success
        } else {
            Status::Failure
        }
    }

    /// Push several words as one unit; none are written if they do not all fit.
    pub fn push_many(&self, words: &[u32]) -> Status {
        if self.buffer.push_slice(words) {
            Status::Success
        } else {
            Status::Failure
        }
    }

    /// Reserve a contiguous length-prefixed blob of `size` bytes and return a
    /// pointer to its first payload byte. The write cursor is advanced past
    /// the blob but nothing is published.
    fn reserve_blob(&self, size: usize) -> Option<*mut u8> {
        let words = words_for(size);
        let cap = self.capacity();
        if words >= cap {
            return None;
        }

        let index = self.buffer.write_index();
        let tail = cap - index;
        let skip = if words > tail { tail } else { 0 };
        if self.buffer.free_slots() < words + skip {
            return None;
        }

        unsafe {
            if skip > 0 {
                self.buffer.write_next(SKIP_MARKER);
                self.buffer.skip_write(skip - 1);
            }

            let prefix_index = self.buffer.write_index();
            self.buffer.write_next(size as u32);
            let payload_words = words - 1;
            if payload_words > 0 {
                // Zero the last word so padding never leaks stale bytes.
                ptr::write(self.buffer.slot_ptr(prefix_index + payload_words), 0);
                self.buffer.skip_write(payload_words);
            }
            Some(self.buffer.slot_ptr(prefix_index).add(1) as *mut u8)
        }
    }

    /// Push `bytes` as one length-prefixed, contiguous blob.
    pub fn push_blob(&self, bytes: &[u8]) -> Status {
        match self.reserve_blob(bytes.len()) {
            Some(dst) => {
                unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
                self.buffer.publish_write();
                Status::Success
            }
            None => Status::Failure,
        }
    }

    /// First half of a zero-copy blob write: reserve `size` bytes and hand out
    /// a window the caller fills in place.
    pub fn begin_blob_push(&self, size: usize) -> Option<BlobSlot<'_>> {
        if self.blob_open.load(Ordering::Relaxed) {
            return None;
        }
        let ptr = self.reserve_blob(size)?;
        self.blob_open.store(true, Ordering::Relaxed);
        Some(BlobSlot {
            ptr,
            len: size,
            _queue: PhantomData,
        })
    }

    /// Publish the blob reserved by [`DataQueue::begin_blob_push`].
    pub fn end_blob_push(&self) -> Status {
        if !self.blob_open.swap(false, Ordering::Relaxed) {
            return Status::Failure;
        }
        self.buffer.publish_write();
        Status::Success
    }

    // ---------------------------------------------------------------------
    // Reader side
    // ---------------------------------------------------------------------

    /// Physical index the next read comes from.
    pub fn get_pos(&self) -> usize {
        self.buffer.read_index()
    }

    /// Number of completed laps of the read cursor.
    pub fn read_lap(&self) -> u64 {
        self.buffer.read_cursor() / self.capacity() as u64
    }

    /// Words published and not yet read.
    pub fn available(&self) -> usize {
        self.buffer.available()
    }

    fn finish_read(&self, words: usize) {
        self.buffer.advance_read(words);
        if !self.read_batch.load(Ordering::Relaxed) {
            self.buffer.publish_read();
        }
    }

    /// Pull one word.
    pub fn pull(&self) -> Option<u32> {
        let word = self.buffer.peek()?;
        self.finish_read(1);
        Some(word)
    }

    /// Locate the next blob: skips a wrap marker if present and returns its
    /// byte length, word count and payload pointer without consuming it.
    fn next_blob(&self) -> Option<(usize, usize, *const u8)> {
        let mut prefix = self.buffer.peek()?;
        if prefix == SKIP_MARKER {
            let tail = self.capacity() - self.buffer.read_index();
            self.buffer.advance_read(tail);
            prefix = self.buffer.peek()?;
        }

        let len = prefix as usize;
        let words = words_for(len);
        if words > self.buffer.available() {
            log::error!(
                "DataQueue: blob of {} bytes announced but only {} words are available",
                len,
                self.buffer.available()
            );
            return None;
        }

        let index = self.buffer.read_index();
        let payload = unsafe { self.buffer.slot_ptr(index).add(1) as *const u8 };
        Some((len, words, payload))
    }

    /// Pull a blob into a fresh buffer.
    pub fn pull_blob(&self) -> Option<Vec<u8>> {
        let (len, words, src) = self.next_blob()?;
        let mut out = vec![0u8; len];
        unsafe { ptr::copy_nonoverlapping(src, out.as_mut_ptr(), len) };
        self.finish_read(words);
        Some(out)
    }

    /// Pull a blob, copying at most `out.len()` bytes of it into `out`.
    /// Returns the blob's full length.
    pub fn pull_into(&self, out: &mut [u8]) -> Option<usize> {
        let (len, words, src) = self.next_blob()?;
        let n = len.min(out.len());
        unsafe { ptr::copy_nonoverlapping(src, out.as_mut_ptr(), n) };
        self.finish_read(words);
        Some(len)
    }

    /// Pull a blob straight into `obj`. Returns the blob's length, which the
    /// caller compares against `size_of::<T>()`.
    pub fn pull_and_copy<T: Pod>(&self, obj: &mut T) -> Option<usize> {
        self.pull_into(bytemuck::bytes_of_mut(obj))
    }

    /// Hold back read positions until [`DataQueue::end_batch`].
    pub fn begin_batch(&self) -> Status {
        if self.read_batch.swap(true, Ordering::Relaxed) {
            return Status::Failure;
        }
        self.batch_start
            .store(self.buffer.read_cursor(), Ordering::Relaxed);
        Status::Success
    }

    /// Publish everything read during the batch; returns the words consumed.
    pub fn end_batch(&self) -> usize {
        if !self.read_batch.swap(false, Ordering::Relaxed) {
            return 0;
        }
        self.buffer.publish_read();
        let start = self.batch_start.load(Ordering::Relaxed);
        self.buffer.read_cursor().wrapping_sub(start) as usize
    }

    /// Discard every published word. Returns how many were dropped.
    /// Inside a read batch the release is deferred like any other read.
    pub(crate) fn drain(&self) -> usize {
        let pending = self.buffer.available();
        self.finish_read(pending);
        pending
    }
}

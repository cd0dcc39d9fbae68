use super::*;
use std::sync::atomic::Ordering;

/// Read-only accessors for a mapped channel segment.
///
/// Used by the bridge for the loop flag and by debugging/monitoring code.
impl ChannelSegment {
    /// Name of the segment under /dev/shm.
    pub fn name(&self) -> &str {
        self.shm.name()
    }

    /// Get a reference to the underlying shared memory backend
    pub fn shm(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Get the raw pointer to the ChannelHeader
    pub fn header_ptr(&self) -> *const ChannelHeader {
        self.header
    }

    pub(crate) fn header(&self) -> &ChannelHeader {
        unsafe { &*self.header }
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn size(&self) -> &ChannelSize {
        &self.size
    }

    /// True when this process created (and will unlink) the segment.
    pub fn is_owner(&self) -> bool {
        self.shm.is_owner()
    }

    /// Check if the segment has been properly initialized
    ///
    /// Returns true if the magic number in the header matches the expected value.
    pub fn is_initialized(&self) -> bool {
        !self.header.is_null() && self.header().magic == CHANNEL_MAGIC
    }

    /// Current value of the reader loop flag.
    pub fn reader_loop_flag(&self) -> bool {
        self.header().reader_loop_flag.load(Ordering::Acquire) != 0
    }

    /// Number of times the writer has set the reader loop flag.
    pub fn loop_events(&self) -> u64 {
        self.header().loop_events.load(Ordering::Relaxed)
    }
}

// One direction of the bridge: command queue, data queue and loop flag

use std::sync::atomic::Ordering;

use crate::error::BridgeResult;
use crate::Core::alloc::{ChannelSegment, ChannelSize};
use crate::Core::futex;
use crate::Queue::{CommandQueue, DataQueue};

/// A mapped channel segment with queue views over it.
///
/// The same type serves both ends: the writer process only uses the producer
/// half of each queue, the reader process only the consumer half.
pub struct Channel {
    pub(crate) commands: CommandQueue,
    pub(crate) data: DataQueue,
    // Declared last so the queue views are gone before the mapping is.
    segment: ChannelSegment,
}

/// Outbound channel of a process.
pub type WriterChannel = Channel;
/// Inbound channel of a process.
pub type ReaderChannel = Channel;

impl Channel {
    /// Create and initialize the named segment.
    pub fn create(name: &str, size: &ChannelSize) -> BridgeResult<Self> {
        Ok(Self::from_segment(ChannelSegment::create(name, size)?))
    }

    /// Attach to a segment created by the peer.
    pub fn attach(name: &str, size: &ChannelSize) -> BridgeResult<Self> {
        Ok(Self::from_segment(ChannelSegment::attach(name, size)?))
    }

    fn from_segment(segment: ChannelSegment) -> Self {
        let (commands, data) = unsafe {
            (
                CommandQueue::new(segment.cmd_queue_header(), segment.cmd_slots()),
                DataQueue::new(segment.data_queue_header(), segment.data_slots()),
            )
        };
        Self {
            commands,
            data,
            segment,
        }
    }

    pub fn name(&self) -> &str {
        self.segment.name()
    }

    pub fn segment(&self) -> &ChannelSegment {
        &self.segment
    }

    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    pub fn data(&self) -> &DataQueue {
        &self.data
    }

    pub fn reader_loop_flag(&self) -> bool {
        self.segment.reader_loop_flag()
    }

    /// Writer: mark that the data cursor has started a new lap.
    pub(crate) fn set_reader_loop_flag(&self) {
        let header = self.segment.header();
        header.reader_loop_flag.store(1, Ordering::Release);
        header.loop_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Reader: acknowledge the lap. Returns true if the flag was set.
    pub(crate) fn clear_reader_loop_flag(&self) -> bool {
        let header = self.segment.header();
        let was_set = header.reader_loop_flag.swap(0, Ordering::AcqRel) != 0;
        if was_set {
            // A writer may be parked in sync_data_queue waiting for this.
            futex::futex_wake(&header.reader_loop_flag);
        }
        was_set
    }

    /// Futex word a writer parks on until the reader clears the loop flag.
    pub(crate) fn loop_flag_word(&self) -> &std::sync::atomic::AtomicU32 {
        &self.segment.header().reader_loop_flag
    }

    pub fn loop_events(&self) -> u64 {
        self.segment.loop_events()
    }
}

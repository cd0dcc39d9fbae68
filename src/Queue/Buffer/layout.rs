use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// "DMXPBRDG": identifies a channel segment written by this crate.
pub const CHANNEL_MAGIC: u64 = 0x444D_5850_4252_4447;

/// Bumped whenever the shared layout below changes.
pub const LAYOUT_VERSION: u32 = 1;

/// Width in bytes of one data queue slot.
pub const WORD_SIZE: usize = std::mem::size_of::<u32>();

/// Every region inside a channel segment starts on this boundary.
pub const REGION_ALIGN: usize = 128;

/// Control block for one circular buffer.
///
/// Lives in shared memory directly in front of the buffer's slots. The two
/// position counters are monotonic slot counts; the physical index of a
/// position is `pos & (capacity - 1)`. Only the producer stores `write_pos`
/// and only the consumer stores `read_pos`.
#[repr(C, align(128))]
pub struct QueueHeader {
    /// Number of slots. Always a power of two.
    pub capacity: u64,

    /// Size in bytes of one slot, checked on attach.
    pub slot_size: u32,

    /// Reserved for per-queue flags.
    pub flags: u32,

    /// Futex word bumped every time the producer publishes `write_pos`.
    /// Consumers park on it while the queue is empty.
    pub data_signal: AtomicU32,

    /// Futex word bumped every time the consumer publishes `read_pos`.
    /// Producers park on it while the queue is full.
    pub space_signal: AtomicU32,

    /// Slots produced so far. Padded to keep the two cursors off one line.
    pub write_pos: CachePadded<AtomicU64>,

    /// Slots consumed so far.
    pub read_pos: CachePadded<AtomicU64>,
}

/// Header at offset 0 of every channel segment.
///
/// Both processes validate it: compatibility requires the same word width,
/// header record size and capacities on each end, nothing is negotiated.
#[repr(C, align(128))]
pub struct ChannelHeader {
    pub magic: u64,
    pub version: u32,

    /// `WORD_SIZE` of the writer.
    pub word_size: u32,

    /// Total segment size requested by the creator.
    pub mem_size: u64,

    pub cmd_capacity: u64,
    pub data_capacity: u64,

    /// `size_of::<Header>()` of the writer.
    pub header_size: u32,

    /// Set by the writer when its data cursor laps the buffer, cleared by
    /// the reader the first time its own cursor wraps back past index 0.
    pub reader_loop_flag: AtomicU32,

    /// Number of times the writer has set `reader_loop_flag`.
    pub loop_events: AtomicU64,
}

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Byte offsets of the regions inside a channel segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub cmd_header_offset: usize,
    pub cmd_slots_offset: usize,
    pub data_header_offset: usize,
    pub data_slots_offset: usize,
    /// Minimum segment size that fits everything.
    pub required_size: usize,
}

impl ChannelLayout {
    /// Compute the layout for a channel with the given capacities and
    /// command record size.
    pub fn compute(cmd_capacity: usize, data_capacity: usize, header_size: usize) -> Self {
        let queue_header = std::mem::size_of::<QueueHeader>();

        let cmd_header_offset = align_up(std::mem::size_of::<ChannelHeader>(), REGION_ALIGN);
        let cmd_slots_offset = cmd_header_offset + align_up(queue_header, REGION_ALIGN);
        let data_header_offset =
            align_up(cmd_slots_offset + cmd_capacity * header_size, REGION_ALIGN);
        let data_slots_offset = data_header_offset + align_up(queue_header, REGION_ALIGN);
        let required_size = align_up(data_slots_offset + data_capacity * WORD_SIZE, REGION_ALIGN);

        Self {
            cmd_header_offset,
            cmd_slots_offset,
            data_header_offset,
            data_slots_offset,
            required_size,
        }
    }
}

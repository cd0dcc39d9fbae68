use crate::error::{BridgeError, BridgeResult};
use crate::Core::SharedMemory::{attach_shared_memory, create_shared_memory, SharedMemoryBackend};
use crate::Queue::Buffer::layout::{
    ChannelHeader, ChannelLayout, QueueHeader, CHANNEL_MAGIC, LAYOUT_VERSION, REGION_ALIGN,
    WORD_SIZE,
};
use crate::Queue::Buffer::CircularBuffer;
use crate::Queue::Structs::Header;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
mod debug;
mod getters;

/// Largest data queue accepted, in words. Keeps `data_offset` and blob
/// length prefixes inside a `u32`.
pub const MAX_DATA_CAPACITY: usize = 1 << 30;

/// Requested geometry of one channel segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSize {
    /// Total bytes of the segment.
    pub mem_size: usize,
    /// Command queue slots (power of two).
    pub cmd_capacity: usize,
    /// Data queue words (power of two).
    pub data_capacity: usize,
}

impl ChannelSize {
    pub const fn new(mem_size: usize, cmd_capacity: usize, data_capacity: usize) -> Self {
        Self {
            mem_size,
            cmd_capacity,
            data_capacity,
        }
    }

    /// Check capacities and compute where everything goes.
    pub fn layout(&self, name: &str) -> BridgeResult<ChannelLayout> {
        check_capacity("command queue", self.cmd_capacity)?;
        check_capacity("data queue", self.data_capacity)?;
        if self.data_capacity > MAX_DATA_CAPACITY {
            return Err(BridgeError::InvalidCapacity {
                what: "data queue",
                requested: self.data_capacity,
            });
        }

        let layout = ChannelLayout::compute(
            self.cmd_capacity,
            self.data_capacity,
            std::mem::size_of::<Header>(),
        );
        if layout.required_size > self.mem_size {
            return Err(BridgeError::MemoryTooSmall {
                name: name.to_string(),
                mem_size: self.mem_size,
                required: layout.required_size,
            });
        }
        Ok(layout)
    }
}

fn check_capacity(what: &'static str, capacity: usize) -> BridgeResult<()> {
    if capacity == 0 || !capacity.is_power_of_two() {
        return Err(BridgeError::InvalidCapacity {
            what,
            requested: capacity,
        });
    }
    Ok(())
}

/// One mapped channel segment: the channel header and the two queue regions.
///
/// Only pointers into the mapping are handed out; the queue views built on
/// top of them must not outlive the segment.
pub struct ChannelSegment {
    shm: Box<dyn SharedMemoryBackend>,
    header: *mut ChannelHeader,
    layout: ChannelLayout,
    size: ChannelSize,
}

impl ChannelSegment {
    /// Create the named segment and write fresh headers into it.
    pub fn create(name: &str, size: &ChannelSize) -> BridgeResult<Self> {
        let layout = size.layout(name)?;
        let shm = create_shared_memory(size.mem_size, name)?;

        let header = shm.as_ptr() as *mut ChannelHeader;
        if (header as usize) % REGION_ALIGN != 0 {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            )));
        }

        // The mapping starts zeroed; queue headers first, magic last so an
        // attaching process never sees a half-written segment as valid.
        unsafe {
            CircularBuffer::<Header>::init_header(
                shm.as_ptr().add(layout.cmd_header_offset) as *mut QueueHeader,
                size.cmd_capacity,
            );
            CircularBuffer::<u32>::init_header(
                shm.as_ptr().add(layout.data_header_offset) as *mut QueueHeader,
                size.data_capacity,
            );

            std::ptr::write(
                header,
                ChannelHeader {
                    magic: 0,
                    version: LAYOUT_VERSION,
                    word_size: WORD_SIZE as u32,
                    mem_size: size.mem_size as u64,
                    cmd_capacity: size.cmd_capacity as u64,
                    data_capacity: size.data_capacity as u64,
                    header_size: std::mem::size_of::<Header>() as u32,
                    reader_loop_flag: AtomicU32::new(0),
                    loop_events: AtomicU64::new(0),
                },
            );
            std::sync::atomic::fence(Ordering::Release);
            std::ptr::write_volatile(&mut (*header).magic, CHANNEL_MAGIC);
        }

        log::debug!(
            "ChannelSegment::create(): {} ({} bytes, {} commands, {} words)",
            name,
            size.mem_size,
            size.cmd_capacity,
            size.data_capacity
        );

        Ok(Self {
            shm,
            header,
            layout,
            size: *size,
        })
    }

    /// Attach to a segment created by the peer and check it matches `size`.
    pub fn attach(name: &str, size: &ChannelSize) -> BridgeResult<Self> {
        let layout = size.layout(name)?;
        let shm = attach_shared_memory(name, size.mem_size)?;

        let header = shm.as_ptr() as *mut ChannelHeader;
        if (header as usize) % REGION_ALIGN != 0 {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            )));
        }

        let h = unsafe { &*header };
        let magic = unsafe { std::ptr::read_volatile(&h.magic) };
        std::sync::atomic::fence(Ordering::Acquire);
        if magic != CHANNEL_MAGIC {
            return Err(BridgeError::BadMagic {
                name: name.to_string(),
                found: magic,
            });
        }

        let checks: [(&'static str, u64, u64); 6] = [
            ("version", h.version as u64, LAYOUT_VERSION as u64),
            ("word_size", h.word_size as u64, WORD_SIZE as u64),
            ("header_size", h.header_size as u64, std::mem::size_of::<Header>() as u64),
            ("mem_size", h.mem_size, size.mem_size as u64),
            ("cmd_capacity", h.cmd_capacity, size.cmd_capacity as u64),
            ("data_capacity", h.data_capacity, size.data_capacity as u64),
        ];
        for (field, expected, found) in checks {
            if expected != found {
                return Err(BridgeError::LayoutMismatch {
                    name: name.to_string(),
                    field,
                    expected,
                    found,
                });
            }
        }

        log::debug!("ChannelSegment::attach(): {}", name);

        Ok(Self {
            shm,
            header,
            layout,
            size: *size,
        })
    }

    /// Pointer to the command queue's control block.
    pub(crate) fn cmd_queue_header(&self) -> *mut QueueHeader {
        unsafe { self.shm.as_ptr().add(self.layout.cmd_header_offset) as *mut QueueHeader }
    }

    pub(crate) fn cmd_slots(&self) -> *mut Header {
        unsafe { self.shm.as_ptr().add(self.layout.cmd_slots_offset) as *mut Header }
    }

    pub(crate) fn data_queue_header(&self) -> *mut QueueHeader {
        unsafe { self.shm.as_ptr().add(self.layout.data_header_offset) as *mut QueueHeader }
    }

    pub(crate) fn data_slots(&self) -> *mut u32 {
        unsafe { self.shm.as_ptr().add(self.layout.data_slots_offset) as *mut u32 }
    }
}

// The segment only hands out raw pointers; synchronization is the queues' job.
unsafe impl Send for ChannelSegment {}
unsafe impl Sync for ChannelSegment {}

pub mod SharedMemory;
pub mod alloc;
pub mod futex;

pub use alloc::{ChannelSegment, ChannelSize};
pub use SharedMemory::{
    attach_shared_memory, create_shared_memory, unlink_shared_memory, RawHandle,
    SharedMemoryBackend,
};

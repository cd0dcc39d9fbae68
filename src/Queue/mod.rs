pub mod batch;
pub mod command_queue;
pub mod data_queue;
pub mod wait;

pub use command_queue::CommandQueue;
pub use data_queue::{words_for, BlobSlot, DataQueue, SKIP_MARKER};
pub use wait::WaitPolicy;
pub use Structs::{CommandId, Flags, Header};

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::CircularBuffer; // re-export for stable path
}

pub mod Structs {
    pub mod Command_Structs;
    pub use Command_Structs::{CommandId, Flags, Header}; // re-export for stable path
}

use super::*;
use crate::Bridge::{Bridge, BridgeId, Channel};
use crate::Queue::{CommandQueue, DataQueue};
use std::fmt;

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for ChannelSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_channel_segment(self, f)
    }
}

impl<T: bytemuck::Pod> fmt::Debug for CircularBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_circular_buffer(self, f)
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_command_queue(self, f)
    }
}

impl fmt::Debug for DataQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_data_queue(self, f)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_channel(self, f)
    }
}

impl<R: BridgeId> fmt::Debug for Bridge<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_bridge(self, f)
    }
}

use std::fmt;
use crate::Bridge::{Bridge, BridgeId, Channel};
use crate::Core::alloc::ChannelSegment;
use crate::Queue::Buffer::CircularBuffer;
use crate::Queue::{CommandQueue, DataQueue};

/// Debug function for ChannelSegment
///
/// Shows the segment name, geometry and the shared flags without touching
/// queue contents:
/// - Header pointer location
/// - Requested sizes
/// - Ownership and initialization status
pub fn debug_channel_segment(segment: &ChannelSegment, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelSegment")
        .field("name", &segment.name())
        .field("shm", &"<opaque>")
        .field("header", &format_args!("{:p}", segment.header_ptr()))
        .field("size", segment.size())
        .field("owner", &segment.is_owner())
        .field("initialized", &segment.is_initialized())
        .field("reader_loop_flag", &segment.reader_loop_flag())
        .field("loop_events", &segment.loop_events())
        .finish()
}

/// Debug function for CircularBuffer
///
/// Local cursors next to the published positions; slots are never read.
pub fn debug_circular_buffer<T: bytemuck::Pod>(buffer: &CircularBuffer<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (write_pos, read_pos) = buffer.published_positions();
    f.debug_struct("CircularBuffer")
        .field("slots", &format_args!("0x{:x}", buffer.slots as usize))
        .field("capacity", &buffer.capacity())
        .field("write_cursor", &buffer.write_cursor())
        .field("read_cursor", &buffer.read_cursor())
        .field("write_pos", &write_pos)
        .field("read_pos", &read_pos)
        .finish()
}

pub fn debug_command_queue(queue: &CommandQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommandQueue")
        .field("buffer", queue.buffer())
        .field("queued", &queue.len())
        .finish_non_exhaustive()
}

pub fn debug_data_queue(queue: &DataQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DataQueue")
        .field("buffer", queue.buffer())
        .field("write_index", &queue.write_pos())
        .field("read_index", &queue.get_pos())
        .finish_non_exhaustive()
}

pub fn debug_channel(channel: &Channel, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
        .field("segment", channel.segment())
        .field("commands", channel.commands())
        .field("data", channel.data())
        .finish()
}

/// Debug function for Bridge
///
/// Role, side, both channels and the counters.
pub fn debug_bridge<R: BridgeId>(bridge: &Bridge<R>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Bridge")
        .field("role", &R::NAME)
        .field("side", &bridge.side())
        .field("running", &bridge.is_running())
        .field("counter", &bridge.get_counter())
        .field("send_failures", &bridge.send_failures())
        .field("writer", bridge.writer_channel())
        .field("reader", bridge.reader_channel())
        .finish()
}

// Command queue record shared by both processes

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

/// Identifier of one logical operation carried by a [`Header`].
///
/// Values below [`CommandId::FIRST_USER`] are reserved for the bridge itself;
/// the interception layer assigns everything above.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct CommandId(pub u32);

impl CommandId {
    /// Wildcard for waits; never sent.
    pub const ANY: CommandId = CommandId(0);
    pub const INVALID: CommandId = CommandId(1);
    pub const SYN: CommandId = CommandId(2);
    pub const ACK: CommandId = CommandId(3);
    pub const CONTINUE: CommandId = CommandId(4);
    pub const TERMINATE: CommandId = CommandId(5);
    /// Reply to an earlier command, matched by uid.
    pub const RESPONSE: CommandId = CommandId(6);
    pub const DEBUG_MESSAGE: CommandId = CommandId(7);

    /// First id available to callers.
    pub const FIRST_USER: u32 = 0x100;

    /// True when `self` satisfies a wait for `expected`.
    #[inline]
    pub fn matches(self, expected: CommandId) -> bool {
        expected == CommandId::ANY || self == expected
    }
}

bitflags! {
    /// Opaque per-command flag bits.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// The sender will wait for a `RESPONSE` carrying this command's uid.
        const RESPONSE_EXPECTED = 1 << 0;
    }
}

/// Fixed-size record describing one message.
///
/// ABI-stable across both processes; all fields are little-endian.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Header {
    pub command: CommandId,
    /// Raw [`Flags`] bits; unknown bits are carried through untouched.
    pub flags: u32,
    /// Opaque handle of the object the command targets.
    pub handle: u32,
    /// Data queue write index once this message's payload was written.
    pub data_offset: u32,
    /// Sender-assigned message id; responses echo the request's uid.
    pub uid: u64,
}

impl Header {
    pub fn new(command: CommandId, handle: u32, flags: Flags) -> Self {
        Self {
            command,
            flags: flags.bits(),
            handle,
            data_offset: 0,
            uid: 0,
        }
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        Flags::from_bits_retain(self.flags)
    }
}

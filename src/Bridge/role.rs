// Type-level identity of a bridge binding and the runtime side it plays

mod sealed {
    pub trait Sealed {}
}

/// Closed set of marker types that tag a [`crate::Bridge::Bridge`].
///
/// Behaviour is identical for every role; the tag only keeps two bindings in
/// one process from being mixed up and selects the configuration keys used
/// for their channel sizes.
pub trait BridgeId: sealed::Sealed + Send + Sync + 'static {
    /// Shown in logs and `Debug` output.
    const NAME: &'static str;

    /// Configuration key prefix for the client-to-server channel.
    const CLIENT_KEY: &'static str;

    /// Configuration key prefix for the server-to-client channel.
    const SERVER_KEY: &'static str;
}

/// Binding used by the interception module for its own control traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {}

/// Binding that carries replicated device calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {}

impl sealed::Sealed for Module {}
impl sealed::Sealed for Device {}

impl BridgeId for Module {
    const NAME: &'static str = "Module";
    const CLIENT_KEY: &'static str = "module_client";
    const SERVER_KEY: &'static str = "module_server";
}

impl BridgeId for Device {
    const NAME: &'static str = "Device";
    const CLIENT_KEY: &'static str = "client";
    const SERVER_KEY: &'static str = "server";
}

/// Which end of the bridge this process is.
///
/// The client creates both channel segments, the server attaches to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
}

/// Suffix of the segment the client writes and the server reads.
pub const CLIENT_TO_SERVER: &str = "Client2Server";
/// Suffix of the segment the server writes and the client reads.
pub const SERVER_TO_CLIENT: &str = "Server2Client";

/// Every segment name starts with this, which lets tests and tools find
/// leftovers in /dev/shm.
pub const SEGMENT_PREFIX: &str = "dmxp_";

impl Side {
    pub fn peer(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }

    /// True for the side that creates (and unlinks) the segments.
    pub fn creates_segments(self) -> bool {
        self == Side::Client
    }

    /// Direction suffix of this side's outbound channel.
    pub fn writer_suffix(self) -> &'static str {
        match self {
            Side::Client => CLIENT_TO_SERVER,
            Side::Server => SERVER_TO_CLIENT,
        }
    }

    /// Direction suffix of this side's inbound channel.
    pub fn reader_suffix(self) -> &'static str {
        self.peer().writer_suffix()
    }
}

/// Full segment name for `base_name` in the given direction.
pub fn segment_name(base_name: &str, suffix: &str) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, base_name, suffix)
}

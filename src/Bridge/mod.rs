pub mod channel;
pub mod command;
pub mod response;
pub mod role;
pub mod transport;

pub use channel::{Channel, ReaderChannel, WriterChannel};
pub use command::Command;
pub use role::{BridgeId, Device, Module, Side};
pub use transport::{Bridge, INFINITE_TIMEOUT};

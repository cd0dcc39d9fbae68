// Module naming follows project convention (Core / Queue / Bridge)
#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Queue;

#[allow(non_snake_case)]
pub mod Bridge;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod config;
pub mod error;

pub use config::{BridgeConfig, BridgeOptions};
pub use error::{BridgeError, BridgeResult, Status};
pub use Bridge::{Bridge as Transport, BridgeId, Command, Device, Module, Side, INFINITE_TIMEOUT};
pub use Queue::{CommandId, Flags, Header};

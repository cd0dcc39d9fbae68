//! Bridge configuration.
//!
//! Options come from a TOML file (`bridge.conf` in the working directory, or
//! the path in `DMXP_BRIDGE_CONFIG`). Every key is optional; a missing or
//! unreadable file yields the defaults.

use log::{debug, error};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::Bridge::role::{BridgeId, CLIENT_TO_SERVER, SERVER_TO_CLIENT};
use crate::Core::alloc::ChannelSize;

/// File read by [`BridgeOptions::load`] when no override is set.
pub const DEFAULT_CONFIG_FILE: &str = "bridge.conf";

/// Environment variable overriding [`DEFAULT_CONFIG_FILE`].
pub const CONFIG_ENV: &str = "DMXP_BRIDGE_CONFIG";

const KIB: usize = 1 << 10;
const MIB: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Default timeout of acknowledgment waits, and of `wait_for_command`
    /// when called with a zero timeout.
    pub ack_timeout_ms: u32,
    /// Whether the server answers every command instead of only the ones
    /// that need a result.
    pub send_all_server_responses: bool,
    /// Longest single park inside a blocking wait before the liveness and
    /// early-out flags are re-checked.
    pub poll_interval_us: u64,
    /// Passes `ensure_queue_empty` makes before giving up.
    pub drain_attempts: u32,

    pub module_client_channel_mem_size: usize,
    pub module_client_cmd_queue_size: usize,
    pub module_client_data_queue_size: usize,
    pub module_server_channel_mem_size: usize,
    pub module_server_cmd_queue_size: usize,
    pub module_server_data_queue_size: usize,

    pub client_channel_mem_size: usize,
    pub client_cmd_queue_size: usize,
    pub client_data_queue_size: usize,
    pub server_channel_mem_size: usize,
    pub server_cmd_queue_size: usize,
    pub server_data_queue_size: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 1000,
            send_all_server_responses: false,
            poll_interval_us: 500,
            drain_attempts: 16,

            module_client_channel_mem_size: 4 * MIB,
            module_client_cmd_queue_size: 256,
            module_client_data_queue_size: 256 * KIB,
            module_server_channel_mem_size: 4 * MIB,
            module_server_cmd_queue_size: 256,
            module_server_data_queue_size: 256 * KIB,

            client_channel_mem_size: 64 * MIB,
            client_cmd_queue_size: 4096,
            client_data_queue_size: 4 * MIB,
            server_channel_mem_size: 4 * MIB,
            server_cmd_queue_size: 1024,
            server_data_queue_size: 256 * KIB,
        }
    }
}

/// Everything `Bridge::init` needs to bind both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Shared by both processes; segment names are derived from it.
    pub base_name: String,
    pub client_to_server: ChannelSize,
    pub server_to_client: ChannelSize,
}

impl BridgeConfig {
    pub fn new(base_name: impl Into<String>, client_to_server: ChannelSize, server_to_client: ChannelSize) -> Self {
        Self {
            base_name: base_name.into(),
            client_to_server,
            server_to_client,
        }
    }
}

impl BridgeOptions {
    /// Parse options from TOML text; falls back to the defaults if the text
    /// is not a valid configuration.
    pub fn from_toml_str(config: &str) -> BridgeOptions {
        match toml::from_str(config) {
            Ok(options) => options,
            Err(err) => {
                error!("failed to parse bridge config '{}'", err);
                BridgeOptions::default()
            }
        }
    }

    /// Read options from the TOML file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> BridgeOptions {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => {
                debug!("reading bridge config from path: '{}'", path.display());
                Self::from_toml_str(&text)
            }
            Err(err) => {
                error!("failed to read bridge config '{}': {}", path.display(), err);
                BridgeOptions::default()
            }
        }
    }

    /// Options from `$DMXP_BRIDGE_CONFIG`, else `bridge.conf` if it exists,
    /// else the defaults.
    pub fn load() -> BridgeOptions {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_path(path);
        }
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_path(DEFAULT_CONFIG_FILE);
        }
        debug!("no bridge config found, using defaults");
        BridgeOptions::default()
    }

    fn channel_size(&self, key: &str) -> ChannelSize {
        match key {
            "module_client" => ChannelSize::new(
                self.module_client_channel_mem_size,
                self.module_client_cmd_queue_size,
                self.module_client_data_queue_size,
            ),
            "module_server" => ChannelSize::new(
                self.module_server_channel_mem_size,
                self.module_server_cmd_queue_size,
                self.module_server_data_queue_size,
            ),
            "client" => ChannelSize::new(
                self.client_channel_mem_size,
                self.client_cmd_queue_size,
                self.client_data_queue_size,
            ),
            _ => ChannelSize::new(
                self.server_channel_mem_size,
                self.server_cmd_queue_size,
                self.server_data_queue_size,
            ),
        }
    }

    /// Channel sizes for bridge role `R`.
    pub fn bridge_config<R: BridgeId>(&self, base_name: impl Into<String>) -> BridgeConfig {
        BridgeConfig::new(
            base_name,
            self.channel_size(R::CLIENT_KEY),
            self.channel_size(R::SERVER_KEY),
        )
    }
}

/// Prefix of the options sizing the channel called `segment_name`, used to
/// tell the user what to enlarge when a queue runs out of room.
pub fn option_for_channel<R: BridgeId>(segment_name: &str) -> &'static str {
    if segment_name.ends_with(CLIENT_TO_SERVER) {
        R::CLIENT_KEY
    } else if segment_name.ends_with(SERVER_TO_CLIENT) {
        R::SERVER_KEY
    } else {
        "unknown"
    }
}

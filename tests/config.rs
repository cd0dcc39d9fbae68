use dmxp_bridge::Bridge::{Device, Module};
use dmxp_bridge::Core::alloc::ChannelSize;
use dmxp_bridge::config::option_for_channel;
use dmxp_bridge::BridgeOptions;
use std::io::Write;

#[test]
fn test_defaults() {
    let options = BridgeOptions::default();
    assert_eq!(options.ack_timeout_ms, 1000);
    assert!(!options.send_all_server_responses);
    assert_eq!(options.client_channel_mem_size, 64 << 20);
    assert_eq!(options.client_cmd_queue_size, 4096);
    assert_eq!(options.module_server_data_queue_size, 256 << 10);
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let options = BridgeOptions::from_toml_str(
        r#"
        ack_timeout_ms = 250
        send_all_server_responses = true
        client_data_queue_size = 65536
        "#,
    );
    assert_eq!(options.ack_timeout_ms, 250);
    assert!(options.send_all_server_responses);
    assert_eq!(options.client_data_queue_size, 65536);
    assert_eq!(options.client_cmd_queue_size, BridgeOptions::default().client_cmd_queue_size);
}

#[test]
fn test_invalid_toml_falls_back_to_defaults() {
    let options = BridgeOptions::from_toml_str("ack_timeout_ms = \"soon\"");
    assert_eq!(options, BridgeOptions::default());
}

#[test]
fn test_from_path() {
    let path = std::env::temp_dir().join(format!("dmxp_bridge_conf_{}.toml", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "server_cmd_queue_size = 64").unwrap();
        writeln!(file, "drain_attempts = 3").unwrap();
    }
    let options = BridgeOptions::from_path(&path);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(options.server_cmd_queue_size, 64);
    assert_eq!(options.drain_attempts, 3);

    // A missing file is not an error
    assert_eq!(BridgeOptions::from_path(&path), BridgeOptions::default());
}

#[test]
fn test_bridge_config_per_role() {
    let options = BridgeOptions::from_toml_str(
        r#"
        module_client_channel_mem_size = 1048576
        module_client_cmd_queue_size = 32
        module_client_data_queue_size = 1024
        "#,
    );

    let module = options.bridge_config::<Module>("Capture");
    assert_eq!(module.base_name, "Capture");
    assert_eq!(module.client_to_server, ChannelSize::new(1 << 20, 32, 1024));
    assert_eq!(
        module.server_to_client.cmd_capacity,
        options.module_server_cmd_queue_size
    );

    let device = options.bridge_config::<Device>("Capture");
    assert_eq!(device.client_to_server.mem_size, options.client_channel_mem_size);
    assert_eq!(device.server_to_client.data_capacity, options.server_data_queue_size);
}

#[test]
fn test_option_for_channel() {
    assert_eq!(option_for_channel::<Device>("dmxp_DemoClient2Server"), "client");
    assert_eq!(option_for_channel::<Device>("dmxp_DemoServer2Client"), "server");
    assert_eq!(option_for_channel::<Module>("dmxp_DemoClient2Server"), "module_client");
    assert_eq!(option_for_channel::<Module>("dmxp_DemoServer2Client"), "module_server");
    assert_eq!(option_for_channel::<Module>("dmxp_other"), "unknown");
}

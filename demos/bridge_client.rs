// In demos/bridge_client.rs
// Creates the bridge segments, streams hashed messages to the server and
// waits for it to confirm how many it verified.
use dmxp_bridge::Bridge::{Bridge, Command, Device, Side};
use dmxp_bridge::{BridgeOptions, CommandId, Flags, Status};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command id carrying one `message_<i>` payload followed by its hash.
const CMD_MESSAGE: CommandId = CommandId(CommandId::FIRST_USER + 1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages> [base_name]", args[0]);
        std::process::exit(1);
    }

    let num_messages: u32 = args[1].parse().expect("Invalid number of messages");
    let base_name = args.get(2).cloned().unwrap_or_else(|| "Demo".to_string());

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);

    // Handle Ctrl+C to stop every blocking wait
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let options = BridgeOptions::load();
    let config = options.bridge_config::<Device>(base_name);
    let bridge = Bridge::<Device>::init(Side::Client, &config, options, Arc::clone(&running))?;
    println!("Client: created {} and {}", bridge.writer_channel().name(), bridge.reader_channel().name());

    // Handshake: the server may take a while to attach
    drop(Command::new(&bridge, CommandId::SYN));
    if bridge.wait_for_command_and_discard(CommandId::ACK, 30_000, None) != Status::Success {
        eprintln!("Client: server never acknowledged");
        std::process::exit(1);
    }
    println!("Client: server attached, sending {} messages", num_messages);

    let start = std::time::Instant::now();
    for i in 0..num_messages {
        let payload = format!("message_{}", i);
        let digest = Sha256::digest(payload.as_bytes());

        let mut command = Command::with_handle(&bridge, CMD_MESSAGE, i);
        command.send_blob(payload.as_bytes());
        if let Some(mut slot) = command.begin_data_blob(digest.len()) {
            slot.write(&digest);
        }
        command.end_data_blob();
    }
    let send_time = start.elapsed();
    println!("Client: sent {} messages in {:.2?}", num_messages, send_time);

    let uid = {
        let command = Command::with_flags(&bridge, CommandId::TERMINATE, 0, Flags::RESPONSE_EXPECTED);
        command.get_uid()
    };

    if bridge.wait_for_response(uid, 30_000, None) != Status::Success {
        eprintln!("Client: no response to TERMINATE");
        std::process::exit(1);
    }
    let _ = bridge.pop_front();
    let verified = bridge.get_data();
    println!("Client: server verified {} of {} messages", verified, num_messages);
    println!("Client: {} send failures", bridge.send_failures());

    if verified != num_messages {
        std::process::exit(1);
    }
    Ok(())
}

// In demos/bridge_server.rs
// Attaches to the segments created by bridge_client, checks every payload
// against its hash and reports the count back.
use dmxp_bridge::Bridge::{Bridge, Command, Device, Side};
use dmxp_bridge::{BridgeOptions, CommandId, Status, INFINITE_TIMEOUT};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CMD_MESSAGE: CommandId = CommandId(CommandId::FIRST_USER + 1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages> [base_name]", args[0]);
        std::process::exit(1);
    }

    let expected: u32 = args[1].parse().expect("Invalid number of messages");
    let base_name = args.get(2).cloned().unwrap_or_else(|| "Demo".to_string());

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let options = BridgeOptions::load();
    let config = options.bridge_config::<Device>(base_name);

    // The client creates the segments; retry until they show up
    let mut attempts = 0;
    let bridge = loop {
        match Bridge::<Device>::init(Side::Server, &config, options.clone(), Arc::clone(&running)) {
            Ok(bridge) => break bridge,
            Err(e) if attempts < 100 => {
                attempts += 1;
                if attempts == 1 {
                    println!("Server: waiting for client ({})", e);
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e.into()),
        }
    };
    println!("Server: attached to {}", bridge.reader_channel().name());

    if bridge.wait_for_command_and_discard(CommandId::SYN, 30_000, None) != Status::Success {
        eprintln!("Server: no SYN from client");
        std::process::exit(1);
    }
    drop(Command::new(&bridge, CommandId::ACK));

    let mut received = 0u32;
    let mut verified = 0u32;
    loop {
        if bridge.wait_for_command(CommandId::ANY, INFINITE_TIMEOUT, None) != Status::Success {
            eprintln!("Server: stopped while waiting for commands");
            std::process::exit(1);
        }
        let header = bridge.pop_front();

        match header.command {
            CMD_MESSAGE => {
                received += 1;
                let payload = bridge.get_data_blob().unwrap_or_default();
                let mut digest = [0u8; 32];
                bridge.get_data_into(&mut digest);

                let name_ok = payload == format!("message_{}", header.handle).into_bytes();
                if name_ok && Sha256::digest(&payload)[..] == digest[..] {
                    verified += 1;
                } else {
                    eprintln!("Server: message {} failed verification", header.handle);
                }
                if received % 100 == 0 {
                    println!("Received {} messages", received);
                }
            }
            CommandId::TERMINATE => {
                let mut response = Command::response(&bridge, header.uid);
                response.send_data(verified);
                break;
            }
            other => eprintln!("Server: unexpected command {:?}", other),
        }
    }

    println!("Server: verified {} of {} messages", verified, expected);
    if verified == expected {
        println!("All messages received successfully");
    }

    // Give the client a moment to read the response before unmapping
    std::thread::sleep(Duration::from_millis(200));
    Ok(())
}

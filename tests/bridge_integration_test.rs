use std::io;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

// Test lock to prevent parallel test execution
static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

#[test]
fn test_bridge_integration() -> io::Result<()> {
    let _guard = TEST_LOCK.lock();

    cleanup_shared_memory();

    const NUM_MESSAGES: usize = 1000;
    const BASE_NAME: &str = "IntegrationTest";

    // Client FIRST: it creates both segments
    let client = Command::new("cargo")
        .arg("run")
        .arg("--example")
        .arg("bridge_client")
        .arg(NUM_MESSAGES.to_string())
        .arg(BASE_NAME)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    thread::sleep(Duration::from_millis(500));

    // The server attaches (and retries until the client has created them)
    let server = Command::new("cargo")
        .arg("run")
        .arg("--example")
        .arg("bridge_server")
        .arg(NUM_MESSAGES.to_string())
        .arg(BASE_NAME)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let server_output = server.wait_with_output()?;
    let client_output = client.wait_with_output()?;

    if !client_output.status.success() {
        eprintln!(
            "Client stderr: {}",
            String::from_utf8_lossy(&client_output.stderr)
        );
        panic!("Client failed");
    }

    if !server_output.status.success() {
        eprintln!(
            "Server stderr: {}",
            String::from_utf8_lossy(&server_output.stderr)
        );
        panic!("Server failed");
    }

    let server_stdout = String::from_utf8_lossy(&server_output.stdout);
    assert!(
        server_stdout.contains("All messages received successfully"),
        "Server did not verify all messages"
    );

    // The client unlinks what it created
    assert!(!std::path::Path::new("/dev/shm/dmxp_IntegrationTestClient2Server").exists());

    Ok(())
}

fn cleanup_shared_memory() {
    #[cfg(target_os = "linux")]
    {
        use std::fs;
        use std::path::Path;

        let shm_dir = Path::new("/dev/shm");
        if let Ok(entries) = fs::read_dir(shm_dir) {
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with("dmxp_IntegrationTest") {
                        let _ = fs::remove_file(path);
                    }
                }
            }
        }
    }
}

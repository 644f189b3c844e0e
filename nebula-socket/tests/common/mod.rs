#![allow(dead_code)]

use nebula_socket::{Client, Server};

use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

pub const HOST: &str = "127.0.0.1";

/// Read timeout used by test clients.
pub const TIMEOUT: Duration = Duration::from_secs(1);

/// Routes library logs to the test output; set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn server(port: u16) -> Server {
    init_tracing();

    let config = Server::builder(HOST)
        .port(port)
        .timeout(TIMEOUT)
        .build()
        .expect("Failed to build server config");

    Server::bind(config).expect("Failed to bind server")
}

pub fn client(port: u16) -> Client {
    let config = Client::builder(HOST)
        .port(port)
        .timeout(TIMEOUT)
        .build()
        .expect("Failed to build client config");

    Client::connect(config).expect("Failed to connect client")
}

/// Calls `update_clients` until the registry holds `expected` clients.
pub fn settle(server: &mut Server, expected: usize) {
    wait_until(|| {
        server.update_clients();
        server.clients().len() == expected
    });

    assert_eq!(server.clients().len(), expected, "registry did not settle");
}

/// Polls `condition` for up to two seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);

    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    condition()
}

/// Reads until `len` bytes have arrived, one `read` call at a time.
pub fn read_exactly(client: &Client, len: usize) -> Vec<u8> {
    let mut received = Vec::new();

    while received.len() < len {
        let chunk = client.read().expect("Failed to read");
        assert!(
            !chunk.is_empty(),
            "read timed out after {} bytes",
            received.len()
        );
        assert!(chunk.len() <= Client::BUFFER_SIZE);
        received.extend_from_slice(&chunk);
    }

    received
}

//! Example: echo server that also broadcasts a heartbeat
//!
//! Usage: `cargo run --example echo_server -- [host] [port]`

use nebula_socket::{Connection, Server};

use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

fn main() -> nebula_socket::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().and_then(|p| p.parse().ok()).unwrap_or(9000);

    let config = Server::builder(host).port(port).build()?;
    let mut server = Server::bind(config)?;
    println!("Echo server listening on {}", server.uri());

    let mut last_beat = Instant::now();

    loop {
        server.update_clients();

        // Echo whatever each client sent since the last pass
        for client in server.clients() {
            if client.has_data() {
                let data = client.read()?;
                let _ = client.write(data.as_slice());
            }
        }

        if last_beat.elapsed() >= Duration::from_secs(5) {
            server.write_all("heartbeat\n")?;
            last_beat = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}

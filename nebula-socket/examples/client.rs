//! Example: send a line to a server and print the reply
//!
//! Usage: `cargo run --example client -- [host] [port] [message]`

use nebula_socket::{Client, Connection};

use std::time::Duration;

fn main() -> nebula_socket::Result<()> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().and_then(|p| p.parse().ok()).unwrap_or(9000);
    let message = args.next().unwrap_or_else(|| "Hello from client!".to_string());

    let config = Client::builder(host)
        .port(port)
        .timeout(Duration::from_secs(2))
        .build()?;

    let mut client = Client::connect(config)?;
    println!("Connected to {}", client.uri());

    client.write(&message)?;
    println!("Sent: {message}");

    let reply = client.read()?;
    if reply.is_empty() {
        println!("No reply within {:?}", client.timeout());
    } else {
        println!("Received: {}", String::from_utf8_lossy(&reply));
    }

    client.close();
    Ok(())
}

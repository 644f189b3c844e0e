mod common;

use common::{HOST, client, read_exactly, server, settle, wait_until};

use nebula_socket::{Client, Connection, Error, Payload, Protocol, Socket, SocketType};

use std::io::{Cursor, Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::os::fd::OwnedFd;
use std::time::{Duration, Instant};

#[test]
fn test_read_with_zero_timeout_returns_immediately() {
    let mut server = server(59840);
    let mut external = client(59840);
    external.set_timeout(Duration::ZERO);

    settle(&mut server, 1);

    let started = Instant::now();
    let data = external.read().unwrap();

    assert!(data.is_empty());
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_read_waits_for_timeout() {
    let mut server = server(59841);
    let mut external = client(59841);
    external.set_timeout(Duration::from_millis(150));

    settle(&mut server, 1);

    let started = Instant::now();
    let data = external.read().unwrap();

    assert!(data.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[test]
fn test_read_wakes_when_data_arrives() {
    let listener = TcpListener::bind((HOST, 59842)).unwrap();

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        stream.write_all(b"late").unwrap();
        std::thread::sleep(Duration::from_millis(100));
    });

    let mut external = client(59842);
    external.set_timeout(Duration::from_secs(5));

    let started = Instant::now();
    assert_eq!(external.read().unwrap(), b"late");
    assert!(started.elapsed() < Duration::from_secs(5));

    handle.join().unwrap();
}

#[test]
fn test_has_data() {
    let mut server = server(59843);
    let external = client(59843);

    settle(&mut server, 1);
    let internal = &server.clients()[0];

    assert!(!internal.has_data());

    external.write("x").unwrap();

    assert!(wait_until(|| internal.has_data()));
    assert_eq!(internal.read().unwrap(), b"x");
    assert!(!internal.has_data());
}

#[test]
fn test_write_stream_in_chunks() {
    let mut server = server(59844);
    let external = client(59844);

    settle(&mut server, 1);

    let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let mut source = Cursor::new(data.clone());

    let written = server.clients()[0]
        .write(Payload::stream(&mut source))
        .unwrap();

    assert_eq!(written, data.len());
    assert_eq!(read_exactly(&external, data.len()), data);
}

#[test]
fn test_closed_client() {
    let mut server = server(59845);
    let mut external = client(59845);

    settle(&mut server, 1);

    external.close();
    external.close();

    assert!(!external.is_open());
    assert!(!external.is_alive());
    assert!(!external.has_data());
    assert!(matches!(external.read(), Err(Error::UnavailableSocket)));
    assert!(matches!(external.write("x"), Err(Error::UnavailableSocket)));
}

#[test]
fn test_reopen_after_close() {
    let mut server = server(59846);
    let mut external = client(59846);

    external.close();
    external.open().unwrap();

    assert!(external.is_open());
    settle(&mut server, 1);
}

#[test]
fn test_connect_refused_surfaces_io_error() {
    let config = Client::builder(HOST).port(59847).build().unwrap();

    let err = Client::connect(config).unwrap_err();

    assert_eq!(
        err.as_io().map(|e| e.kind()),
        Some(std::io::ErrorKind::ConnectionRefused)
    );
}

#[test]
fn test_with_socket_wraps_existing_stream() {
    let listener = TcpListener::bind((HOST, 59848)).unwrap();
    let stream = std::net::TcpStream::connect((HOST, 59848)).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    let config = Client::builder(HOST)
        .port(59848)
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let wrapped = Client::with_socket(config, Socket::from(OwnedFd::from(stream)));

    assert!(wrapped.is_alive());
    assert_eq!(wrapped.write("wrapped").unwrap(), 7);

    let mut buffer = [0u8; 7];
    peer.read_exact(&mut buffer).unwrap();
    assert_eq!(&buffer, b"wrapped");

    peer.write_all(b"back").unwrap();
    assert_eq!(wrapped.read().unwrap(), b"back");
}

#[test]
fn test_udp_round_trip() {
    let peer = UdpSocket::bind((HOST, 59849)).unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(1))).unwrap();

    let config = Client::builder(HOST)
        .port(59849)
        .timeout(Duration::from_secs(1))
        .socket_type(SocketType::Datagram)
        .protocol(Protocol::Udp)
        .build()
        .unwrap();
    let client = Client::connect(config).unwrap();

    assert_eq!(client.uri(), "udp://127.0.0.1:59849");
    assert_eq!(client.write("ping").unwrap(), 4);

    let mut buffer = [0u8; 16];
    let (n, from) = peer.recv_from(&mut buffer).unwrap();
    assert_eq!(&buffer[..n], b"ping");

    peer.send_to(b"pong", from).unwrap();
    assert_eq!(client.read().unwrap(), b"pong");
}

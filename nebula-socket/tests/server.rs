mod common;

use common::{HOST, client, read_exactly, server, settle, wait_until};

use nebula_socket::{Connection, Domain, Payload, Protocol};

use std::io::{Cursor, Seek, SeekFrom};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::time::Duration;

#[test]
fn test_construct_server() {
    let mut server = server(59822);

    server.update_clients();

    assert_eq!(server.clients().len(), 0);
    assert!(server.is_open());
    assert_eq!(server.uri(), "tcp://127.0.0.1:59822");
}

#[test]
fn test_connect_client_returns_none_when_idle() {
    let mut server = server(59823);

    assert!(server.connect_client().unwrap().is_none());
    assert_eq!(server.connect_clients(), 0);
}

#[test]
fn test_update_clients_is_stable_when_idle() {
    let mut server = server(59824);
    let _external = client(59824);

    settle(&mut server, 1);

    server.update_clients();
    server.update_clients();

    assert_eq!(server.clients().len(), 1);
}

#[test]
fn test_external_client_exchanges_messages() {
    let mut server = server(59821);
    let external = client(59821);

    server.update_clients();
    assert_eq!(server.clients().len(), 1);

    let message = b"hello world";

    let internal = &server.clients()[0];
    assert_eq!(internal.write(message).unwrap(), message.len());
    assert_eq!(external.read().unwrap(), message);

    assert_eq!(external.write(message).unwrap(), message.len());
    assert_eq!(internal.read().unwrap(), message);
}

#[test]
fn test_accepted_client_inherits_configuration() {
    let mut server = server(59825);
    let _external = client(59825);

    settle(&mut server, 1);

    let internal = &server.clients()[0];
    assert_eq!(internal.host(), "127.0.0.1");
    assert!(internal.port().is_some_and(|port| port != 59825));
    assert_eq!(internal.domain(), Domain::Ipv4);
    assert_eq!(internal.protocol(), Some(Protocol::Tcp));
    assert_eq!(internal.timeout(), common::TIMEOUT);
    assert!(internal.is_open());
}

#[test]
fn test_client_is_alive() {
    let mut server = server(59826);
    let _external = client(59826);

    settle(&mut server, 1);

    assert!(server.clients()[0].is_alive());
}

#[test]
fn test_client_is_not_alive_after_peer_closes() {
    let mut server = server(59827);
    let mut external = client(59827);

    settle(&mut server, 1);
    assert!(server.clients()[0].is_alive());

    external.close();

    assert!(wait_until(|| !server.clients()[0].is_alive()));
}

#[test]
fn test_registry_keeps_acceptance_order() {
    let mut server = server(59828);

    let externals: Vec<_> = (0..3u8)
        .map(|i| {
            let external = client(59828);
            external.write(&[i]).unwrap();
            external
        })
        .collect();

    settle(&mut server, externals.len());

    for (i, internal) in server.clients().iter().enumerate() {
        assert_eq!(read_exactly(internal, 1), vec![i as u8]);
    }
}

#[test]
fn test_write_all_reaches_every_client_and_prunes() {
    let mut server = server(59829);
    let mut first = client(59829);
    let second = client(59829);

    settle(&mut server, 2);

    server.write_all("ping").unwrap();

    assert_eq!(read_exactly(&first, 4), b"ping");
    assert_eq!(read_exactly(&second, 4), b"ping");

    first.close();

    assert!(wait_until(|| {
        server.update_clients();
        server.clients().len() == 1
    }));

    server.write_all("pong").unwrap();
    assert_eq!(read_exactly(&second, 4), b"pong");
}

#[test]
fn test_write_all_rewinds_stream_per_client() {
    let mut server = server(59830);
    let first = client(59830);
    let second = client(59830);

    settle(&mut server, 2);

    let mut source = Cursor::new(b"--payload".to_vec());
    source.seek(SeekFrom::Start(2)).unwrap();

    server.write_all(Payload::rewindable(&mut source)).unwrap();

    assert_eq!(read_exactly(&first, 7), b"payload");
    assert_eq!(read_exactly(&second, 7), b"payload");
}

#[test]
fn test_write_all_rejects_one_shot_stream() {
    let mut server = server(59831);
    let external = client(59831);

    settle(&mut server, 1);

    let mut source: &[u8] = b"not replayable";
    let err = server.write_all(Payload::stream(&mut source)).unwrap_err();

    assert!(err.is_unsupported_input());
    assert_eq!(source.len(), b"not replayable".len());

    let mut quiet = external;
    quiet.set_timeout(Duration::ZERO);
    assert!(quiet.read().unwrap().is_empty());
}

#[test]
fn test_closed_server() {
    let mut server = server(59832);

    server.close();
    server.close();

    assert!(!server.is_open());
    assert!(server.connect_client().unwrap_err().is_unavailable_socket());
    assert_eq!(server.connect_clients(), 0);

    server.update_clients();
    assert!(server.clients().is_empty());

    server.open().unwrap();
    assert!(server.is_open());

    let _external = client(59832);
    settle(&mut server, 1);
}

/// Closes a stream with `SO_LINGER {on, 0}` so the peer sees a reset.
fn reset(stream: TcpStream) {
    let abort = libc::linger {
        l_onoff: 1,
        l_linger: 0,
    };

    let rc = unsafe {
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &abort as *const libc::linger as *const libc::c_void,
            std::mem::size_of::<libc::linger>() as libc::socklen_t,
        )
    };
    assert_eq!(rc, 0);
}

#[test]
fn test_connect_clients_drains_past_reset_connection() {
    let mut server = server(59833);

    reset(TcpStream::connect((HOST, 59833)).unwrap());

    let healthy = TcpStream::connect((HOST, 59833)).unwrap();
    let healthy_port = healthy.local_addr().unwrap().port();

    std::thread::sleep(Duration::from_millis(50));

    server.connect_clients();

    assert!(
        server
            .clients()
            .iter()
            .any(|client| client.port() == Some(healthy_port)),
        "connection queued behind a reset one was not accepted"
    );
}

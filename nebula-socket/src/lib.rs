//! # Nebula Socket
//!
//! **Nebula Socket** is a small socket layer for the **Nebula** ecosystem. It
//! wraps TCP, UDP and Unix-domain sockets behind two types, [`Client`] and
//! [`Server`], that share one validated [`ConnectionConfig`].
//!
//! It offers:
//!
//! - **Validated configuration**: domain, socket type, protocol, host and port
//!   are checked together before any socket is created, and host names are
//!   resolved to literal addresses up front
//! - **Timeout-bounded reads** that wait on socket readiness instead of
//!   spinning
//! - **Liveness checks** that peek at the socket without consuming data
//! - **A non-blocking server** that drains its accept backlog on demand,
//!   keeps accepted clients in order, prunes dead ones and broadcasts writes
//!
//! Everything runs on the calling thread; there are no background tasks.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nebula_socket::{Client, Server};
//! use std::time::Duration;
//!
//! let mut server = Server::bind(Server::builder("127.0.0.1").port(9000).build()?)?;
//!
//! let client = Client::connect(
//!     Client::builder("127.0.0.1")
//!         .port(9000)
//!         .timeout(Duration::from_millis(500))
//!         .build()?,
//! )?;
//!
//! server.update_clients();
//! server.write_all("hello")?;
//!
//! assert_eq!(client.read()?, b"hello");
//! ```
//!
//! ## Modules
//!
//! - [`config`]: address family, socket type, protocol and validation
//! - [`resolve`]: host name resolution
//! - [`error`]: error types

mod client;
mod connection;
mod payload;
mod server;
mod socket;
mod sys;

pub mod config;
pub mod error;
pub mod resolve;

pub use client::Client;
pub use config::{ConnectionBuilder, ConnectionConfig, Domain, Endpoint, Protocol, SocketType};
pub use connection::Connection;
pub use error::{Error, Result};
pub use payload::{Payload, ReadSeek};
pub use resolve::{RecordType, Resolver, SystemResolver};
pub use server::Server;
pub use socket::Socket;

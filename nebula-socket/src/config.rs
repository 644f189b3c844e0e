//! Connection configuration and validation.
//!
//! A [`ConnectionConfig`] is the validated description of a socket shared by
//! clients and servers: which address family, socket type and transport
//! protocol to use, where to connect or bind, and how long reads may wait.
//!
//! Configurations are only produced by [`ConnectionBuilder`], which checks
//! every field at once and either returns a complete value or the first
//! error it found.
//!
//! # Examples
//!
//! ```rust,ignore
//! use nebula_socket::{ConnectionBuilder, Domain, Protocol};
//! use std::time::Duration;
//!
//! let config = ConnectionBuilder::new("127.0.0.1")
//!     .port(8080)
//!     .timeout(Duration::from_secs(1))
//!     .build()?;
//!
//! assert_eq!(config.uri(), "tcp://127.0.0.1:8080");
//! ```

use crate::error::{Error, Result};
use crate::resolve::{RecordType, Resolver, SystemResolver};

use libc::{
    AF_INET, AF_INET6, AF_UNIX, IPPROTO_TCP, IPPROTO_UDP, SOCK_DGRAM, SOCK_RAW, SOCK_RDM,
    SOCK_SEQPACKET, SOCK_STREAM, c_int,
};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Highest valid port number.
pub const MAX_PORT_NUMBER: u16 = 65535;

/// Socket address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    /// IPv4 (`AF_INET`).
    #[default]
    Ipv4,
    /// IPv6 (`AF_INET6`).
    Ipv6,
    /// Unix-domain sockets addressed by filesystem path (`AF_UNIX`).
    Unix,
}

impl Domain {
    /// Returns the `AF_*` constant for this domain.
    pub fn as_raw(self) -> c_int {
        match self {
            Domain::Ipv4 => AF_INET,
            Domain::Ipv6 => AF_INET6,
            Domain::Unix => AF_UNIX,
        }
    }

    /// Returns `true` if sockets of this domain can be opened on the
    /// current platform.
    ///
    /// The crate only builds for Unix targets, so this is currently `true`
    /// for every domain.
    pub fn is_supported(self) -> bool {
        match self {
            Domain::Ipv4 | Domain::Ipv6 => true,
            Domain::Unix => cfg!(unix),
        }
    }

    /// DNS record type that yields addresses for this domain.
    pub fn record_type(self) -> Option<RecordType> {
        match self {
            Domain::Ipv4 => Some(RecordType::A),
            Domain::Ipv6 => Some(RecordType::Aaaa),
            Domain::Unix => None,
        }
    }
}

impl TryFrom<c_int> for Domain {
    type Error = Error;

    fn try_from(raw: c_int) -> Result<Self> {
        match raw {
            AF_INET => Ok(Domain::Ipv4),
            AF_INET6 => Ok(Domain::Ipv6),
            AF_UNIX => Ok(Domain::Unix),
            _ => Err(Error::configuration("Unrecognized socket domain.")),
        }
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ipv4" | "inet" => Ok(Domain::Ipv4),
            "ipv6" | "inet6" => Ok(Domain::Ipv6),
            "unix" => Ok(Domain::Unix),
            _ => Err(Error::configuration(format!(
                "Unrecognized socket domain: {s}"
            ))),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Ipv4 => f.write_str("ipv4"),
            Domain::Ipv6 => f.write_str("ipv6"),
            Domain::Unix => f.write_str("unix"),
        }
    }
}

/// Socket communication style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SocketType {
    /// Reliable byte stream (`SOCK_STREAM`).
    #[default]
    Stream,
    /// Connectionless datagrams (`SOCK_DGRAM`).
    Datagram,
    /// Sequenced, connection-oriented packets (`SOCK_SEQPACKET`).
    SeqPacket,
    /// Raw network protocol access (`SOCK_RAW`).
    Raw,
    /// Reliably delivered, unordered datagrams (`SOCK_RDM`).
    ReliableDatagram,
}

impl SocketType {
    /// Returns the `SOCK_*` constant for this type.
    pub fn as_raw(self) -> c_int {
        match self {
            SocketType::Stream => SOCK_STREAM,
            SocketType::Datagram => SOCK_DGRAM,
            SocketType::SeqPacket => SOCK_SEQPACKET,
            SocketType::Raw => SOCK_RAW,
            SocketType::ReliableDatagram => SOCK_RDM,
        }
    }
}

impl TryFrom<c_int> for SocketType {
    type Error = Error;

    fn try_from(raw: c_int) -> Result<Self> {
        match raw {
            SOCK_STREAM => Ok(SocketType::Stream),
            SOCK_DGRAM => Ok(SocketType::Datagram),
            SOCK_SEQPACKET => Ok(SocketType::SeqPacket),
            SOCK_RAW => Ok(SocketType::Raw),
            SOCK_RDM => Ok(SocketType::ReliableDatagram),
            _ => Err(Error::configuration("Unrecognized socket type.")),
        }
    }
}

impl FromStr for SocketType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stream" => Ok(SocketType::Stream),
            "dgram" | "datagram" => Ok(SocketType::Datagram),
            "seqpacket" => Ok(SocketType::SeqPacket),
            "raw" => Ok(SocketType::Raw),
            "rdm" => Ok(SocketType::ReliableDatagram),
            _ => Err(Error::configuration(format!("Unrecognized socket type: {s}"))),
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketType::Stream => f.write_str("stream"),
            SocketType::Datagram => f.write_str("dgram"),
            SocketType::SeqPacket => f.write_str("seqpacket"),
            SocketType::Raw => f.write_str("raw"),
            SocketType::ReliableDatagram => f.write_str("rdm"),
        }
    }
}

/// Transport protocol selector.
///
/// Unix-domain connections carry no protocol; their configuration stores
/// `None` whatever the builder was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// `IPPROTO_TCP`.
    #[default]
    Tcp,
    /// `IPPROTO_UDP`.
    Udp,
}

impl Protocol {
    /// Returns the `IPPROTO_*` constant for this protocol.
    pub fn as_raw(self) -> c_int {
        match self {
            Protocol::Tcp => IPPROTO_TCP,
            Protocol::Udp => IPPROTO_UDP,
        }
    }

    /// URI scheme for this protocol.
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl TryFrom<c_int> for Protocol {
    type Error = Error;

    fn try_from(raw: c_int) -> Result<Self> {
        match raw {
            IPPROTO_TCP => Ok(Protocol::Tcp),
            IPPROTO_UDP => Ok(Protocol::Udp),
            _ => Err(Error::configuration("Unrecognized socket protocol.")),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(Error::configuration(format!(
                "Unrecognized socket protocol: {s}"
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A resolved socket address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// IPv4 or IPv6 address with port.
    Inet(SocketAddr),
    /// Filesystem path of a Unix-domain socket. Empty for unnamed peers.
    Unix(PathBuf),
}

impl Endpoint {
    /// Host part as text: the IP literal or the socket path.
    pub fn host(&self) -> String {
        match self {
            Endpoint::Inet(addr) => addr.ip().to_string(),
            Endpoint::Unix(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// Port, if the endpoint has one.
    pub fn port(&self) -> Option<u16> {
        match self {
            Endpoint::Inet(addr) => Some(addr.port()),
            Endpoint::Unix(_) => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inet(addr) => write!(f, "{addr}"),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Validated connection settings.
///
/// Produced by [`ConnectionBuilder`]; every value of this type satisfies:
/// - the port is in range for IPv4/IPv6 and absent for Unix,
/// - the protocol is absent for Unix,
/// - the host is a literal address of the domain's family (or a path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: Option<u16>,
    timeout: Duration,
    domain: Domain,
    socket_type: SocketType,
    protocol: Option<Protocol>,
    endpoint: Endpoint,
}

impl ConnectionConfig {
    /// Literal host address, or socket path for Unix-domain connections.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port number; always `None` for Unix-domain connections.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// How long [`Client::read`](crate::Client::read) waits for data.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sets the read timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    /// Transport protocol; always `None` for Unix-domain connections.
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    /// Address sockets for this configuration connect or bind to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Canonical URI: `{tcp|udp}://{host}[:{port}]`.
    ///
    /// Connections without a protocol get no scheme prefix, and the port
    /// segment is only present when a port is set.
    pub fn uri(&self) -> String {
        let mut uri = String::new();

        if let Some(protocol) = self.protocol {
            uri.push_str(protocol.scheme());
            uri.push_str("://");
        }

        uri.push_str(&self.host);

        if let Some(port) = self.port {
            uri.push(':');
            uri.push_str(&port.to_string());
        }

        uri
    }

    /// Settings for a connection accepted from `peer` by a server using
    /// this configuration.
    pub(crate) fn for_peer(&self, peer: &Endpoint) -> Result<Self> {
        let mut builder = ConnectionBuilder::new(peer.host())
            .timeout(self.timeout)
            .domain(self.domain)
            .socket_type(self.socket_type)
            .protocol(self.protocol.unwrap_or_default());

        if let Some(port) = peer.port() {
            builder = builder.port(port);
        }

        builder.build()
    }
}

/// Builder for [`ConnectionConfig`].
///
/// Defaults: no port, zero timeout, IPv4, stream socket, TCP.
///
/// Setters only record values; [`build`](Self::build) validates them all
/// together so a configuration is either complete or not produced at all.
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    host: String,
    port: Option<i64>,
    timeout: Duration,
    domain: Domain,
    socket_type: SocketType,
    protocol: Protocol,
}

impl ConnectionBuilder {
    /// Starts a configuration for `host`.
    ///
    /// `host` is an IP literal, a name to resolve, or a socket path for
    /// Unix-domain connections.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            timeout: Duration::ZERO,
            domain: Domain::default(),
            socket_type: SocketType::default(),
            protocol: Protocol::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(i64::from(port));
        self
    }

    /// Sets the port from an unchecked integer.
    ///
    /// Out-of-range values are reported by [`build`](Self::build).
    pub fn port_number(mut self, port: Option<i64>) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the timeout in seconds. Negative or NaN values become zero.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = clamp_timeout(secs);
        self
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn socket_type(mut self, socket_type: SocketType) -> Self {
        self.socket_type = socket_type;
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Validates the settings, resolving names with [`SystemResolver`].
    pub fn build(self) -> Result<ConnectionConfig> {
        self.build_with(&SystemResolver)
    }

    /// Validates the settings, resolving names with `resolver`.
    ///
    /// The resolver is only consulted when the host is not already a
    /// literal of the domain's family.
    pub fn build_with<R>(self, resolver: &R) -> Result<ConnectionConfig>
    where
        R: Resolver + ?Sized,
    {
        // Unreachable until a non-Unix platform layer exists.
        if !self.domain.is_supported() {
            return Err(Error::configuration(format!(
                "The {} domain is not supported on this platform.",
                self.domain
            )));
        }

        let (host, port, protocol, endpoint) = match self.domain {
            Domain::Unix => {
                let endpoint = Endpoint::Unix(PathBuf::from(&self.host));
                (self.host, None, None, endpoint)
            }
            Domain::Ipv4 | Domain::Ipv6 => {
                let port = validate_port(self.port)?;
                let (host, ip) = resolve_host(self.host, self.domain, resolver)?;
                let endpoint = Endpoint::Inet(SocketAddr::new(ip, port));
                (host, Some(port), Some(self.protocol), endpoint)
            }
        };

        Ok(ConnectionConfig {
            host,
            port,
            timeout: self.timeout,
            domain: self.domain,
            socket_type: self.socket_type,
            protocol,
            endpoint,
        })
    }
}

/// Converts a signed number of seconds to a timeout, clamping to zero.
pub fn clamp_timeout(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

fn validate_port(port: Option<i64>) -> Result<u16> {
    port.filter(|p| (1..=i64::from(MAX_PORT_NUMBER)).contains(p))
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| {
            Error::configuration(format!(
                "Port number must be between 1 and {MAX_PORT_NUMBER}."
            ))
        })
}

/// Returns the host text to store together with its literal address.
fn resolve_host<R>(host: String, domain: Domain, resolver: &R) -> Result<(String, IpAddr)>
where
    R: Resolver + ?Sized,
{
    if let Some(ip) = parse_literal(&host, domain) {
        return Ok((host, ip));
    }

    let Some(record_type) = domain.record_type() else {
        return Err(Error::configuration("Unsupported domain for given host."));
    };

    match resolver.resolve(&host, record_type) {
        Some(ip) if record_type.matches(&ip) => Ok((ip.to_string(), ip)),
        _ => Err(Error::resolution(host, record_type)),
    }
}

fn parse_literal(host: &str, domain: Domain) -> Option<IpAddr> {
    match domain {
        Domain::Ipv4 => host.parse::<Ipv4Addr>().ok().map(IpAddr::V4),
        Domain::Ipv6 => host.parse::<Ipv6Addr>().ok().map(IpAddr::V6),
        Domain::Unix => None,
    }
}

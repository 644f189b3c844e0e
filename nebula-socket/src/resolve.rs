//! Host name resolution.
//!
//! Connections only ever open sockets against literal addresses. When a
//! host is given by name, a [`Resolver`] is asked for the first record of
//! the family the connection's domain requires.

use std::fmt;
use std::net::{IpAddr, ToSocketAddrs};

use tracing::trace;

/// DNS record type requested from a [`Resolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record.
    A,
    /// IPv6 address record.
    Aaaa,
}

impl RecordType {
    /// Returns `true` if `ip` belongs to this record type's family.
    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            RecordType::A => ip.is_ipv4(),
            RecordType::Aaaa => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Aaaa => f.write_str("AAAA"),
        }
    }
}

/// Turns host names into literal addresses.
///
/// Implementations return the first address of the requested record type,
/// or `None` when the name has no such record. Any closure of the shape
/// `Fn(&str, RecordType) -> Option<IpAddr>` is a resolver, which keeps
/// tests independent of the network.
pub trait Resolver {
    /// Looks up `host` and returns the first address of `record_type`.
    fn resolve(&self, host: &str, record_type: RecordType) -> Option<IpAddr>;
}

impl<F> Resolver for F
where
    F: Fn(&str, RecordType) -> Option<IpAddr>,
{
    fn resolve(&self, host: &str, record_type: RecordType) -> Option<IpAddr> {
        self(host, record_type)
    }
}

/// Resolver backed by the platform's `getaddrinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, record_type: RecordType) -> Option<IpAddr> {
        let found = (host, 0)
            .to_socket_addrs()
            .ok()?
            .map(|addr| addr.ip())
            .find(|ip| record_type.matches(ip));

        trace!(host, %record_type, ?found, "Resolved host");

        found
    }
}

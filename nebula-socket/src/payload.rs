//! Data accepted by [`Client::write`](crate::Client::write) and
//! [`Server::write_all`](crate::Server::write_all).

use std::io::{Read, Seek};

/// A byte source that can also be repositioned.
///
/// Implemented for every `Read + Seek` type, e.g. [`std::fs::File`] or
/// [`std::io::Cursor`].
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Something to write to a socket.
///
/// Streams are drained in chunks of
/// [`Client::BUFFER_SIZE`](crate::Client::BUFFER_SIZE) bytes.
pub enum Payload<'a> {
    /// An in-memory buffer, written as-is.
    Bytes(&'a [u8]),
    /// A stream read until exhaustion. It cannot be replayed.
    Stream(&'a mut dyn Read),
    /// A stream read until exhaustion that can be sought back to its
    /// starting offset, so it can be sent to several peers.
    Rewindable(&'a mut dyn ReadSeek),
}

impl<'a> Payload<'a> {
    /// Wraps a one-shot stream.
    pub fn stream<R: Read>(reader: &'a mut R) -> Self {
        Payload::Stream(reader)
    }

    /// Wraps a seekable stream.
    pub fn rewindable<R: Read + Seek>(reader: &'a mut R) -> Self {
        Payload::Rewindable(reader)
    }

    /// Short description used in logs and errors.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Payload::Bytes(_) => "bytes",
            Payload::Stream(_) => "stream",
            Payload::Rewindable(_) => "rewindable stream",
        }
    }
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Payload<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Payload<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Payload::Bytes(text.as_bytes())
    }
}

impl<'a> From<&'a String> for Payload<'a> {
    fn from(text: &'a String) -> Self {
        Payload::Bytes(text.as_bytes())
    }
}

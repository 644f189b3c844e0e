//! Platform socket primitives.
//!
//! Thin wrappers over the OS socket API. Each function maps to one system
//! call and reports failures as [`std::io::Error`] without translating
//! them; higher layers decide what an error means.
//!
//! Only Unix targets have an implementation; building for any other
//! target fails.

#[cfg(not(unix))]
compile_error!("nebula-socket only supports Unix targets");

#[cfg(unix)]
pub(crate) mod unix;

#[cfg(unix)]
pub(crate) use unix as platform;

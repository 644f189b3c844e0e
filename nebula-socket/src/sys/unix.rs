use crate::config::Endpoint;

use libc::{
    AF_INET, AF_INET6, AF_UNIX, F_GETFL, F_SETFL, MSG_DONTWAIT, O_NONBLOCK, POLLIN, POLLOUT,
    SHUT_RDWR, SO_LINGER, SO_REUSEADDR, SOL_SOCKET, accept, bind, c_int,
    c_void, close, connect, fcntl, getpeername, linger, listen, poll, pollfd, recv, send,
    setsockopt, shutdown, sockaddr, sockaddr_in, sockaddr_in6, sockaddr_storage, sockaddr_un,
    socket, socklen_t,
};
use std::ffi::OsStr;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::time::Duration;
use std::{io, mem};

pub(crate) use libc::MSG_PEEK;

/// Backlog passed to `listen(2)`.
const LISTEN_BACKLOG: c_int = 128;

/// Flags added to every `send(2)`; suppresses `SIGPIPE` where the
/// platform supports it per call.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
const SEND_FLAGS: c_int = 0;

/// Readiness a caller can wait for with [`sys_poll`].
#[derive(Clone, Copy, Debug)]
pub(crate) enum Readiness {
    Readable,
    Writable,
}

fn cvt(rc: c_int) -> io::Result<c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

fn cvt_size(n: isize) -> io::Result<usize> {
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Creates a socket of the given family, type and protocol.
///
/// Pass `0` as `protocol` to let the kernel pick the default, which is
/// the only valid choice for Unix-domain sockets.
pub(crate) fn sys_socket(domain: c_int, ty: c_int, protocol: c_int) -> io::Result<RawFd> {
    let fd = cvt(unsafe { socket(domain, ty, protocol) })?;

    if let Err(e) = sys_set_nosigpipe(fd) {
        sys_close(fd);
        return Err(e);
    }

    Ok(fd)
}

/// Suppresses `SIGPIPE` on platforms that only offer it as a socket option.
#[cfg(any(target_os = "macos", target_os = "ios"))]
fn sys_set_nosigpipe(fd: RawFd) -> io::Result<()> {
    sys_setsockopt(fd, SOL_SOCKET, libc::SO_NOSIGPIPE, &(1 as c_int))
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn sys_set_nosigpipe(_fd: RawFd) -> io::Result<()> {
    Ok(())
}

/// Closes a file descriptor.
pub(crate) fn sys_close(fd: RawFd) {
    unsafe { close(fd) };
}

/// Shuts down both directions of a socket.
pub(crate) fn sys_shutdown(fd: RawFd) -> io::Result<()> {
    cvt(unsafe { shutdown(fd, SHUT_RDWR) }).map(drop)
}

/// Sets a file descriptor to non-blocking mode.
pub(crate) fn sys_set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = cvt(unsafe { fcntl(fd, F_GETFL) })?;
    cvt(unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) }).map(drop)
}

/// Connects a socket to `endpoint`.
pub(crate) fn sys_connect(fd: RawFd, endpoint: &Endpoint) -> io::Result<()> {
    let (storage, len) = endpoint_to_storage(endpoint)?;

    cvt(unsafe { connect(fd, &storage as *const _ as *const sockaddr, len) }).map(drop)
}

/// Binds a socket to `endpoint`.
pub(crate) fn sys_bind(fd: RawFd, endpoint: &Endpoint) -> io::Result<()> {
    let (storage, len) = endpoint_to_storage(endpoint)?;

    cvt(unsafe { bind(fd, &storage as *const _ as *const sockaddr, len) }).map(drop)
}

/// Marks a socket as a listening socket.
pub(crate) fn sys_listen(fd: RawFd) -> io::Result<()> {
    cvt(unsafe { listen(fd, LISTEN_BACKLOG) }).map(drop)
}

/// Accepts a pending connection.
///
/// On a non-blocking listener this fails with `WouldBlock` when the
/// backlog is empty.
pub(crate) fn sys_accept(fd: RawFd) -> io::Result<RawFd> {
    cvt(unsafe { accept(fd, std::ptr::null_mut(), std::ptr::null_mut()) })
}

/// Returns the address of the peer connected to a socket.
pub(crate) fn sys_peername(fd: RawFd) -> io::Result<Endpoint> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    cvt(unsafe { getpeername(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) })?;

    storage_to_endpoint(&storage, len)
}

/// Receives into `buffer` without blocking.
///
/// `flags` is OR-ed with `MSG_DONTWAIT`; pass [`MSG_PEEK`] to leave the
/// data queued.
pub(crate) fn sys_recv(fd: RawFd, buffer: &mut [u8], flags: c_int) -> io::Result<usize> {
    cvt_size(unsafe {
        recv(
            fd,
            buffer.as_mut_ptr() as *mut c_void,
            buffer.len(),
            flags | MSG_DONTWAIT,
        )
    })
}

/// Sends from `buffer`, returning the number of bytes the kernel took.
pub(crate) fn sys_send(fd: RawFd, buffer: &[u8]) -> io::Result<usize> {
    cvt_size(unsafe {
        send(
            fd,
            buffer.as_ptr() as *const c_void,
            buffer.len(),
            SEND_FLAGS,
        )
    })
}

/// Waits until `fd` reaches `readiness` or `timeout` elapses.
///
/// `None` waits without a bound. Returns `false` on timeout.
pub(crate) fn sys_poll(
    fd: RawFd,
    readiness: Readiness,
    timeout: Option<Duration>,
) -> io::Result<bool> {
    let events = match readiness {
        Readiness::Readable => POLLIN,
        Readiness::Writable => POLLOUT,
    };

    let mut pfd = pollfd {
        fd,
        events,
        revents: 0,
    };

    let timeout_ms = match timeout {
        Some(timeout) => timeout
            .as_micros()
            .div_ceil(1000)
            .min(c_int::MAX as u128) as c_int,
        None => -1,
    };

    let ready = cvt(unsafe { poll(&mut pfd, 1, timeout_ms) })?;

    Ok(ready > 0)
}

/// Enables `SO_REUSEADDR` on a socket.
pub(crate) fn sys_set_reuseaddr(fd: RawFd) -> io::Result<()> {
    sys_setsockopt(fd, SOL_SOCKET, SO_REUSEADDR, &(1 as c_int))
}

/// Enables `SO_REUSEPORT` on platforms that have it.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
))]
pub(crate) fn sys_set_reuseport(fd: RawFd) -> io::Result<()> {
    sys_setsockopt(fd, SOL_SOCKET, libc::SO_REUSEPORT, &(1 as c_int))
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
pub(crate) fn sys_set_reuseport(_fd: RawFd) -> io::Result<()> {
    Ok(())
}

/// Sets `SO_LINGER`.
///
/// `Some(Duration::ZERO)` makes `close(2)` discard unsent data and reset
/// the connection instead of lingering; `None` restores the default.
pub(crate) fn sys_set_linger(fd: RawFd, linger_for: Option<Duration>) -> io::Result<()> {
    let value = linger {
        l_onoff: linger_for.is_some() as c_int,
        l_linger: linger_for
            .map(|d| d.as_secs().min(c_int::MAX as u64) as c_int)
            .unwrap_or(0),
    };

    sys_setsockopt(fd, SOL_SOCKET, SO_LINGER, &value)
}

fn sys_setsockopt<T>(fd: RawFd, level: c_int, name: c_int, value: &T) -> io::Result<()> {
    cvt(unsafe {
        setsockopt(
            fd,
            level,
            name,
            value as *const T as *const c_void,
            mem::size_of::<T>() as socklen_t,
        )
    })
    .map(drop)
}

/// Converts an [`Endpoint`] to a `sockaddr_storage`.
///
/// Fails with `InvalidInput` if a Unix socket path does not fit in
/// `sun_path`.
pub(crate) fn endpoint_to_storage(endpoint: &Endpoint) -> io::Result<(sockaddr_storage, socklen_t)> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    match endpoint {
        Endpoint::Inet(SocketAddr::V4(v4)) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in) };
            sa.sin_family = AF_INET as _;
            sa.sin_port = v4.port().to_be();
            sa.sin_addr.s_addr = u32::from(*v4.ip()).to_be();

            Ok((storage, mem::size_of::<sockaddr_in>() as socklen_t))
        }

        Endpoint::Inet(SocketAddr::V6(v6)) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in6) };
            sa.sin6_family = AF_INET6 as _;
            sa.sin6_port = v6.port().to_be();
            sa.sin6_addr.s6_addr = v6.ip().octets();
            sa.sin6_flowinfo = v6.flowinfo();
            sa.sin6_scope_id = v6.scope_id();

            Ok((storage, mem::size_of::<sockaddr_in6>() as socklen_t))
        }

        Endpoint::Unix(path) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_un) };
            let bytes = path.as_os_str().as_bytes();

            // One byte is kept for the terminating NUL.
            if bytes.len() >= sa.sun_path.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "unix socket path too long",
                ));
            }

            sa.sun_family = AF_UNIX as _;
            for (dst, src) in sa.sun_path.iter_mut().zip(bytes) {
                *dst = *src as _;
            }

            let len = mem::offset_of!(sockaddr_un, sun_path) + bytes.len() + 1;

            #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
            {
                sa.sun_len = len as u8;
            }

            Ok((storage, len as socklen_t))
        }
    }
}

/// Converts a `sockaddr_storage` filled by the kernel to an [`Endpoint`].
pub(crate) fn storage_to_endpoint(storage: &sockaddr_storage, len: socklen_t) -> io::Result<Endpoint> {
    match storage.ss_family as c_int {
        AF_INET => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            let port = u16::from_be(addr.sin_port);

            Ok(Endpoint::Inet(SocketAddr::V4(SocketAddrV4::new(ip, port))))
        }

        AF_INET6 => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(addr.sin6_addr.s6_addr);
            let port = u16::from_be(addr.sin6_port);

            Ok(Endpoint::Inet(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                addr.sin6_flowinfo,
                addr.sin6_scope_id,
            ))))
        }

        AF_UNIX => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_un) };
            let offset = mem::offset_of!(sockaddr_un, sun_path);
            let path_len = (len as usize).saturating_sub(offset).min(addr.sun_path.len());

            // Unnamed and abstract sockets come back as an empty path.
            let bytes: Vec<u8> = addr.sun_path[..path_len]
                .iter()
                .map(|&c| c as u8)
                .take_while(|&b| b != 0)
                .collect();

            Ok(Endpoint::Unix(PathBuf::from(OsStr::from_bytes(&bytes))))
        }

        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported address family",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inet_storage_round_trip() {
        let endpoint = Endpoint::Inet("127.0.0.1:59800".parse().unwrap());
        let (storage, len) = endpoint_to_storage(&endpoint).unwrap();

        assert_eq!(len as usize, mem::size_of::<sockaddr_in>());
        assert_eq!(storage_to_endpoint(&storage, len).unwrap(), endpoint);
    }

    #[test]
    fn test_unix_storage_round_trip() {
        let endpoint = Endpoint::Unix(PathBuf::from("/tmp/nebula-test.sock"));
        let (storage, len) = endpoint_to_storage(&endpoint).unwrap();

        assert_eq!(storage_to_endpoint(&storage, len).unwrap(), endpoint);
    }

    #[test]
    fn test_shutdown_signals_end_of_stream() {
        use std::io::Read;
        use std::os::fd::IntoRawFd;
        use std::os::unix::net::UnixStream;

        let (local, mut peer) = UnixStream::pair().unwrap();
        let fd = local.into_raw_fd();

        sys_shutdown(fd).unwrap();

        let mut buffer = [0u8; 4];
        assert_eq!(peer.read(&mut buffer).unwrap(), 0);

        sys_close(fd);
    }

    #[test]
    fn test_unix_path_too_long() {
        let endpoint = Endpoint::Unix(PathBuf::from("/".repeat(200)));
        let err = endpoint_to_storage(&endpoint).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}

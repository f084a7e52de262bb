//! Thin wrappers over the socket syscalls.
//!
//! Everything here works on raw descriptors; ownership and role bookkeeping
//! live in `Endpoint`.

use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use crate::addr::{PeerAddr, ToSockAddr};
use crate::error::{SocketError, errno};

/// Creates a new socket for one resolved candidate.
pub(crate) fn new_socket(
	family: libc::c_int,
	socktype: libc::c_int,
	protocol: libc::c_int,
) -> Result<OwnedFd, SocketError> {
	let fd = unsafe { libc::socket(family, socktype, protocol) };
	if fd == -1 {
		return Err(SocketError::Create { errno: errno() });
	}
	Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Binds `fd` to `addr`.
pub(crate) fn bind(fd: RawFd, addr: &PeerAddr) -> Result<(), SocketError> {
	match addr.with_raw(|ptr, len| unsafe { libc::bind(fd, ptr, len) }) {
		Some(-1) => Err(SocketError::Bind { errno: errno(), addr: addr.to_string() }),
		Some(_) => Ok(()),
		None => Err(SocketError::InvalidAddress { reason: "empty address" }),
	}
}

/// Connects `fd` to `addr`, blocking unless the descriptor is non-blocking.
pub(crate) fn connect(fd: RawFd, addr: &PeerAddr) -> Result<(), SocketError> {
	match addr.with_raw(|ptr, len| unsafe { libc::connect(fd, ptr, len) }) {
		Some(-1) => Err(SocketError::Connect { errno: errno(), addr: addr.to_string() }),
		Some(_) => Ok(()),
		None => Err(SocketError::InvalidAddress { reason: "empty address" }),
	}
}

/// Marks `fd` as a passive socket.
pub(crate) fn listen(fd: RawFd, backlog: i32) -> Result<(), SocketError> {
	if unsafe { libc::listen(fd, backlog) } == -1 {
		return Err(SocketError::Listen { errno: errno(), backlog });
	}
	Ok(())
}

/// Returns the locally bound address of `fd`.
pub(crate) fn local_addr(fd: RawFd) -> Result<PeerAddr, SocketError> {
	let (rc, addr) = PeerAddr::fill_with(|ptr, len| unsafe { libc::getsockname(fd, ptr, len) });
	if rc == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "SO_SOCKNAME" });
	}
	Ok(addr)
}

/// Accepts one pending connection as a non-blocking, close-on-exec descriptor.
///
/// Returns the errno on failure so callers can tell EAGAIN from real errors.
pub(crate) fn accept(fd: RawFd) -> Result<(OwnedFd, PeerAddr), i32> {
	let (rc, addr) = PeerAddr::fill_with(|ptr, len| unsafe {
		libc::accept4(fd, ptr, len, libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC)
	});
	if rc == -1 {
		return Err(errno());
	}
	Ok((unsafe { OwnedFd::from_raw_fd(rc) }, addr))
}

/// One `send(2)`; returns bytes sent or the errno.
pub(crate) fn send(fd: RawFd, buf: &[u8], flags: libc::c_int) -> Result<usize, i32> {
	let n = unsafe {
		libc::send(fd, buf.as_ptr() as *const libc::c_void, buf.len(), flags)
	};
	if n == -1 { Err(errno()) } else { Ok(n as usize) }
}

/// One `recv(2)`; returns bytes received (0 = orderly shutdown) or the errno.
pub(crate) fn recv(fd: RawFd, buf: &mut [u8], flags: libc::c_int) -> Result<usize, i32> {
	let n = unsafe {
		libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), flags)
	};
	if n == -1 { Err(errno()) } else { Ok(n as usize) }
}

use crate::error::SocketError;
use super::endpoint::{Endpoint, Role};
use super::raw;

/// Result of a non-blocking accept attempt.
///
/// This enum does **not** represent socket state.
/// It represents the **outcome of a syscall probe**; the listener stays
/// `Listening` in all cases.
#[derive(Debug)]
pub enum AcceptResult {
	/// A connection was accepted.
	///
	/// The endpoint is `Accepted`, non-blocking and close-on-exec, and
	/// carries the peer address. It **may not yet be readable**.
	Connection(Endpoint),

	/// No connection is pending. Not an error; wait for readiness.
	WouldBlock,

	/// The accept syscall was interrupted by a signal. Safe to retry.
	Interrupted,
}

/// Accepts one pending connection on a listening endpoint.
///
/// Calling this on an endpoint that is not `Listening` is a contract
/// violation: it fails with `SocketError::InvalidRole` before any syscall.
pub fn accept(listener: &Endpoint) -> crate::Result<AcceptResult> {
	listener.require_role(Role::Listening, "accept")?;
	if !listener.is_open() {
		return Err(SocketError::Accept { errno: libc::EBADF }.into());
	}

	match raw::accept(listener.fd()) {
		Ok((fd, addr)) => {
			tracing::debug!(listener = listener.fd(), peer = %addr, "accepted connection");
			Ok(AcceptResult::Connection(Endpoint::accepted(fd, addr)))
		}
		Err(err) if err == libc::EAGAIN || err == libc::EWOULDBLOCK => Ok(AcceptResult::WouldBlock),
		Err(libc::EINTR) | Err(libc::ECONNABORTED) => Ok(AcceptResult::Interrupted),
		Err(errno) => Err(SocketError::Accept { errno }.into()),
	}
}

use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::addr::{Family, NameFlags, PeerAddr, name_info};
use crate::error::{SocketError, errno};
use super::raw;

/// Descriptor value reported by an endpoint that owns no socket.
pub const INVALID_FD: RawFd = -1;

/// Lifecycle role of an endpoint.
///
/// The role records how the descriptor was obtained; role-specific
/// operations (`listen`, `connect`, `accept`) check it before touching the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
	/// Created from a host/service pair, no descriptor yet.
	#[default]
	Unresolved,
	/// Bound and listening for connections.
	Listening,
	/// Connected to a remote peer (client side).
	Connected,
	/// Produced by accept on a listener (server side).
	Accepted,
}

impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Role::Unresolved => "unresolved",
			Role::Listening => "listening",
			Role::Connected => "connected",
			Role::Accepted => "accepted",
		}
	}
}

impl std::fmt::Display for Role {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// How the socket should be shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
	Read,   // SHUT_RD
	Write,  // SHUT_WR
	ReadWrite,   // SHUT_RDWR
}

/// One socket: requested name, resolved address, descriptor and role.
///
/// The endpoint owns its descriptor exclusively. Dropping it closes the
/// descriptor; `take` moves it out of a container and leaves an empty,
/// unresolved endpoint behind.
#[derive(Debug, Default)]
pub struct Endpoint {
	host: String,
	service: String,
	family: Family,
	addr: PeerAddr,
	fd: Option<OwnedFd>,
	role: Role,
	status: i32,
}

impl Endpoint {
	/// Creates an unresolved endpoint. An empty host means the wildcard address.
	pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
		Self {
			host: host.into(),
			service: service.into(),
			..Self::default()
		}
	}

	/// Wraps a descriptor and peer address produced by accept.
	pub fn accepted(fd: OwnedFd, addr: PeerAddr) -> Self {
		Self {
			family: addr.family(),
			addr,
			fd: Some(fd),
			role: Role::Accepted,
			..Self::default()
		}
	}

	/// Requested host; empty for wildcard or accepted endpoints.
	pub fn host(&self) -> &str {
		&self.host
	}

	/// Requested service or port.
	pub fn service(&self) -> &str {
		&self.service
	}

	/// Resolved address family, `Unspec` until resolved.
	pub fn family(&self) -> Family {
		self.family
	}

	/// Resolved address: the bound interface for listeners, the peer otherwise.
	pub fn addr(&self) -> &PeerAddr {
		&self.addr
	}

	pub fn role(&self) -> Role {
		self.role
	}

	/// Last OS status code recorded by an operation on this endpoint.
	pub fn status(&self) -> i32 {
		self.status
	}

	/// The raw descriptor, or `INVALID_FD` when none is owned.
	#[inline]
	pub fn fd(&self) -> RawFd {
		self.fd.as_ref().map_or(INVALID_FD, |fd| fd.as_raw_fd())
	}

	#[inline]
	pub fn is_open(&self) -> bool {
		self.fd.is_some()
	}

	/// Closes the descriptor. Closing an already-closed endpoint is a no-op.
	pub fn close(&mut self) -> crate::Result<()> {
		let Some(fd) = self.fd.take() else {
			return Ok(());
		};
		let raw = fd.into_raw_fd();
		tracing::debug!(fd = raw, role = %self.role, "closing endpoint");
		if unsafe { libc::close(raw) } == -1 {
			self.status = errno();
			return Err(SocketError::Close { errno: self.status }.into());
		}
		Ok(())
	}

	/// Moves the endpoint out, leaving an empty unresolved one in its place.
	pub fn take(&mut self) -> Endpoint {
		std::mem::take(self)
	}

	/// Shuts down one or both directions of the connection.
	pub fn shutdown(&self, how: Shutdown) -> crate::Result<()> {
		let how = match how {
			Shutdown::Read => libc::SHUT_RD,
			Shutdown::Write => libc::SHUT_WR,
			Shutdown::ReadWrite => libc::SHUT_RDWR,
		};
		if unsafe { libc::shutdown(self.fd(), how) } == -1 {
			return Err(SocketError::Shutdown { errno: errno() }.into());
		}
		Ok(())
	}

	/// Peer identity as `<host>:<service>` with numeric service, no FQDN.
	///
	/// For listening endpoints this names the local bound interface.
	pub fn peer_name(&self) -> crate::Result<String> {
		self.peer_name_with(NameFlags::default())
	}

	/// Peer identity rendered with explicit `getnameinfo` flags.
	pub fn peer_name_with(&self, flags: NameFlags) -> crate::Result<String> {
		Ok(name_info(&self.addr, flags)?)
	}

	/// Address the descriptor is bound to locally.
	pub fn local_addr(&self) -> crate::Result<PeerAddr> {
		Ok(raw::local_addr(self.fd())?)
	}

	/// Installs a freshly bound or connected descriptor.
	pub(crate) fn establish(&mut self, fd: OwnedFd, family: Family, addr: PeerAddr, role: Role) {
		self.fd = Some(fd);
		self.family = family;
		self.addr = addr;
		self.role = role;
		self.status = 0;
	}

	pub(crate) fn set_status(&mut self, status: i32) {
		self.status = status;
	}

	/// Fails with `InvalidRole` unless the endpoint is in `expected` role.
	pub(crate) fn require_role(&self, expected: Role, operation: &'static str) -> Result<(), SocketError> {
		if self.role != expected {
			return Err(SocketError::InvalidRole {
				operation,
				expected: expected.as_str(),
				found: self.role.as_str(),
			});
		}
		Ok(())
	}
}

impl AsRawFd for Endpoint {
	fn as_raw_fd(&self) -> RawFd {
		self.fd()
	}
}

//! Address families and the opaque peer address blob.
//!
//! Endpoints carry their resolved address as a raw `sockaddr_storage` plus a
//! length, exactly as `getaddrinfo`/`accept` hand it over. Conversions to and
//! from `std::net` types live in the per-family submodules.

mod ipv4;
mod ipv6;
mod resolve;

pub(crate) use self::resolve::{AddrInfo, Candidate};
pub use self::resolve::NameFlags;
pub(crate) use self::resolve::name_info;

/// Address family of an endpoint or a preference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Family {
	/// IPv4 (`AF_INET`).
	Inet,
	/// IPv6 (`AF_INET6`).
	Inet6,
	/// Any family (`AF_UNSPEC`).
	#[default]
	Unspec,
}

impl Family {
	/// Returns the libc constant for this address family.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Family::Inet => libc::AF_INET,
			Family::Inet6 => libc::AF_INET6,
			Family::Unspec => libc::AF_UNSPEC,
		}
	}

	/// Maps a libc family constant; anything unknown is `Unspec`.
	pub fn from_raw(raw: libc::c_int) -> Self {
		match raw {
			libc::AF_INET => Family::Inet,
			libc::AF_INET6 => Family::Inet6,
			_ => Family::Unspec,
		}
	}

	/// True when a candidate of family `other` satisfies this preference.
	#[inline]
	pub fn accepts(self, other: Family) -> bool {
		self == Family::Unspec || self == other
	}
}

impl std::fmt::Display for Family {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Family::Inet => "inet",
			Family::Inet6 => "inet6",
			Family::Unspec => "unspec",
		})
	}
}

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	/// Returns None if the address cannot be expressed as a sockaddr.
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

/// Trait for address types that can be created from raw sockaddr.
pub trait FromSockAddr: Sized {
	/// Creates address from raw sockaddr storage.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

/// A resolved socket address kept as an opaque byte blob.
///
/// Capacity is one `sockaddr_storage`; the stored length never exceeds it.
#[derive(Clone, Copy)]
pub struct PeerAddr {
	storage: libc::sockaddr_storage,
	len: libc::socklen_t,
}

impl PeerAddr {
	/// Capacity of the address storage in bytes.
	pub const CAPACITY: usize = std::mem::size_of::<libc::sockaddr_storage>();

	/// An empty (cleared) address.
	pub fn empty() -> Self {
		Self {
			storage: unsafe { std::mem::zeroed() },
			len: 0,
		}
	}

	/// Copies `len` bytes of a raw sockaddr.
	///
	/// Returns None when `len` exceeds the storage capacity.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	pub(crate) unsafe fn from_raw(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len as usize > Self::CAPACITY {
			return None;
		}
		let mut out = Self::empty();
		unsafe {
			std::ptr::copy_nonoverlapping(
				addr as *const u8,
				&mut out.storage as *mut _ as *mut u8,
				len as usize,
			);
		}
		out.len = len;
		Some(out)
	}

	/// Fills the address from a syscall that writes a sockaddr (accept, getsockname).
	///
	/// The closure receives the storage pointer and an in/out length set to the capacity.
	pub(crate) fn fill_with<F>(f: F) -> (libc::c_int, Self)
	where
		F: FnOnce(*mut libc::sockaddr, *mut libc::socklen_t) -> libc::c_int,
	{
		let mut out = Self::empty();
		let mut len = Self::CAPACITY as libc::socklen_t;
		let rc = f(&mut out.storage as *mut _ as *mut libc::sockaddr, &mut len);
		out.len = if rc == -1 { 0 } else { len.min(Self::CAPACITY as libc::socklen_t) };
		(rc, out)
	}

	/// Stored length in bytes.
	#[inline]
	pub fn len(&self) -> usize {
		self.len as usize
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Family recorded in the blob, `Unspec` when empty.
	pub fn family(&self) -> Family {
		if self.is_empty() {
			return Family::Unspec;
		}
		Family::from_raw(self.storage.ss_family as libc::c_int)
	}

	/// The raw address bytes.
	pub fn as_bytes(&self) -> &[u8] {
		unsafe {
			std::slice::from_raw_parts(&self.storage as *const _ as *const u8, self.len as usize)
		}
	}

	/// Converts to a `std::net::SocketAddr` for IPv4/IPv6 blobs.
	pub fn to_socket_addr(&self) -> Option<std::net::SocketAddr> {
		let ptr = &self.storage as *const _ as *const libc::sockaddr;
		unsafe { std::net::SocketAddr::from_sockaddr(ptr, self.len) }
	}
}

impl Default for PeerAddr {
	fn default() -> Self {
		Self::empty()
	}
}

impl PartialEq for PeerAddr {
	fn eq(&self, other: &Self) -> bool {
		self.as_bytes() == other.as_bytes()
	}
}

impl Eq for PeerAddr {}

impl std::fmt::Debug for PeerAddr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.to_socket_addr() {
			Some(addr) => write!(f, "PeerAddr({addr})"),
			None => write!(f, "PeerAddr({}, {} bytes)", self.family(), self.len),
		}
	}
}

impl std::fmt::Display for PeerAddr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.to_socket_addr() {
			Some(addr) => write!(f, "{addr}"),
			None => write!(f, "<{}>", self.family()),
		}
	}
}

impl ToSockAddr for PeerAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		if self.is_empty() {
			return None;
		}
		Some(f(&self.storage as *const _ as *const libc::sockaddr, self.len))
	}
}

impl From<std::net::SocketAddr> for PeerAddr {
	fn from(addr: std::net::SocketAddr) -> Self {
		addr.with_raw(|ptr, len| unsafe { Self::from_raw(ptr, len) })
			.flatten()
			.unwrap_or_default()
	}
}

impl ToSockAddr for std::net::SocketAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		match self {
			std::net::SocketAddr::V4(v4) => v4.with_raw(f),
			std::net::SocketAddr::V6(v6) => v6.with_raw(f),
		}
	}
}

impl FromSockAddr for std::net::SocketAddr {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if (len as usize) < std::mem::size_of::<libc::sa_family_t>() {
			return None;
		}
		let family = unsafe { (*addr).sa_family } as libc::c_int;
		match family {
			libc::AF_INET => unsafe { std::net::SocketAddrV4::from_sockaddr(addr, len) }.map(Self::V4),
			libc::AF_INET6 => unsafe { std::net::SocketAddrV6::from_sockaddr(addr, len) }.map(Self::V6),
			_ => None,
		}
	}
}

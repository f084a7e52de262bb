use std::net::{Ipv6Addr, SocketAddrV6};

use super::{FromSockAddr, ToSockAddr};

/// Converts to the raw sockaddr_in6 for syscalls.
///
/// Flow info and scope ID are carried through; scope matters for link-local (fe80::) peers.
pub(crate) fn to_raw(addr: &SocketAddrV6) -> libc::sockaddr_in6 {
	let mut raw: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
	raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
	raw.sin6_port = addr.port().to_be();
	raw.sin6_flowinfo = addr.flowinfo();
	raw.sin6_addr = libc::in6_addr {
		s6_addr: addr.ip().octets(),
	};
	raw.sin6_scope_id = addr.scope_id();
	raw
}

/// Creates from raw sockaddr_in6.
pub(crate) fn from_raw(raw: &libc::sockaddr_in6) -> SocketAddrV6 {
	SocketAddrV6::new(
		Ipv6Addr::from(raw.sin6_addr.s6_addr),
		u16::from_be(raw.sin6_port),
		raw.sin6_flowinfo,
		raw.sin6_scope_id,
	)
}

impl ToSockAddr for SocketAddrV6 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = to_raw(self);
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

impl FromSockAddr for SocketAddrV6 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if (len as usize) < std::mem::size_of::<libc::sockaddr_in6>() {
			return None;
		}
		let raw = unsafe { std::ptr::read_unaligned(addr as *const libc::sockaddr_in6) };
		if raw.sin6_family as libc::c_int != libc::AF_INET6 {
			return None;
		}
		Some(from_raw(&raw))
	}
}

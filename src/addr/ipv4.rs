use std::net::{Ipv4Addr, SocketAddrV4};

use super::{FromSockAddr, ToSockAddr};

/// Converts to the raw sockaddr_in for syscalls.
pub(crate) fn to_raw(addr: &SocketAddrV4) -> libc::sockaddr_in {
	let mut raw: libc::sockaddr_in = unsafe { std::mem::zeroed() };
	raw.sin_family = libc::AF_INET as libc::sa_family_t;
	raw.sin_port = addr.port().to_be();
	raw.sin_addr = libc::in_addr {
		s_addr: u32::from_ne_bytes(addr.ip().octets()),
	};
	raw
}

/// Creates from raw sockaddr_in.
pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> SocketAddrV4 {
	SocketAddrV4::new(
		Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes()),
		u16::from_be(raw.sin_port),
	)
}

impl ToSockAddr for SocketAddrV4 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = to_raw(self);  // sockaddr_in lives on this stack frame
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

impl FromSockAddr for SocketAddrV4 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if (len as usize) < std::mem::size_of::<libc::sockaddr_in>() {
			return None;
		}
		let raw = unsafe { std::ptr::read_unaligned(addr as *const libc::sockaddr_in) };
		if raw.sin_family as libc::c_int != libc::AF_INET {
			return None;
		}
		Some(from_raw(&raw))
	}
}

//! Name-to-address lookup (`getaddrinfo`) and the reverse (`getnameinfo`).

use std::ffi::{CStr, CString};

use super::{Family, PeerAddr};
use crate::error::{SocketError, errno};

const NI_MAXHOST: usize = 1025;
const NI_MAXSERV: usize = 32;

/// Owned result list of one `getaddrinfo` call; freed on drop.
pub(crate) struct AddrInfo {
	head: *mut libc::addrinfo,
}

/// One candidate address produced by a lookup.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
	pub family: Family,
	pub raw_family: libc::c_int,
	pub socktype: libc::c_int,
	pub protocol: libc::c_int,
	pub addr: PeerAddr,
}

impl AddrInfo {
	/// Resolves a host/service pair into stream-socket candidates.
	///
	/// An empty host resolves to the wildcard address when `passive` is set
	/// (server role), and to the loopback address otherwise.
	pub fn lookup(host: &str, service: &str, passive: bool) -> Result<Self, SocketError> {
		let c_host = if host.is_empty() {
			None
		} else {
			Some(CString::new(host).map_err(|_| SocketError::InvalidAddress {
				reason: "host contains a NUL byte",
			})?)
		};
		let c_service = CString::new(service).map_err(|_| SocketError::InvalidAddress {
			reason: "service contains a NUL byte",
		})?;

		let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
		hints.ai_family = libc::AF_UNSPEC;
		hints.ai_socktype = libc::SOCK_STREAM;
		if passive {
			hints.ai_flags = libc::AI_PASSIVE;
		}

		let mut head: *mut libc::addrinfo = std::ptr::null_mut();
		let code = unsafe {
			libc::getaddrinfo(
				c_host.as_ref().map_or(std::ptr::null(), |h| h.as_ptr()),
				c_service.as_ptr(),
				&hints,
				&mut head,
			)
		};

		if code != 0 {
			if !head.is_null() {
				unsafe { libc::freeaddrinfo(head) };
			}
			return Err(SocketError::Resolve {
				host: host.to_owned(),
				service: service.to_owned(),
				code,
				reason: gai_reason(code),
			});
		}

		Ok(Self { head })
	}

	/// Iterates the candidates in resolver order.
	pub fn candidates(&self) -> impl Iterator<Item = Candidate> + '_ {
		let mut cursor = self.head;
		std::iter::from_fn(move || {
			while !cursor.is_null() {
				let info = unsafe { &*cursor };
				cursor = info.ai_next;
				// Entries whose address does not fit the storage are skipped.
				if let Some(addr) = unsafe { PeerAddr::from_raw(info.ai_addr, info.ai_addrlen) } {
					return Some(Candidate {
						family: Family::from_raw(info.ai_family),
						raw_family: info.ai_family,
						socktype: info.ai_socktype,
						protocol: info.ai_protocol,
						addr,
					});
				}
			}
			None
		})
	}
}

impl Drop for AddrInfo {
	fn drop(&mut self) {
		if !self.head.is_null() {
			unsafe { libc::freeaddrinfo(self.head) };
		}
	}
}

/// Flags passed to `getnameinfo` when rendering a peer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameFlags(libc::c_int);

impl Default for NameFlags {
	/// Numeric service, no fully qualified domain name.
	fn default() -> Self {
		Self(libc::NI_NOFQDN | libc::NI_NUMERICSERV)
	}
}

impl NameFlags {
	pub fn new() -> Self {
		Self::default()
	}

	/// Default flags plus a numeric host (no reverse lookup).
	pub fn numeric() -> Self {
		Self(libc::NI_NOFQDN | libc::NI_NUMERICSERV | libc::NI_NUMERICHOST)
	}

	/// Arbitrary `NI_*` flags.
	pub fn from_raw(flags: libc::c_int) -> Self {
		Self(flags)
	}

	#[inline]
	pub fn raw(self) -> libc::c_int {
		self.0
	}
}

/// Renders an address as `<host>:<service>`.
pub(crate) fn name_info(addr: &PeerAddr, flags: NameFlags) -> Result<String, SocketError> {
	let mut host = [0 as libc::c_char; NI_MAXHOST];
	let mut serv = [0 as libc::c_char; NI_MAXSERV];

	let bytes = addr.as_bytes();
	if bytes.is_empty() {
		return Err(SocketError::InvalidAddress { reason: "endpoint has no resolved address" });
	}

	let code = unsafe {
		libc::getnameinfo(
			bytes.as_ptr() as *const libc::sockaddr,
			bytes.len() as libc::socklen_t,
			host.as_mut_ptr(),
			host.len() as _,
			serv.as_mut_ptr(),
			serv.len() as _,
			flags.raw(),
		)
	};

	if code != 0 {
		return Err(SocketError::NameInfo { code, reason: gai_reason(code) });
	}

	let host = unsafe { CStr::from_ptr(host.as_ptr()) }.to_string_lossy();
	let serv = unsafe { CStr::from_ptr(serv.as_ptr()) }.to_string_lossy();
	Ok(format!("{host}:{serv}"))
}

fn gai_reason(code: libc::c_int) -> String {
	if code == libc::EAI_SYSTEM {
		return std::io::Error::from_raw_os_error(errno()).to_string();
	}
	unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
		.to_string_lossy()
		.into_owned()
}

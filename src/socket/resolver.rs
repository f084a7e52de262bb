//! Turning a host/service pair into a listening or connected endpoint.
//!
//! The pair is resolved once; candidates are then tried in family-preference
//! order. A failing candidate is closed and skipped, and only running out of
//! candidates is reported, as `SocketError::Exhausted` with the last errno.

use std::os::fd::{AsRawFd, OwnedFd};

use crate::addr::{AddrInfo, Candidate, Family, PeerAddr};
use crate::error::SocketError;
use super::config::ListenConfig;
use super::endpoint::{Endpoint, Role};
use super::options::{set_cloexec, set_nonblocking, set_reuse_addr};
use super::raw;

/// Ordered address-family preferences.
///
/// `Family::Unspec` is always tried last, even when not listed, so a
/// preference list never rules out a working candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyPrefs {
	order: Vec<Family>,
}

impl Default for FamilyPrefs {
	/// Prefer IPv6, then IPv4, then anything.
	fn default() -> Self {
		Self::new([Family::Inet6, Family::Inet])
	}
}

impl FamilyPrefs {
	pub fn new(families: impl IntoIterator<Item = Family>) -> Self {
		Self { order: families.into_iter().collect() }
	}

	/// Try every candidate in resolver order.
	pub fn any() -> Self {
		Self::new([Family::Unspec])
	}

	/// Appends a preference.
	pub fn then(mut self, family: Family) -> Self {
		self.order.push(family);
		self
	}

	/// Effective order, including the implicit trailing `Unspec`.
	pub fn order(&self) -> impl Iterator<Item = Family> + '_ {
		let tail = (!self.order.contains(&Family::Unspec)).then_some(Family::Unspec);
		self.order.iter().copied().chain(tail)
	}
}

#[derive(Debug, Clone, Copy)]
enum Establish {
	Listen { backlog: i32 },
	Connect,
}

impl Establish {
	fn role(self) -> Role {
		match self {
			Establish::Listen { .. } => Role::Listening,
			Establish::Connect => Role::Connected,
		}
	}
}

/// Binds and listens on the first candidate that works.
///
/// On success the endpoint is `Listening`, non-blocking and close-on-exec, and
/// its address is the actual bound one (a `"0"` service reports the real port).
pub fn listen(endpoint: &mut Endpoint, config: &ListenConfig) -> crate::Result<()> {
	endpoint.require_role(Role::Unresolved, "listen")?;
	resolve(endpoint, &config.families, Establish::Listen { backlog: config.backlog })
}

/// Connects to the first candidate that accepts, then switches the
/// descriptor to non-blocking mode.
pub fn connect(endpoint: &mut Endpoint, prefs: &FamilyPrefs) -> crate::Result<()> {
	endpoint.require_role(Role::Unresolved, "connect")?;
	resolve(endpoint, prefs, Establish::Connect)
}

fn resolve(endpoint: &mut Endpoint, prefs: &FamilyPrefs, mode: Establish) -> crate::Result<()> {
	let passive = matches!(mode, Establish::Listen { .. });
	let info = AddrInfo::lookup(endpoint.host(), endpoint.service(), passive)?;
	let candidates: Vec<Candidate> = info.candidates().collect();
	drop(info);

	let mut tried = vec![false; candidates.len()];
	let mut last_errno = 0;

	for pref in prefs.order() {
		for (index, candidate) in candidates.iter().enumerate() {
			if tried[index] || !pref.accepts(candidate.family) {
				continue;
			}
			tried[index] = true;

			match establish(candidate, mode) {
				Ok((fd, addr)) => {
					tracing::info!(
						fd = fd.as_raw_fd(),
						family = %candidate.family,
						addr = %addr,
						role = %mode.role(),
						"endpoint established"
					);
					endpoint.establish(fd, candidate.family, addr, mode.role());
					return Ok(());
				}
				Err(err) => {
					last_errno = err.os_code().unwrap_or(last_errno);
					tracing::debug!(
						family = %candidate.family,
						addr = %candidate.addr,
						error = %err,
						"candidate failed"
					);
				}
			}
		}
	}

	endpoint.set_status(last_errno);
	Err(SocketError::Exhausted {
		host: endpoint.host().to_owned(),
		service: endpoint.service().to_owned(),
		errno: last_errno,
	}
	.into())
}

/// Creates a socket for one candidate and binds or connects it.
///
/// The descriptor is closed on any failure when `fd` drops.
fn establish(candidate: &Candidate, mode: Establish) -> crate::Result<(OwnedFd, PeerAddr)> {
	let fd = raw::new_socket(candidate.raw_family, candidate.socktype, candidate.protocol)?;

	match mode {
		Establish::Listen { backlog } => {
			set_reuse_addr(&fd, true)?;
			raw::bind(fd.as_raw_fd(), &candidate.addr)?;
			raw::listen(fd.as_raw_fd(), backlog)?;
			set_nonblocking(&fd, true)?;
			set_cloexec(&fd, true)?;
			let bound = raw::local_addr(fd.as_raw_fd()).unwrap_or(candidate.addr);
			Ok((fd, bound))
		}
		Establish::Connect => {
			raw::connect(fd.as_raw_fd(), &candidate.addr)?;
			set_nonblocking(&fd, true)?;
			Ok((fd, candidate.addr))
		}
	}
}

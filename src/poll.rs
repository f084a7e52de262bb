//! Readiness multiplexing over many descriptors with one `poll(2)` call.
//!
//! Interest is registered per descriptor, one bounded wait covers all of
//! them, and readiness is queried per descriptor afterwards. Results are only
//! meaningful until the next `poll`.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use crate::error::{SocketError, errno};

/// One readiness kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
	Read,
	Write,
	Except,
}

impl Kind {
	#[inline]
	fn bit(self) -> u8 {
		match self {
			Kind::Read => 0b001,
			Kind::Write => 0b010,
			Kind::Except => 0b100,
		}
	}
}

/// Set of readiness kinds a descriptor should be watched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interest(u8);

impl Interest {
	pub const NONE: Interest = Interest(0);
	pub const READ: Interest = Interest(0b001);
	pub const WRITE: Interest = Interest(0b010);
	pub const EXCEPT: Interest = Interest(0b100);
	pub const ALL: Interest = Interest(0b111);

	#[inline]
	pub fn contains(self, kind: Kind) -> bool {
		self.0 & kind.bit() != 0
	}

	#[inline]
	pub fn is_empty(self) -> bool {
		self.0 == 0
	}

	fn events(self) -> libc::c_short {
		let mut events = 0;
		if self.contains(Kind::Read) {
			events |= libc::POLLIN;
		}
		if self.contains(Kind::Write) {
			events |= libc::POLLOUT;
		}
		if self.contains(Kind::Except) {
			events |= libc::POLLPRI;
		}
		events
	}
}

impl From<Kind> for Interest {
	fn from(kind: Kind) -> Self {
		Interest(kind.bit())
	}
}

impl std::ops::BitOr for Interest {
	type Output = Interest;

	fn bitor(self, rhs: Interest) -> Interest {
		Interest(self.0 | rhs.0)
	}
}

impl std::ops::BitOrAssign for Interest {
	fn bitor_assign(&mut self, rhs: Interest) {
		self.0 |= rhs.0;
	}
}

/// Readiness reported for one descriptor by the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ready(u8);

impl Ready {
	pub const EMPTY: Ready = Ready(0);

	#[inline]
	pub fn is(self, kind: Kind) -> bool {
		self.0 & kind.bit() != 0
	}

	#[inline]
	pub fn is_readable(self) -> bool {
		self.is(Kind::Read)
	}

	#[inline]
	pub fn is_writable(self) -> bool {
		self.is(Kind::Write)
	}

	#[inline]
	pub fn is_exceptional(self) -> bool {
		self.is(Kind::Except)
	}

	#[inline]
	pub fn is_empty(self) -> bool {
		self.0 == 0
	}
}

/// Maps `revents` to readiness, keeping only the kinds that were asked for.
///
/// Hang-up and error count as readable so the next read observes them;
/// an invalid descriptor is always reported as exceptional.
fn classify(revents: libc::c_short, interest: Interest) -> Ready {
	let mut bits = 0;
	if revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 && interest.contains(Kind::Read) {
		bits |= Kind::Read.bit();
	}
	if revents & (libc::POLLOUT | libc::POLLERR) != 0 && interest.contains(Kind::Write) {
		bits |= Kind::Write.bit();
	}
	if revents & libc::POLLPRI != 0 && interest.contains(Kind::Except) {
		bits |= Kind::Except.bit();
	}
	if revents & libc::POLLNVAL != 0 {
		bits |= Kind::Except.bit();
	}
	Ready(bits)
}

/// Milliseconds for `poll(2)`, rounded up so a wait never ends early.
fn timeout_ms(remaining: Duration) -> libc::c_int {
	let ms = remaining.as_nanos().div_ceil(1_000_000);
	ms.min(libc::c_int::MAX as u128) as libc::c_int
}

/// Interest registry plus the results of the most recent poll.
#[derive(Default)]
pub struct Multiplexer {
	fds: Vec<libc::pollfd>,
	interests: Vec<Interest>,
	ready: Vec<Ready>,
	index: HashMap<RawFd, usize>,
}

impl Multiplexer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Drops every registration and result.
	pub fn clear(&mut self) {
		self.fds.clear();
		self.interests.clear();
		self.ready.clear();
		self.index.clear();
	}

	/// Number of registered descriptors.
	pub fn len(&self) -> usize {
		self.fds.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fds.is_empty()
	}

	/// Adds `interest` for a descriptor, merging with any earlier registration.
	///
	/// Closed descriptors and empty interest are ignored.
	pub fn register<S: AsRawFd + ?Sized>(&mut self, source: &S, interest: Interest) {
		self.register_fd(source.as_raw_fd(), interest);
	}

	pub fn register_fd(&mut self, fd: RawFd, interest: Interest) {
		if fd < 0 || interest.is_empty() {
			return;
		}
		if let Some(&slot) = self.index.get(&fd) {
			self.interests[slot] |= interest;
			self.fds[slot].events = self.interests[slot].events();
			return;
		}
		self.index.insert(fd, self.fds.len());
		self.fds.push(libc::pollfd { fd, events: interest.events(), revents: 0 });
		self.interests.push(interest);
		self.ready.push(Ready::EMPTY);
	}

	/// Waits once for readiness on every registered descriptor.
	///
	/// `None` waits indefinitely, `Some(Duration::ZERO)` only probes.
	/// Returns how many descriptors have any readiness. A signal
	/// interruption is retried with the remaining time; any other failure is
	/// returned as `SocketError::Poll`.
	pub fn poll(&mut self, timeout: Option<Duration>) -> crate::Result<usize> {
		for pfd in &mut self.fds {
			pfd.revents = 0;
		}
		for ready in &mut self.ready {
			*ready = Ready::EMPTY;
		}

		// A deadline past Instant's range is as good as none.
		let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

		loop {
			let wait = match deadline {
				Some(deadline) => timeout_ms(deadline.saturating_duration_since(Instant::now())),
				None => -1,
			};
			let rc = unsafe {
				libc::poll(self.fds.as_mut_ptr(), self.fds.len() as libc::nfds_t, wait)
			};
			if rc >= 0 {
				break;
			}
			let err = errno();
			if err == libc::EINTR {
				tracing::trace!("poll interrupted, retrying");
				continue;
			}
			tracing::warn!(errno = err, registered = self.fds.len(), "poll failed");
			return Err(SocketError::Poll { errno: err }.into());
		}

		let mut count = 0;
		for (slot, pfd) in self.fds.iter().enumerate() {
			let ready = classify(pfd.revents, self.interests[slot]);
			if !ready.is_empty() {
				count += 1;
			}
			self.ready[slot] = ready;
		}
		tracing::trace!(registered = self.fds.len(), ready = count, "poll returned");
		Ok(count)
	}

	/// Readiness of a descriptor in the last poll; empty if unregistered.
	pub fn ready<S: AsRawFd + ?Sized>(&self, source: &S) -> Ready {
		self.ready_fd(source.as_raw_fd())
	}

	pub fn ready_fd(&self, fd: RawFd) -> Ready {
		self.index.get(&fd).map_or(Ready::EMPTY, |&slot| self.ready[slot])
	}

	/// Whether a descriptor was ready for `kind` in the last poll.
	pub fn is_ready<S: AsRawFd + ?Sized>(&self, source: &S, kind: Kind) -> bool {
		self.ready(source).is(kind)
	}
}

impl std::fmt::Debug for Multiplexer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_map()
			.entries(self.fds.iter().zip(&self.interests).map(|(pfd, interest)| (pfd.fd, interest)))
			.finish()
	}
}

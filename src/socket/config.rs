use super::resolver::FamilyPrefs;

/// Default capacity of each stream buffer, the platform `BUFSIZ`.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Smallest pushback margin a stream adapter will use.
pub const MIN_PUSHBACK: usize = 8;

// ============================================================================
// Stream Configuration
// ============================================================================

/// Buffer sizing for a `SocketStream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
	pub buffer_size: usize,
	pub pushback: usize,
}

impl Default for StreamConfig {
	fn default() -> Self {
		Self {
			buffer_size: DEFAULT_BUFFER_SIZE,
			pushback: MIN_PUSHBACK,
		}
	}
}

impl StreamConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Capacity of the output buffer and of the input data region. At least 1.
	pub fn buffer_size(mut self, size: usize) -> Self {
		self.buffer_size = size.max(1);
		self
	}

	/// Bytes reserved for unget. Clamped to `MIN_PUSHBACK`.
	pub fn pushback(mut self, size: usize) -> Self {
		self.pushback = size.max(MIN_PUSHBACK);
		self
	}
}

// ============================================================================
// Listen Configuration
// ============================================================================

/// Parameters for resolving a listening endpoint.
///
/// Socket options on the listener (reuse, non-blocking, close-on-exec) are
/// fixed policy and not part of this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
	pub backlog: i32,
	pub families: FamilyPrefs,
}

impl Default for ListenConfig {
	fn default() -> Self {
		Self {
			backlog: 128,
			families: FamilyPrefs::default(),
		}
	}
}

impl ListenConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Set listen backlog. Default: 128.
	pub fn backlog(mut self, backlog: i32) -> Self {
		self.backlog = backlog;
		self
	}

	/// Set family preference order. Default: IPv6, IPv4, any.
	pub fn families(mut self, families: FamilyPrefs) -> Self {
		self.families = families;
		self
	}
}

//! Registry of listening endpoints and accepted connections.
//!
//! A `Server` is driven by one thread in cycles: `poll_and_classify` waits
//! once for readiness, then the caller accepts pending connections and
//! services ready ones. Accepted connections are staged and join the polled
//! set at the start of the next cycle, so the set never changes while a
//! caller is walking the current one.

use std::time::Duration;

use crate::addr::NameFlags;
use crate::error::SocketError;
use crate::poll::{Interest, Kind, Multiplexer, Ready};
use crate::socket::{
	self, AcceptResult, Endpoint, ListenConfig, Role, SocketStream, StreamConfig,
};

// ============================================================================
// Configuration
// ============================================================================

/// How a `Server` resolves listeners and wraps accepted connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
	pub listen: ListenConfig,
	pub stream: StreamConfig,
	/// Interest given to every newly accepted connection.
	pub default_interest: Interest,
	/// How accepted peers are named; numeric by default, so accepting never
	/// waits on a reverse lookup.
	pub name_flags: NameFlags,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: ListenConfig::default(),
			stream: StreamConfig::default(),
			default_interest: Interest::READ,
			name_flags: NameFlags::numeric(),
		}
	}
}

impl ServerConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn listen(mut self, listen: ListenConfig) -> Self {
		self.listen = listen;
		self
	}

	pub fn stream(mut self, stream: StreamConfig) -> Self {
		self.stream = stream;
		self
	}

	/// Set initial interest for accepted connections. Default: read.
	pub fn default_interest(mut self, interest: Interest) -> Self {
		self.default_interest = interest;
		self
	}

	pub fn name_flags(mut self, flags: NameFlags) -> Self {
		self.name_flags = flags;
		self
	}
}

// ============================================================================
// Identifiers and results
// ============================================================================

/// Stable handle for a connection; never reused by the same server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
	pub fn get(self) -> u64 {
		self.0
	}
}

impl std::fmt::Display for ConnectionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Index of a listener in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(usize);

impl ListenerId {
	pub fn index(self) -> usize {
		self.0
	}
}

/// Outcome of `Server::accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
	/// A connection was accepted and staged for the next cycle.
	Accepted(ConnectionId),
	WouldBlock,
	Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyConnection {
	pub id: ConnectionId,
	pub ready: Ready,
}

/// What one poll cycle found, with pending accepts kept apart from
/// connections that have data or room to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadySummary {
	/// Descriptors with any readiness.
	pub count: usize,
	pub pending_accepts: Vec<ListenerId>,
	pub ready: Vec<ReadyConnection>,
}

impl ReadySummary {
	pub fn is_empty(&self) -> bool {
		self.count == 0
	}
}

// ============================================================================
// Connection
// ============================================================================

/// An accepted endpoint wrapped as a stream, plus its peer identity.
#[derive(Debug)]
pub struct Connection {
	id: ConnectionId,
	stream: SocketStream<Endpoint>,
	interest: Interest,
	peer: String,
}

impl Connection {
	pub fn id(&self) -> ConnectionId {
		self.id
	}

	/// Peer identity captured at accept time, `<host>:<service>`.
	pub fn peer_name(&self) -> &str {
		&self.peer
	}

	pub fn interest(&self) -> Interest {
		self.interest
	}

	/// Changes what the next cycle polls this connection for.
	/// `Interest::NONE` keeps it registered but never reported.
	pub fn set_interest(&mut self, interest: Interest) {
		self.interest = interest;
	}

	pub fn endpoint(&self) -> &Endpoint {
		self.stream.endpoint()
	}

	pub fn stream(&self) -> &SocketStream<Endpoint> {
		&self.stream
	}

	pub fn stream_mut(&mut self) -> &mut SocketStream<Endpoint> {
		&mut self.stream
	}

	pub fn is_open(&self) -> bool {
		self.stream.endpoint().is_open()
	}

	/// Closes the descriptor; the server drops the connection next cycle.
	pub fn close(&mut self) -> crate::Result<()> {
		self.stream.close()
	}

	pub fn into_parts(self) -> (SocketStream<Endpoint>, String) {
		(self.stream, self.peer)
	}
}

// ============================================================================
// Server
// ============================================================================

/// Listeners and connections polled together from a single thread.
#[derive(Debug, Default)]
pub struct Server {
	config: ServerConfig,
	listeners: Vec<Endpoint>,
	connections: Vec<Connection>,
	staged: Vec<Connection>,
	mux: Multiplexer,
	next_id: u64,
}

impl Server {
	pub fn new(config: ServerConfig) -> Self {
		Self {
			config,
			..Self::default()
		}
	}

	pub fn config(&self) -> &ServerConfig {
		&self.config
	}

	/// Takes ownership of a listening endpoint.
	pub fn add_listener(&mut self, listener: Endpoint) -> crate::Result<ListenerId> {
		listener.require_role(Role::Listening, "add_listener")?;
		let id = ListenerId(self.listeners.len());
		tracing::debug!(listener = id.0, fd = listener.fd(), addr = %listener.addr(), "listener registered");
		self.listeners.push(listener);
		Ok(id)
	}

	/// Resolves a listener with the configured `ListenConfig` and adds it.
	pub fn listen_on(&mut self, host: &str, service: &str) -> crate::Result<ListenerId> {
		let mut listener = Endpoint::new(host, service);
		socket::listen(&mut listener, &self.config.listen)?;
		self.add_listener(listener)
	}

	pub fn listener(&self, id: ListenerId) -> Option<&Endpoint> {
		self.listeners.get(id.0)
	}

	pub fn listeners(&self) -> impl Iterator<Item = (ListenerId, &Endpoint)> {
		self.listeners.iter().enumerate().map(|(i, l)| (ListenerId(i), l))
	}

	/// Live connections, excluding those staged by this cycle's accepts.
	pub fn len(&self) -> usize {
		self.connections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.connections.is_empty()
	}

	pub fn staged_len(&self) -> usize {
		self.staged.len()
	}

	/// Runs one cycle: merge staged connections, drop closed ones, register
	/// interest, wait once and classify what became ready.
	pub fn poll_and_classify(&mut self, timeout: Option<Duration>) -> crate::Result<ReadySummary> {
		self.merge_staged();
		self.prune();

		self.mux.clear();
		for listener in &self.listeners {
			self.mux.register(listener, Interest::READ);
		}
		for conn in &self.connections {
			self.mux.register(conn.endpoint(), conn.interest);
		}

		let count = self.mux.poll(timeout)?;

		let pending_accepts: Vec<ListenerId> = self
			.listeners
			.iter()
			.enumerate()
			.filter(|(_, l)| l.is_open() && self.mux.is_ready(*l, Kind::Read))
			.map(|(i, _)| ListenerId(i))
			.collect();

		let ready: Vec<ReadyConnection> = self
			.connections
			.iter()
			.filter_map(|c| {
				let ready = self.mux.ready(c.endpoint());
				(!ready.is_empty()).then_some(ReadyConnection { id: c.id, ready })
			})
			.collect();

		tracing::trace!(
			count,
			accepts = pending_accepts.len(),
			ready = ready.len(),
			connections = self.connections.len(),
			"poll cycle"
		);
		Ok(ReadySummary { count, pending_accepts, ready })
	}

	/// Whether the listener had a pending connection in the last poll.
	pub fn is_connect_request(&self, id: ListenerId) -> bool {
		self.listeners
			.get(id.0)
			.is_some_and(|l| l.is_open() && self.mux.is_ready(l, Kind::Read))
	}

	/// Whether a live connection was ready for `kind` in the last poll.
	pub fn is_ready(&self, id: ConnectionId, kind: Kind) -> bool {
		self.connections
			.iter()
			.find(|c| c.id == id)
			.is_some_and(|c| c.is_open() && self.mux.is_ready(c.endpoint(), kind))
	}

	/// Accepts one pending connection and stages it for the next cycle.
	pub fn accept(&mut self, id: ListenerId) -> crate::Result<AcceptOutcome> {
		let Some(listener) = self.listeners.get(id.0) else {
			return Err(SocketError::Accept { errno: libc::EBADF }.into());
		};
		let endpoint = match socket::accept(listener)? {
			AcceptResult::Connection(endpoint) => endpoint,
			AcceptResult::WouldBlock => return Ok(AcceptOutcome::WouldBlock),
			AcceptResult::Interrupted => return Ok(AcceptOutcome::Interrupted),
		};

		// An unprintable address is not worth dropping the connection over.
		let peer = endpoint.peer_name_with(self.config.name_flags).unwrap_or_else(|err| {
			tracing::debug!(error = %err, "peer name unavailable");
			endpoint.addr().to_string()
		});

		let conn_id = ConnectionId(self.next_id);
		self.next_id += 1;
		tracing::info!(id = %conn_id, listener = id.0, fd = endpoint.fd(), peer = %peer, "connection accepted");

		self.staged.push(Connection {
			id: conn_id,
			stream: SocketStream::with_config(endpoint, self.config.stream),
			interest: self.config.default_interest,
			peer,
		});
		Ok(AcceptOutcome::Accepted(conn_id))
	}

	/// Live connections in registration order.
	pub fn connections(&self) -> impl Iterator<Item = &Connection> {
		self.connections.iter()
	}

	pub fn connections_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
		self.connections.iter_mut()
	}

	/// Looks a connection up among live and staged ones.
	pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
		self.connections.iter().chain(&self.staged).find(|c| c.id == id)
	}

	pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
		self.connections
			.iter_mut()
			.chain(self.staged.iter_mut())
			.find(|c| c.id == id)
	}

	/// Removes a connection so it is never polled again and hands it over.
	pub fn take(&mut self, id: ConnectionId) -> Option<Connection> {
		let conn = if let Some(pos) = self.connections.iter().position(|c| c.id == id) {
			self.connections.remove(pos)
		} else {
			let pos = self.staged.iter().position(|c| c.id == id)?;
			self.staged.remove(pos)
		};
		tracing::debug!(id = %id, peer = %conn.peer, "connection handed off");
		Some(conn)
	}

	/// Drops live connections whose descriptor is closed; returns how many.
	pub fn prune(&mut self) -> usize {
		let before = self.connections.len();
		self.connections.retain(|c| {
			if !c.is_open() {
				tracing::debug!(id = %c.id, peer = %c.peer, "dropping closed connection");
			}
			c.is_open()
		});
		before - self.connections.len()
	}

	fn merge_staged(&mut self) {
		if !self.staged.is_empty() {
			self.connections.append(&mut self.staged);
		}
	}
}

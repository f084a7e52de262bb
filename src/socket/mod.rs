//! Endpoints and everything that operates on a single socket.
//!
//! An `Endpoint` carries its role as a runtime tag; the role-specific
//! operations are free functions that check that tag first:
//!
//! - `listen` / `connect` resolve an `Unresolved` endpoint
//! - `accept` turns pending connections on a `Listening` endpoint into
//!   `Accepted` endpoints
//! - `SocketStream` wraps a connected or accepted endpoint as a buffered
//!   byte stream

mod config;
mod endpoint;
mod listener;
mod options;
mod raw;
mod resolver;
mod stream;

pub use self::config::{ListenConfig, StreamConfig, DEFAULT_BUFFER_SIZE, MIN_PUSHBACK};
pub use self::endpoint::{Endpoint, Role, Shutdown, INVALID_FD};
pub use self::listener::{accept, AcceptResult};
pub use self::options::{
	is_cloexec, is_nonblocking, is_reuse_addr, set_cloexec, set_nonblocking,
	set_recv_buffer_size, set_reuse_addr, set_send_buffer_size, take_error,
};
pub use self::resolver::{connect, listen, FamilyPrefs};
pub use self::stream::{SocketStream, Transfer};

pub mod addr;
pub mod codec;
mod error;
pub mod poll;
pub mod server;
pub mod socket;

pub use self::error::{Error, FramingError, IoError, Result, SocketError, errno};
pub use self::addr::{Family, FromSockAddr, NameFlags, PeerAddr, ToSockAddr};
pub use self::socket::{AcceptResult, Endpoint, FamilyPrefs, ListenConfig, Role, Shutdown,
					   SocketStream, StreamConfig, Transfer,
					   accept, connect, listen,
					   is_cloexec, is_nonblocking, is_reuse_addr, set_cloexec, set_nonblocking,
					   set_recv_buffer_size, set_reuse_addr, set_send_buffer_size, take_error};
pub use self::poll::{Interest, Kind, Multiplexer, Ready};
pub use self::server::{AcceptOutcome, Connection, ConnectionId, ListenerId, ReadyConnection,
					   ReadySummary, Server, ServerConfig};
pub use self::codec::{FrameCodec, FrameMarkers, FrameRead, FrameWrite, NetScalar};

//! Wire encoding for scalars and framed strings.
//!
//! Scalars go out raw in network byte order. Strings are wrapped as
//! `start | escaped payload | end`, so they can carry any byte.
//!
//! Reads and writes go through `FrameRead`/`FrameWrite`, implemented for
//! `SocketStream`, in-memory cursors and `Vec<u8>`. Over a non-blocking
//! stream a value is read or written whole or not at all: on
//! `IoError::WouldBlock` a partial read is put back and a write buffers
//! nothing, so the same call can be retried once the socket is ready.

mod frame;
mod scalar;
mod transact;

pub use self::frame::{FrameCodec, FrameMarkers};
pub use self::scalar::{NetScalar, read_scalar, read_scalars, write_scalar, write_scalars};
pub use self::transact::{FrameRead, FrameWrite};

use std::borrow::Borrow;
use std::io::{Cursor, Read};

use crate::socket::{Endpoint, SocketStream};

/// Byte source whose reads can be undone.
///
/// Codec reads take a checkpoint before the first byte of a value and roll
/// back to it on `IoError::WouldBlock`, so a value split across receives is
/// read again from its start once the rest arrives.
pub trait FrameRead: Read {
	type Mark;

	fn checkpoint(&mut self) -> Self::Mark;

	/// Puts back everything read since `mark`.
	fn rollback(&mut self, mark: Self::Mark);

	/// Keeps everything read since `mark`.
	fn release(&mut self, mark: Self::Mark);
}

/// Byte sink that takes a whole encoded value or nothing.
pub trait FrameWrite {
	fn write_frame(&mut self, bytes: &[u8]) -> crate::Result<()>;
}

/// Runs `f` as one read: a would-block rolls back whatever `f` consumed.
pub(crate) fn atomically<R, T, F>(r: &mut R, f: F) -> crate::Result<T>
where
	R: FrameRead + ?Sized,
	F: FnOnce(&mut R) -> crate::Result<T>,
{
	let mark = r.checkpoint();
	let result = f(r);
	match &result {
		Err(err) if err.is_would_block() => r.rollback(mark),
		_ => r.release(mark),
	}
	result
}

impl<E: Borrow<Endpoint>> FrameRead for SocketStream<E> {
	type Mark = ();

	fn checkpoint(&mut self) {
		self.mark();
	}

	fn rollback(&mut self, _mark: ()) {
		self.rewind();
	}

	fn release(&mut self, _mark: ()) {
		self.unmark();
	}
}

impl<T: AsRef<[u8]>> FrameRead for Cursor<T> {
	type Mark = u64;

	fn checkpoint(&mut self) -> u64 {
		self.position()
	}

	fn rollback(&mut self, mark: u64) {
		self.set_position(mark);
	}

	fn release(&mut self, _mark: u64) {}
}

impl<'a> FrameRead for &'a [u8] {
	type Mark = &'a [u8];

	fn checkpoint(&mut self) -> &'a [u8] {
		*self
	}

	fn rollback(&mut self, mark: &'a [u8]) {
		*self = mark;
	}

	fn release(&mut self, _mark: &'a [u8]) {}
}

impl<R: FrameRead + ?Sized> FrameRead for &mut R {
	type Mark = R::Mark;

	fn checkpoint(&mut self) -> R::Mark {
		(**self).checkpoint()
	}

	fn rollback(&mut self, mark: R::Mark) {
		(**self).rollback(mark);
	}

	fn release(&mut self, mark: R::Mark) {
		(**self).release(mark);
	}
}

impl<E: Borrow<Endpoint>> FrameWrite for SocketStream<E> {
	fn write_frame(&mut self, bytes: &[u8]) -> crate::Result<()> {
		self.write_whole(bytes)
	}
}

impl FrameWrite for Vec<u8> {
	fn write_frame(&mut self, bytes: &[u8]) -> crate::Result<()> {
		self.extend_from_slice(bytes);
		Ok(())
	}
}

impl<W: FrameWrite + ?Sized> FrameWrite for &mut W {
	fn write_frame(&mut self, bytes: &[u8]) -> crate::Result<()> {
		(**self).write_frame(bytes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::IoError;

	#[test]
	fn would_block_rolls_back_a_cursor() {
		let mut reader = Cursor::new(b"abcd".to_vec());
		let err = atomically(&mut reader, |r| -> crate::Result<()> {
			r.read_exact(&mut [0u8; 3])?;
			Err(IoError::WouldBlock.into())
		})
		.unwrap_err();
		assert!(err.is_would_block());
		assert_eq!(reader.position(), 0);
	}

	#[test]
	fn other_errors_keep_what_was_read() {
		let mut reader: &[u8] = b"abcd";
		let err = atomically(&mut reader, |r| -> crate::Result<()> {
			r.read_exact(&mut [0u8; 2])?;
			Err(IoError::ConnectionClosed.into())
		})
		.unwrap_err();
		assert!(err.is_disconnected());
		assert_eq!(reader, b"cd");
	}
}

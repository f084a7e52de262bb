use std::borrow::{Borrow, BorrowMut};
use std::io::{BufRead, Read, Write};

use crate::error::{FramingError, IoError};
use super::config::StreamConfig;
use super::endpoint::{Endpoint, INVALID_FD};
use super::raw;

/// Outcome of one non-blocking transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
	/// This many bytes were moved.
	Bytes(usize),
	/// Nothing can move right now; wait for readiness.
	WouldBlock,
	/// The peer closed its side (a receive returned zero bytes).
	Closed,
}

/// Buffered byte stream over one endpoint's descriptor.
///
/// Output accumulates until `flush`, which issues a single non-blocking send
/// and keeps any unsent remainder at the front of the buffer. Input is
/// refilled by a single non-blocking receive into the region after the
/// pushback margin; the tail of previously read data is carried into that
/// margin on every refill, so at least `pushback` bytes can be ungotten.
///
/// `mark` pins the read position: everything read after it survives refills
/// (the input buffer grows if it has to) until `rewind` returns to it or
/// `unmark` drops it. Marks nest.
///
/// The adapter never blocks: every send and receive uses `MSG_DONTWAIT`,
/// whatever the descriptor's own mode.
///
/// `E` is the endpoint holder: `Endpoint` to own it, `&Endpoint` to borrow it.
pub struct SocketStream<E: Borrow<Endpoint> = Endpoint> {
	endpoint: E,
	buffer_size: usize,
	obuf: Vec<u8>,
	opos: usize,
	ibuf: Vec<u8>,
	pushback: usize,
	gstart: usize,
	gpos: usize,
	gend: usize,
	marks: Vec<usize>,
}

impl<E: Borrow<Endpoint>> SocketStream<E> {
	/// Wraps an endpoint with default buffer sizes.
	pub fn new(endpoint: E) -> Self {
		Self::with_config(endpoint, StreamConfig::default())
	}

	pub fn with_config(endpoint: E, config: StreamConfig) -> Self {
		let config = StreamConfig::new()
			.buffer_size(config.buffer_size)
			.pushback(config.pushback);
		let pushback = config.pushback;
		Self {
			endpoint,
			buffer_size: config.buffer_size,
			obuf: vec![0; config.buffer_size],
			opos: 0,
			ibuf: vec![0; pushback + config.buffer_size],
			pushback,
			gstart: pushback,
			gpos: pushback,
			gend: pushback,
			marks: Vec::new(),
		}
	}

	pub fn endpoint(&self) -> &Endpoint {
		self.endpoint.borrow()
	}

	/// Gives back the endpoint holder, discarding buffered data.
	pub fn into_inner(self) -> E {
		self.endpoint
	}

	/// Effective buffer configuration.
	pub fn config(&self) -> StreamConfig {
		StreamConfig {
			buffer_size: self.buffer_size,
			pushback: self.pushback,
		}
	}

	/// Bytes written but not yet accepted by the kernel.
	#[inline]
	pub fn pending(&self) -> usize {
		self.opos
	}

	/// Unread bytes already held in the input buffer.
	#[inline]
	pub fn buffered(&self) -> usize {
		self.gend - self.gpos
	}

	// ------------------------------------------------------------------------
	// Input
	// ------------------------------------------------------------------------

	/// Makes unread bytes available, receiving once if the buffer is drained.
	fn refill(&mut self) -> crate::Result<Transfer> {
		if self.gpos < self.gend {
			return Ok(Transfer::Bytes(self.gend - self.gpos));
		}
		let fd = self.endpoint.borrow().fd();
		if fd == INVALID_FD {
			return Err(IoError::Read { errno: libc::EBADF }.into());
		}

		self.compact();

		loop {
			match raw::recv(fd, &mut self.ibuf[self.gend..], libc::MSG_DONTWAIT) {
				Ok(0) => {
					tracing::trace!(fd, "end of stream");
					return Ok(Transfer::Closed);
				}
				Ok(n) => {
					self.gend += n;
					tracing::trace!(fd, received = n, "refilled input buffer");
					return Ok(Transfer::Bytes(n));
				}
				Err(libc::EINTR) => continue,
				Err(err) if err == libc::EAGAIN || err == libc::EWOULDBLOCK => {
					return Ok(Transfer::WouldBlock);
				}
				Err(errno) => return Err(IoError::Read { errno }.into()),
			}
		}
	}

	/// Moves retained input to the front before a receive.
	///
	/// Retained means the pushback tail plus everything read since the oldest
	/// mark. The buffer grows so at least `buffer_size` bytes can be received.
	fn compact(&mut self) {
		let keep_from = self.marks.iter().copied().min().unwrap_or(self.gpos);
		let tail = (keep_from - self.gstart).min(self.pushback);
		let src = keep_from - tail;
		let dst = self.pushback - tail;
		let held = self.gpos - src;

		let wanted = dst + held + self.buffer_size;
		if self.ibuf.len() < wanted {
			tracing::trace!(from = self.ibuf.len(), to = wanted, "growing input buffer for marked read");
			self.ibuf.resize(wanted, 0);
		}
		self.ibuf.copy_within(src..self.gpos, dst);
		for mark in &mut self.marks {
			*mark = *mark - src + dst;
		}
		self.gstart = dst;
		self.gpos = dst + held;
		self.gend = self.gpos;
	}

	/// Remembers the read position so a partial read can be undone.
	pub fn mark(&mut self) {
		self.marks.push(self.gpos);
	}

	/// Returns to the most recent mark and drops it; bytes read since then
	/// will be read again. Without a mark this does nothing.
	pub fn rewind(&mut self) {
		if let Some(mark) = self.marks.pop() {
			self.gpos = mark;
		}
	}

	/// Drops the most recent mark, keeping what was read since.
	pub fn unmark(&mut self) {
		self.marks.pop();
	}

	/// Reads one byte.
	///
	/// Fails with `IoError::WouldBlock` when nothing is available yet and
	/// `IoError::ConnectionClosed` at end of stream.
	pub fn get(&mut self) -> crate::Result<u8> {
		let byte = self.peek()?;
		self.gpos += 1;
		Ok(byte)
	}

	/// Returns the next byte without consuming it.
	pub fn peek(&mut self) -> crate::Result<u8> {
		match self.refill()? {
			Transfer::Bytes(_) => Ok(self.ibuf[self.gpos]),
			Transfer::WouldBlock => Err(IoError::WouldBlock.into()),
			Transfer::Closed => Err(IoError::ConnectionClosed.into()),
		}
	}

	/// Steps back over the last byte read so it is returned again.
	pub fn unget(&mut self) -> crate::Result<()> {
		if self.gpos == self.gstart {
			return Err(FramingError::PushbackExhausted.into());
		}
		self.gpos -= 1;
		Ok(())
	}

	/// Copies up to `buf.len()` available bytes, receiving at most once.
	pub fn read_some(&mut self, buf: &mut [u8]) -> crate::Result<Transfer> {
		if buf.is_empty() {
			return Ok(Transfer::Bytes(0));
		}
		match self.refill()? {
			Transfer::Bytes(available) => {
				let n = available.min(buf.len());
				buf[..n].copy_from_slice(&self.ibuf[self.gpos..self.gpos + n]);
				self.gpos += n;
				Ok(Transfer::Bytes(n))
			}
			other => Ok(other),
		}
	}

	/// Best-effort count of bytes readable without blocking.
	///
	/// Returns the unread bytes already buffered, or receives once into the
	/// buffer and reports what arrived. Zero means no data right now; end of
	/// stream is reported as `IoError::ConnectionClosed`.
	pub fn available(&mut self) -> crate::Result<usize> {
		match self.refill()? {
			Transfer::Bytes(n) => Ok(n),
			Transfer::WouldBlock => Ok(0),
			Transfer::Closed => Err(IoError::ConnectionClosed.into()),
		}
	}

	// ------------------------------------------------------------------------
	// Output
	// ------------------------------------------------------------------------

	/// Single non-blocking send of the buffered output.
	fn send_buffered(&mut self) -> crate::Result<usize> {
		if self.opos == 0 {
			return Ok(0);
		}
		let fd = self.endpoint.borrow().fd();
		if fd == INVALID_FD {
			return Err(IoError::Write { errno: libc::EBADF }.into());
		}
		loop {
			match raw::send(fd, &self.obuf[..self.opos], libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL) {
				Ok(sent) => {
					// Short send: keep the remainder at the front, in order.
					self.obuf.copy_within(sent..self.opos, 0);
					self.opos -= sent;
					tracing::trace!(fd, sent, remaining = self.opos, "flushed output buffer");
					return Ok(sent);
				}
				Err(libc::EINTR) => continue,
				Err(err) if err == libc::EAGAIN || err == libc::EWOULDBLOCK => return Ok(0),
				Err(errno) => return Err(IoError::Write { errno }.into()),
			}
		}
	}

	/// Attempts one send of the buffered output; returns the bytes sent.
	///
	/// A short or would-block send is not an error: unsent bytes stay
	/// buffered for the next flush.
	pub fn flush(&mut self) -> crate::Result<usize> {
		self.send_buffered()
	}

	/// Appends one byte, flushing once if the buffer is full.
	pub fn put(&mut self, byte: u8) -> crate::Result<()> {
		if self.opos == self.obuf.len() {
			self.send_buffered()?;
			if self.opos == self.obuf.len() {
				return Err(IoError::WouldBlock.into());
			}
		}
		self.obuf[self.opos] = byte;
		self.opos += 1;
		Ok(())
	}

	/// Buffers as much of `data` as fits, flushing whenever the buffer fills.
	///
	/// Returns the number of bytes accepted; fails with `IoError::WouldBlock`
	/// only when none could be accepted.
	pub fn write_some(&mut self, data: &[u8]) -> crate::Result<usize> {
		let mut written = 0;
		while written < data.len() {
			if self.opos == self.obuf.len() {
				match self.send_buffered() {
					Ok(0) => break,
					Ok(_) => {}
					// Report the bytes already taken; the next call sees the error.
					Err(err) if written > 0 => {
						tracing::trace!(written, error = %err, "send failed after partial write");
						break;
					}
					Err(err) => return Err(err),
				}
			}
			let n = (self.obuf.len() - self.opos).min(data.len() - written);
			self.obuf[self.opos..self.opos + n].copy_from_slice(&data[written..written + n]);
			self.opos += n;
			written += n;
		}
		if written == 0 && !data.is_empty() {
			return Err(IoError::WouldBlock.into());
		}
		Ok(written)
	}

	/// Buffers all of `data` or none of it.
	///
	/// When `data` does not fit beside the pending output one flush is tried.
	/// If output is still pending this fails with `IoError::WouldBlock` and
	/// buffers nothing. An empty buffer too small for `data` is grown, so a
	/// single value is never split.
	pub fn write_whole(&mut self, data: &[u8]) -> crate::Result<()> {
		if data.len() > self.obuf.len() - self.opos {
			self.send_buffered()?;
		}
		if data.len() > self.obuf.len() - self.opos {
			if self.opos > 0 {
				return Err(IoError::WouldBlock.into());
			}
			self.obuf.resize(data.len(), 0);
		}
		self.obuf[self.opos..self.opos + data.len()].copy_from_slice(data);
		self.opos += data.len();
		Ok(())
	}
}

impl<E: BorrowMut<Endpoint>> SocketStream<E> {
	pub fn endpoint_mut(&mut self) -> &mut Endpoint {
		self.endpoint.borrow_mut()
	}

	/// Discards buffered data and closes the endpoint.
	pub fn close(&mut self) -> crate::Result<()> {
		self.opos = 0;
		self.marks.clear();
		self.gstart = self.pushback;
		self.gpos = self.pushback;
		self.gend = self.pushback;
		self.endpoint.borrow_mut().close()
	}
}

impl<E: Borrow<Endpoint>> std::fmt::Debug for SocketStream<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SocketStream")
			.field("fd", &self.endpoint.borrow().fd())
			.field("pending", &self.opos)
			.field("buffered", &(self.gend - self.gpos))
			.finish()
	}
}

impl<E: Borrow<Endpoint>> Read for SocketStream<E> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		match self.read_some(buf)? {
			Transfer::Bytes(n) => Ok(n),
			Transfer::WouldBlock => Err(IoError::WouldBlock.into()),
			Transfer::Closed => Ok(0),
		}
	}
}

impl<E: Borrow<Endpoint>> BufRead for SocketStream<E> {
	fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
		match self.refill()? {
			Transfer::Bytes(_) => Ok(&self.ibuf[self.gpos..self.gend]),
			Transfer::WouldBlock => Err(IoError::WouldBlock.into()),
			Transfer::Closed => Ok(&[]),
		}
	}

	fn consume(&mut self, amt: usize) {
		self.gpos = (self.gpos + amt).min(self.gend);
	}
}

impl<E: Borrow<Endpoint>> Write for SocketStream<E> {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		Ok(self.write_some(buf)?)
	}

	/// One send attempt; reports `WouldBlock` while output remains buffered.
	fn flush(&mut self) -> std::io::Result<()> {
		self.send_buffered()?;
		if self.opos > 0 {
			return Err(IoError::WouldBlock.into());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pushback_is_clamped_to_minimum() {
		let stream = SocketStream::with_config(
			Endpoint::default(),
			StreamConfig { buffer_size: 0, pushback: 2 },
		);
		assert_eq!(stream.config(), StreamConfig { buffer_size: 1, pushback: 8 });
	}

	#[test]
	fn io_on_closed_endpoint_fails_without_syscall() {
		let mut stream = SocketStream::new(Endpoint::default());
		stream.put(b'x').unwrap();
		assert_eq!(stream.pending(), 1);
		assert!(matches!(
			stream.flush(),
			Err(crate::Error::Io(IoError::Write { errno: libc::EBADF }))
		));
		assert_eq!(stream.pending(), 1);
		assert!(matches!(
			stream.get(),
			Err(crate::Error::Io(IoError::Read { errno: libc::EBADF }))
		));
		assert!(matches!(
			stream.unget(),
			Err(crate::Error::Framing(FramingError::PushbackExhausted))
		));
	}

	#[test]
	fn write_whole_takes_all_or_nothing() {
		let config = StreamConfig::new().buffer_size(4);
		let mut stream = SocketStream::with_config(Endpoint::default(), config);

		// An empty buffer grows for a single oversized value.
		stream.write_whole(b"0123456789").unwrap();
		assert_eq!(stream.pending(), 10);

		let mut stream = SocketStream::with_config(Endpoint::default(), config);
		stream.write_whole(b"ab").unwrap();
		assert!(stream.write_whole(b"cdef").is_err());
		assert_eq!(stream.pending(), 2);
		assert_eq!(stream.config().buffer_size, 4);
	}
}

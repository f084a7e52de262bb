use std::io::{ErrorKind, Read};

use super::transact::{FrameRead, FrameWrite, atomically};
use crate::error::{FramingError, IoError};

/// Byte values that delimit and escape a framed string.
///
/// Within a frame, occurrences of `start`, `end` and `escape` are preceded by
/// `escape`. `separator` only ever appears between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameMarkers {
	start: u8,
	end: u8,
	escape: u8,
	separator: u8,
}

impl Default for FrameMarkers {
	/// ASCII STX, ETX, SO and US.
	fn default() -> Self {
		Self {
			start: 0x02,
			end: 0x03,
			escape: 0x0E,
			separator: 0x1F,
		}
	}
}

impl FrameMarkers {
	/// Builds a marker set; all four bytes must differ.
	pub fn new(start: u8, end: u8, escape: u8, separator: u8) -> Result<Self, FramingError> {
		let all = [start, end, escape, separator];
		let distinct = all
			.iter()
			.enumerate()
			.all(|(i, a)| all[i + 1..].iter().all(|b| a != b));
		if !distinct {
			return Err(FramingError::MarkerConflict { start, end, escape, separator });
		}
		Ok(Self { start, end, escape, separator })
	}

	pub fn start(&self) -> u8 {
		self.start
	}

	pub fn end(&self) -> u8 {
		self.end
	}

	pub fn escape(&self) -> u8 {
		self.escape
	}

	pub fn separator(&self) -> u8 {
		self.separator
	}

	#[inline]
	fn needs_escape(&self, byte: u8) -> bool {
		byte == self.start || byte == self.end || byte == self.escape
	}
}

/// Reads one byte, `None` at end of stream.
fn next_byte<R: Read + ?Sized>(r: &mut R) -> crate::Result<Option<u8>> {
	let mut byte = [0u8; 1];
	loop {
		match r.read(&mut byte) {
			Ok(0) => return Ok(None),
			Ok(_) => return Ok(Some(byte[0])),
			Err(err) if err.kind() == ErrorKind::Interrupted => continue,
			Err(err) => return Err(err.into()),
		}
	}
}

/// Start/escape/end framing for strings over any byte stream.
///
/// Frames are self-delimiting, so empty strings and payloads containing the
/// marker bytes survive intact. Reads pull one byte at a time, which is cheap
/// over a buffered `SocketStream`.
///
/// Every read and write is whole: a would-block leaves the stream as it was,
/// so the call can simply be repeated once the socket is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCodec {
	markers: FrameMarkers,
}

impl FrameCodec {
	pub fn new(markers: FrameMarkers) -> Self {
		Self { markers }
	}

	pub fn markers(&self) -> FrameMarkers {
		self.markers
	}

	/// Appends the framed form of `payload` to `out`.
	pub fn encode_into(&self, payload: &[u8], out: &mut Vec<u8>) {
		let m = &self.markers;
		out.reserve(payload.len() + 2);
		out.push(m.start);
		for &byte in payload {
			if m.needs_escape(byte) {
				out.push(m.escape);
			}
			out.push(byte);
		}
		out.push(m.end);
	}

	/// Writes one frame.
	pub fn write_string<W: FrameWrite + ?Sized>(&self, w: &mut W, payload: impl AsRef<[u8]>) -> crate::Result<()> {
		let mut out = Vec::new();
		self.encode_into(payload.as_ref(), &mut out);
		w.write_frame(&out)
	}

	/// Writes each payload as its own frame, back to back.
	pub fn write_strings<W, I>(&self, w: &mut W, payloads: I) -> crate::Result<()>
	where
		W: FrameWrite + ?Sized,
		I: IntoIterator,
		I::Item: AsRef<[u8]>,
	{
		let mut out = Vec::new();
		for payload in payloads {
			self.encode_into(payload.as_ref(), &mut out);
		}
		w.write_frame(&out)
	}

	/// Reads one frame and returns its unescaped payload.
	///
	/// End of stream before the start marker is `IoError::ConnectionClosed`;
	/// inside the frame it is `FramingError::Truncated`.
	pub fn read_bytes<R: FrameRead + ?Sized>(&self, r: &mut R) -> crate::Result<Vec<u8>> {
		atomically(r, |r| self.decode(r))
	}

	fn decode<R: Read + ?Sized>(&self, r: &mut R) -> crate::Result<Vec<u8>> {
		let m = &self.markers;
		match next_byte(r)? {
			Some(b) if b == m.start => {}
			Some(found) => return Err(FramingError::MissingStart { found }.into()),
			None => return Err(IoError::ConnectionClosed.into()),
		}

		let mut payload = Vec::new();
		loop {
			let Some(byte) = next_byte(r)? else {
				return Err(FramingError::Truncated { context: "frame" }.into());
			};
			if byte == m.end {
				return Ok(payload);
			}
			if byte == m.escape {
				let Some(escaped) = next_byte(r)? else {
					return Err(FramingError::Truncated { context: "escape sequence" }.into());
				};
				payload.push(escaped);
			} else {
				payload.push(byte);
			}
		}
	}

	/// Reads one frame as UTF-8 text.
	pub fn read_string<R: FrameRead + ?Sized>(&self, r: &mut R) -> crate::Result<String> {
		let bytes = self.read_bytes(r)?;
		Ok(String::from_utf8(bytes).map_err(FramingError::from)?)
	}

	/// Reads `count` consecutive frames, all or none.
	///
	/// End of stream after the first frame is `FramingError::Truncated`.
	pub fn read_strings<R: FrameRead + ?Sized>(&self, r: &mut R, count: usize) -> crate::Result<Vec<String>> {
		atomically(r, |r| {
			let mut out = Vec::with_capacity(count);
			for i in 0..count {
				match self.read_string(r) {
					Ok(s) => out.push(s),
					Err(crate::Error::Io(IoError::ConnectionClosed)) if i > 0 => {
						return Err(FramingError::Truncated { context: "frame list" }.into());
					}
					Err(err) => return Err(err),
				}
			}
			Ok(out)
		})
	}

	pub fn write_separator<W: FrameWrite + ?Sized>(&self, w: &mut W) -> crate::Result<()> {
		w.write_frame(&[self.markers.separator])
	}

	/// Consumes one separator byte.
	pub fn read_separator<R: FrameRead + ?Sized>(&self, r: &mut R) -> crate::Result<()> {
		let expected = self.markers.separator;
		match next_byte(r)? {
			Some(b) if b == expected => Ok(()),
			Some(found) => Err(FramingError::MissingSeparator { expected, found }.into()),
			None => Err(FramingError::Truncated { context: "separator" }.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn markers_in_payload_are_escaped() {
		let mut out = Vec::new();
		FrameCodec::default().encode_into(b"a\x02b\x0e\x03", &mut out);
		assert_eq!(out, b"\x02a\x0e\x02b\x0e\x0e\x0e\x03\x03");
	}

	#[test]
	fn separator_travels_unescaped_inside_frame() {
		let mut out = Vec::new();
		FrameCodec::default().encode_into(b"\x1f", &mut out);
		assert_eq!(out, b"\x02\x1f\x03");
	}
}

use std::io::{ErrorKind, Read};

use super::transact::{FrameRead, FrameWrite, atomically};
use crate::error::{FramingError, IoError};

/// Fixed-width integer carried raw in network byte order.
///
/// Single-byte types pass through untouched. There is no length prefix or
/// tag: both sides must agree on the type and count.
pub trait NetScalar: Copy {
	type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

	fn to_net(self) -> Self::Bytes;

	fn from_net(bytes: Self::Bytes) -> Self;
}

macro_rules! net_scalar {
	($($ty:ty),* $(,)?) => {$(
		impl NetScalar for $ty {
			type Bytes = [u8; std::mem::size_of::<$ty>()];

			#[inline]
			fn to_net(self) -> Self::Bytes {
				self.to_be_bytes()
			}

			#[inline]
			fn from_net(bytes: Self::Bytes) -> Self {
				<$ty>::from_be_bytes(bytes)
			}
		}
	)*};
}

net_scalar!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Writes one scalar in network byte order.
pub fn write_scalar<W: FrameWrite + ?Sized, T: NetScalar>(w: &mut W, value: T) -> crate::Result<()> {
	w.write_frame(value.to_net().as_ref())
}

/// Reads one scalar.
///
/// End of stream before its first byte is `IoError::ConnectionClosed`; after
/// it, `FramingError::Truncated`. A would-block puts back any partial bytes.
pub fn read_scalar<R: FrameRead + ?Sized, T: NetScalar>(r: &mut R) -> crate::Result<T> {
	atomically(r, |r| decode(r))
}

fn decode<R: Read + ?Sized, T: NetScalar>(r: &mut R) -> crate::Result<T> {
	let mut bytes = T::Bytes::default();
	let buf = bytes.as_mut();
	let mut filled = 0;
	while filled < buf.len() {
		match r.read(&mut buf[filled..]) {
			Ok(0) if filled == 0 => return Err(IoError::ConnectionClosed.into()),
			Ok(0) => return Err(FramingError::Truncated { context: "scalar" }.into()),
			Ok(n) => filled += n,
			Err(err) if err.kind() == ErrorKind::Interrupted => continue,
			Err(err) => return Err(err.into()),
		}
	}
	Ok(T::from_net(bytes))
}

/// Writes every value back to back, all or none.
pub fn write_scalars<W: FrameWrite + ?Sized, T: NetScalar>(w: &mut W, values: &[T]) -> crate::Result<()> {
	let mut out = Vec::with_capacity(values.len() * std::mem::size_of::<T>());
	for value in values {
		out.extend_from_slice(value.to_net().as_ref());
	}
	w.write_frame(&out)
}

/// Fills `values` from the stream, one scalar per slot, all or none.
///
/// `values` is only written once every scalar has arrived.
pub fn read_scalars<R: FrameRead + ?Sized, T: NetScalar>(r: &mut R, values: &mut [T]) -> crate::Result<()> {
	let read = atomically(r, |r| {
		let mut read: Vec<T> = Vec::with_capacity(values.len());
		for i in 0..values.len() {
			match decode(r) {
				Ok(value) => read.push(value),
				Err(crate::Error::Io(IoError::ConnectionClosed)) if i > 0 => {
					return Err(FramingError::Truncated { context: "scalar" }.into());
				}
				Err(err) => return Err(err),
			}
		}
		Ok(read)
	})?;
	values.copy_from_slice(&read);
	Ok(())
}

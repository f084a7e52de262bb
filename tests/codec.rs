use std::io::Cursor;

use proptest::prelude::*;
use socklane::codec::{read_scalar, read_scalars, write_scalar, write_scalars};
use socklane::{Error, FrameCodec, FrameMarkers, FramingError, IoError};

fn frame(payload: &[u8]) -> Vec<u8> {
	let mut out = Vec::new();
	FrameCodec::default().write_string(&mut out, payload).unwrap();
	out
}

proptest! {
	#[test]
	fn any_bytes_survive_framing(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
		let codec = FrameCodec::default();
		let wire = frame(&payload);
		prop_assert_eq!(wire.first(), Some(&0x02));
		prop_assert_eq!(wire.last(), Some(&0x03));

		let mut reader = Cursor::new(wire);
		prop_assert_eq!(codec.read_bytes(&mut reader).unwrap(), payload);
	}

	#[test]
	fn strings_with_markers_survive(parts in proptest::collection::vec("[a-z\u{2}\u{3}\u{e}\u{1f}é]{0,16}", 0..8)) {
		let codec = FrameCodec::default();
		let mut wire = Vec::new();
		codec.write_strings(&mut wire, &parts).unwrap();

		let mut reader = Cursor::new(wire);
		prop_assert_eq!(codec.read_strings(&mut reader, parts.len()).unwrap(), parts);
	}

	#[test]
	fn u16_and_u32_travel_big_endian(a in any::<u16>(), b in any::<u32>()) {
		let mut wire = Vec::new();
		write_scalar(&mut wire, a).unwrap();
		write_scalar(&mut wire, b).unwrap();
		prop_assert_eq!(&wire[..2], &a.to_be_bytes()[..]);
		prop_assert_eq!(&wire[2..], &b.to_be_bytes()[..]);

		let mut reader = Cursor::new(wire);
		prop_assert_eq!(read_scalar::<_, u16>(&mut reader).unwrap(), a);
		prop_assert_eq!(read_scalar::<_, u32>(&mut reader).unwrap(), b);
	}
}

#[test]
fn single_bytes_are_untouched() {
	let mut wire = Vec::new();
	write_scalars(&mut wire, &[0x41u8, 0x02, 0xff]).unwrap();
	write_scalar(&mut wire, -1i8).unwrap();
	assert_eq!(wire, [0x41, 0x02, 0xff, 0xff]);

	let mut reader = Cursor::new(wire);
	let mut bytes = [0u8; 3];
	read_scalars(&mut reader, &mut bytes).unwrap();
	assert_eq!(bytes, [0x41, 0x02, 0xff]);
	assert_eq!(read_scalar::<_, i8>(&mut reader).unwrap(), -1);
}

#[test]
fn wide_signed_scalars() {
	let mut wire = Vec::new();
	write_scalars(&mut wire, &[-2i64, i64::MAX]).unwrap();
	assert_eq!(wire.len(), 16);
	assert_eq!(&wire[..8], &(-2i64).to_be_bytes());

	let mut values = [0i64; 2];
	read_scalars(&mut Cursor::new(wire), &mut values).unwrap();
	assert_eq!(values, [-2, i64::MAX]);
}

#[test]
fn short_scalar_is_truncated() {
	let mut reader = Cursor::new(vec![0x12u8, 0x34, 0x56]);
	let err = read_scalar::<_, u32>(&mut reader).unwrap_err();
	assert!(matches!(err, Error::Framing(FramingError::Truncated { context: "scalar" })), "{err:?}");
}

#[test]
fn scalar_at_end_of_stream_is_a_close() {
	let err = read_scalar::<_, u16>(&mut Cursor::new(Vec::<u8>::new())).unwrap_err();
	assert!(matches!(err, Error::Io(IoError::ConnectionClosed)), "{err:?}");
	assert!(err.is_disconnected());

	let mut values = [0u16; 2];
	let err = read_scalars(&mut Cursor::new(vec![0u8, 7]), &mut values).unwrap_err();
	assert!(matches!(err, Error::Framing(FramingError::Truncated { context: "scalar" })), "{err:?}");
	assert_eq!(values, [0, 0]);
}

#[test]
fn frame_list_cut_short_is_truncated() {
	let codec = FrameCodec::default();
	let mut wire = frame(b"one");
	let err = codec.read_strings(&mut Cursor::new(wire.clone()), 2).unwrap_err();
	assert!(matches!(err, Error::Framing(FramingError::Truncated { context: "frame list" })), "{err:?}");

	wire.extend(frame(b"two"));
	let mut reader: &[u8] = &wire;
	assert_eq!(codec.read_strings(&mut reader, 2).unwrap(), ["one", "two"]);
	assert!(reader.is_empty());
}

#[test]
fn empty_string_is_a_bare_frame() {
	assert_eq!(frame(b""), [0x02, 0x03]);
	let codec = FrameCodec::default();
	assert_eq!(codec.read_string(&mut Cursor::new(b"\x02\x03".to_vec())).unwrap(), "");
}

#[test]
fn a_lt_b_frames_as_expected() {
	assert_eq!(frame(b"A<B"), [0x02, b'A', b'<', b'B', 0x03]);
}

#[test]
fn missing_start_marker() {
	let codec = FrameCodec::default();
	let err = codec.read_bytes(&mut Cursor::new(b"xyz\x03".to_vec())).unwrap_err();
	assert!(matches!(err, Error::Framing(FramingError::MissingStart { found: b'x' })));
	assert!(err.is_protocol());
}

#[test]
fn end_of_stream_inside_a_frame() {
	let codec = FrameCodec::default();
	let err = codec.read_bytes(&mut Cursor::new(b"\x02abc".to_vec())).unwrap_err();
	assert!(matches!(err, Error::Framing(FramingError::Truncated { context: "frame" })));

	let err = codec.read_bytes(&mut Cursor::new(b"\x02ab\x0e".to_vec())).unwrap_err();
	assert!(matches!(err, Error::Framing(FramingError::Truncated { context: "escape sequence" })));
}

#[test]
fn end_of_stream_between_frames() {
	let codec = FrameCodec::default();
	let err = codec.read_bytes(&mut Cursor::new(Vec::<u8>::new())).unwrap_err();
	assert!(matches!(err, Error::Io(IoError::ConnectionClosed)));
	assert!(err.is_disconnected());
}

#[test]
fn unescaped_start_inside_frame_is_payload() {
	let codec = FrameCodec::default();
	let bytes = codec.read_bytes(&mut Cursor::new(b"\x02a\x02b\x03".to_vec())).unwrap();
	assert_eq!(bytes, b"a\x02b");
}

#[test]
fn invalid_utf8_is_reported() {
	let codec = FrameCodec::default();
	let err = codec.read_string(&mut Cursor::new(b"\x02\xff\xfe\x03".to_vec())).unwrap_err();
	assert!(matches!(err, Error::Framing(FramingError::InvalidUtf8(_))));
}

#[test]
fn separators() {
	let codec = FrameCodec::default();
	let mut wire = Vec::new();
	codec.write_string(&mut wire, "a").unwrap();
	codec.write_separator(&mut wire).unwrap();
	codec.write_string(&mut wire, "b").unwrap();

	let mut reader = Cursor::new(wire);
	assert_eq!(codec.read_string(&mut reader).unwrap(), "a");
	codec.read_separator(&mut reader).unwrap();
	assert_eq!(codec.read_string(&mut reader).unwrap(), "b");

	let err = codec.read_separator(&mut Cursor::new(b"\x02".to_vec())).unwrap_err();
	assert!(matches!(
		err,
		Error::Framing(FramingError::MissingSeparator { expected: 0x1f, found: 0x02 })
	));
}

#[test]
fn custom_markers() {
	let markers = FrameMarkers::new(b'<', b'>', b'\\', b',').unwrap();
	let codec = FrameCodec::new(markers);
	let mut wire = Vec::new();
	codec.write_string(&mut wire, "a<b>c\\").unwrap();
	assert_eq!(wire, b"<a\\<b\\>c\\\\>");
	assert_eq!(codec.read_string(&mut Cursor::new(wire)).unwrap(), "a<b>c\\");
}

#[test]
fn overlapping_markers_are_rejected() {
	assert!(matches!(
		FrameMarkers::new(0x02, 0x02, 0x0e, 0x1f),
		Err(FramingError::MarkerConflict { .. })
	));
	assert!(FrameMarkers::new(0x02, 0x03, 0x0e, 0x0e).is_err());
	assert_eq!(FrameMarkers::default().separator(), 0x1f);
}

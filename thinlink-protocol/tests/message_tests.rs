use pretty_assertions::assert_eq;
use proptest::prelude::*;
use thinlink_protocol::{
    decode_message, encode_message, peek_header, FieldList, FieldValue, Message,
    PacketAssembler, ProtocolError, ProtocolVersion, LONG_HEADER_LEN, SHORT_HEADER_LEN,
};

fn sample(version: ProtocolVersion) -> Message {
    Message::new(version, 9, 2)
        .with_field(5, FieldValue::string("hello"))
        .with_field(7, FieldValue::Int32(42))
}

// ── Headers ─────────────────────────────────────────────────────

#[test]
fn v2_header_layout() {
    let bytes = encode_message(&sample(ProtocolVersion::V2)).unwrap();
    assert_eq!(bytes[0], 0x27);
    assert_eq!(usize::from(u16::from_le_bytes([bytes[1], bytes[2]])), bytes.len());
    assert_eq!(bytes[3], 9);
    assert_eq!(bytes[4], 2);
    assert_eq!(u16::from_le_bytes([bytes[5], bytes[6]]), 2);
}

#[test]
fn v4_header_layout() {
    let bytes = encode_message(&sample(ProtocolVersion::V4)).unwrap();
    assert_eq!(bytes[0], 0x49);
    let size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], 0]) as usize;
    assert_eq!(size, bytes.len());
    assert_eq!(bytes[4], 9);
    assert_eq!(bytes[5], 2);
    assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 2);
    assert_eq!(bytes[8], 0);
}

#[test]
fn magic_maps_to_version() {
    for version in [ProtocolVersion::V2, ProtocolVersion::V3, ProtocolVersion::V4] {
        assert_eq!(ProtocolVersion::from_magic(version.magic()).unwrap(), version);
    }
    assert_eq!(
        ProtocolVersion::from_magic(0x50).unwrap_err(),
        ProtocolError::UnknownProtocolVersion(0x50)
    );
}

#[test]
fn peek_header_needs_whole_header() {
    let bytes = encode_message(&sample(ProtocolVersion::V4)).unwrap();
    assert_eq!(peek_header(&[]).unwrap(), None);
    assert_eq!(peek_header(&bytes[..LONG_HEADER_LEN - 1]).unwrap(), None);
    let header = peek_header(&bytes[..LONG_HEADER_LEN]).unwrap().unwrap();
    assert_eq!(header.size, bytes.len());
    assert_eq!(header.field_count, 2);
    assert!(!header.compressed);
}

#[test]
fn peek_header_rejects_size_below_header() {
    let bytes = [0x37, 0x03, 0x00, 1, 1, 0, 0];
    assert!(matches!(
        peek_header(&bytes),
        Err(ProtocolError::MalformedHeader(_))
    ));
}

#[test]
fn extended_header_is_skipped() {
    let mut bytes = encode_message(&sample(ProtocolVersion::V4)).unwrap();
    // Two extra header bytes after the fixed header
    bytes.splice(LONG_HEADER_LEN..LONG_HEADER_LEN, [0xEE, 0xEE]);
    bytes[8] = 0x20;
    let size = bytes.len() as u32;
    bytes[1..4].copy_from_slice(&size.to_le_bytes()[..3]);

    let decoded = decode_message(&bytes).unwrap();
    assert_eq!(decoded.fields, sample(ProtocolVersion::V4).fields);
}

// ── Round trips ─────────────────────────────────────────────────

#[test]
fn zero_field_message_roundtrips() {
    for version in [ProtocolVersion::V2, ProtocolVersion::V3, ProtocolVersion::V4] {
        let message = Message::new(version, 1, 1);
        let bytes = encode_message(&message).unwrap();
        assert_eq!(bytes.len(), version.header_len());
        assert_eq!(decode_message(&bytes).unwrap(), message);
    }
}

#[test]
fn null_and_empty_strings_survive_message() {
    let message = Message::new(ProtocolVersion::V3, 4, 4)
        .with_field(1, FieldValue::String(None))
        .with_field(2, FieldValue::string(""));
    let decoded = decode_message(&encode_message(&message).unwrap()).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn trailing_bytes_are_ignored() {
    let message = sample(ProtocolVersion::V3);
    let mut bytes = encode_message(&message).unwrap();
    bytes.extend_from_slice(&[1, 2, 3]);
    assert_eq!(decode_message(&bytes).unwrap(), message);
}

// ── Compression ─────────────────────────────────────────────────

#[test]
fn compression_requires_v4() {
    let message = sample(ProtocolVersion::V3).with_compression(true);
    assert_eq!(
        encode_message(&message).unwrap_err(),
        ProtocolError::CompressionUnsupported(ProtocolVersion::V3)
    );
}

#[test]
fn compressed_message_shrinks_repetitive_payload() {
    let message = Message::new(ProtocolVersion::V4, 1, 1)
        .with_field(1, FieldValue::string("a".repeat(4000)))
        .with_compression(true);
    let bytes = encode_message(&message).unwrap();
    assert_eq!(bytes[8] & 0x01, 0x01);
    assert!(bytes.len() < 500);
    assert_eq!(decode_message(&bytes).unwrap(), message);
}

#[test]
fn wrong_uncompressed_size_is_error() {
    let message = sample(ProtocolVersion::V4).with_compression(true);
    let mut bytes = encode_message(&message).unwrap();
    // Uncompressed-size prefix sits right after the header
    bytes[LONG_HEADER_LEN] = bytes[LONG_HEADER_LEN].wrapping_add(1);
    assert!(matches!(
        decode_message(&bytes),
        Err(ProtocolError::Compression(_))
    ));
}

#[test]
fn oversize_v2_message_is_rejected() {
    let message = Message::new(ProtocolVersion::V2, 1, 1)
        .with_field(1, FieldValue::LongBinary(Some(vec![0; 70_000])));
    assert!(matches!(
        encode_message(&message),
        Err(ProtocolError::MessageTooLarge { max: 65535, .. })
    ));
}

// ── End to end ──────────────────────────────────────────────────

#[test]
fn v4_compressed_scenario() {
    let message = sample(ProtocolVersion::V4).with_compression(true);
    let bytes = encode_message(&message).unwrap();

    let mut assembler = PacketAssembler::new();
    let (first, second) = bytes.split_at(4);
    assembler.feed(first);
    assert!(!assembler.is_complete());
    assembler.feed(second);
    assert!(assembler.is_complete());

    let decoded = assembler.drain().unwrap().unwrap();
    assert_eq!(decoded.application_id, 9);
    assert_eq!(decoded.message_id, 2);
    assert!(decoded.compressed);
    assert_eq!(decoded.fields.string(5), Some("hello"));
    assert_eq!(decoded.fields.int32(7), Some(42));
    assert_eq!(assembler.buffered_len(), 0);
}

#[test]
fn v4_scenario_truncated_is_error() {
    let bytes = encode_message(&sample(ProtocolVersion::V4).with_compression(true)).unwrap();
    let truncated = &bytes[..bytes.len() - 1];
    assert!(matches!(
        decode_message(truncated),
        Err(ProtocolError::Truncated { .. })
    ));
    assert!(matches!(
        decode_message(&bytes[..SHORT_HEADER_LEN]),
        Err(ProtocolError::Truncated { needed: 9, .. })
    ));
}

#[test]
fn field_count_beyond_body_is_truncation() {
    let mut bytes = encode_message(&sample(ProtocolVersion::V2)).unwrap();
    bytes[5] = 3;
    assert!(matches!(
        decode_message(&bytes),
        Err(ProtocolError::Truncated { .. })
    ));
}

// ── Properties ──────────────────────────────────────────────────

fn version() -> impl Strategy<Value = ProtocolVersion> {
    prop_oneof![
        Just(ProtocolVersion::V2),
        Just(ProtocolVersion::V3),
        Just(ProtocolVersion::V4),
    ]
}

proptest! {
    #[test]
    fn messages_roundtrip(
        version in version(),
        app in any::<u8>(),
        msg in any::<u8>(),
        compress in any::<bool>(),
        ints in prop::collection::vec((0u16..=0x0FFF, any::<i32>()), 0..20),
        text in proptest::option::of(".{0,64}"),
    ) {
        let mut fields = FieldList::new();
        for (id, v) in ints {
            fields = fields.with(id, FieldValue::Int32(v));
        }
        fields = fields.with(0, FieldValue::String(text));
        let mut message = Message::new(version, app, msg);
        message.fields = fields;
        message.compressed = compress && version.supports_compression();

        let bytes = encode_message(&message).unwrap();
        prop_assert_eq!(decode_message(&bytes).unwrap(), message);
    }
}

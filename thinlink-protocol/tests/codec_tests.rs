use pretty_assertions::assert_eq;
use proptest::prelude::*;
use thinlink_protocol::{
    decode_field_list, decode_fields, decode_message, encode_field, write_field_list, Field,
    FieldList, FieldReader, FieldType, FieldValue, ProtocolError, MAX_NESTING,
};

fn roundtrip(list: &FieldList) -> FieldList {
    let mut buf = Vec::new();
    write_field_list(&mut buf, list).unwrap();
    let mut reader = FieldReader::new(&buf);
    let decoded = decode_field_list(&mut reader).unwrap();
    assert_eq!(reader.remaining(), 0);
    decoded
}

// ── Scalars ─────────────────────────────────────────────────────

#[test]
fn int32_encoding_is_little_endian() {
    let bytes = encode_field(&Field::new(7, FieldValue::Int32(42))).unwrap();
    assert_eq!(bytes, vec![0x07, 0x10, 42, 0, 0, 0]);
}

#[test]
fn scalar_widths() {
    let cases = [
        (FieldValue::Int16(-2), 2),
        (FieldValue::Int32(1), 4),
        (FieldValue::Byte(0xAB), 1),
        (FieldValue::Bool(true), 1),
        (FieldValue::Double(1.5), 8),
        (FieldValue::DateTime(1_700_000_000_000), 8),
    ];
    for (value, width) in cases {
        let ty = value.field_type();
        let bytes = encode_field(&Field::new(1, value)).unwrap();
        assert_eq!(bytes.len(), 2 + width, "{ty:?}");
        assert_eq!(ty.fixed_len(), Some(width));
    }
}

#[test]
fn bool_nonzero_decodes_true() {
    let bytes = [0x01, 0x30, 0x05];
    let mut reader = FieldReader::new(&bytes);
    let list = decode_fields(&mut reader, 1).unwrap();
    assert_eq!(list.bool(1), Some(true));
}

#[test]
fn datetime_converts_through_chrono() {
    let value = FieldValue::DateTime(1_700_000_000_123);
    let at = value.as_datetime().unwrap();
    assert_eq!(at.timestamp_millis(), 1_700_000_000_123);
    assert_eq!(FieldValue::datetime(at), value);
}

// ── Strings and binaries ────────────────────────────────────────

#[test]
fn null_and_empty_string_are_distinct() {
    let list = FieldList::new()
        .with(1, FieldValue::String(None))
        .with(2, FieldValue::string(""));
    let decoded = roundtrip(&list);
    assert_eq!(decoded.get(1), Some(&FieldValue::String(None)));
    assert_eq!(decoded.get(2), Some(&FieldValue::String(Some(String::new()))));
}

#[test]
fn null_string_uses_ffff_marker() {
    let bytes = encode_field(&Field::new(3, FieldValue::String(None))).unwrap();
    assert_eq!(&bytes[2..], &[0xFF, 0xFF]);
}

#[test]
fn long_binary_uses_u24_prefix() {
    let data = vec![9u8; 70_000];
    let bytes = encode_field(&Field::new(4, FieldValue::LongBinary(Some(data.clone())))).unwrap();
    assert_eq!(&bytes[2..5], &(70_000u32.to_le_bytes()[..3]));
    let list = roundtrip(&FieldList::new().with(4, FieldValue::LongBinary(Some(data.clone()))));
    assert_eq!(list.binary(4), Some(data.as_slice()));
}

#[test]
fn null_long_binary_roundtrips() {
    let list = roundtrip(&FieldList::new().with(4, FieldValue::LongBinary(None)));
    assert_eq!(list.get(4), Some(&FieldValue::LongBinary(None)));
}

#[test]
fn oversized_binary_is_rejected() {
    let err = encode_field(&Field::new(1, FieldValue::binary(vec![0u8; 0xFFFF]))).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::FieldTooLong {
            id: 1,
            len: 0xFFFF,
            max: 0xFFFE
        }
    );
}

#[test]
fn invalid_utf8_is_rejected() {
    let bytes = [0x02, 0x60, 0x02, 0x00, 0xC3, 0x28];
    let mut reader = FieldReader::new(&bytes);
    assert_eq!(
        decode_fields(&mut reader, 1).unwrap_err(),
        ProtocolError::InvalidUtf8(2)
    );
}

// ── Ids and nesting ─────────────────────────────────────────────

#[test]
fn field_id_above_4095_is_rejected() {
    let err = encode_field(&Field::new(4096, FieldValue::Byte(0))).unwrap_err();
    assert_eq!(err, ProtocolError::InvalidFieldId(4096));
    assert!(encode_field(&Field::new(4095, FieldValue::Byte(0))).is_ok());
}

#[test]
fn nested_lists_roundtrip() {
    let inner = FieldList::new()
        .with(1, FieldValue::Int16(5))
        .with(2, FieldValue::string("inner"));
    let outer = FieldList::new()
        .with(10, FieldValue::List(inner.clone()))
        .with(11, FieldValue::List(FieldList::new()))
        .with(12, FieldValue::Bool(false));
    let decoded = roundtrip(&outer);
    assert_eq!(decoded, outer);
    assert_eq!(decoded.list(10), Some(&inner));
    assert_eq!(decoded.list(11).map(FieldList::len), Some(0));
}

/// `depth` lists, each holding the next under id 1.
fn nested(depth: usize) -> FieldList {
    let mut list = FieldList::new().with(2, FieldValue::Byte(1));
    for _ in 1..depth {
        list = FieldList::new().with(1, FieldValue::List(list));
    }
    list
}

#[test]
fn nesting_up_to_limit_roundtrips() {
    let list = nested(MAX_NESTING);
    assert_eq!(roundtrip(&list), list);
}

#[test]
fn nesting_beyond_limit_is_not_encoded() {
    let mut buf = Vec::new();
    assert_eq!(
        write_field_list(&mut buf, &nested(MAX_NESTING + 1)).unwrap_err(),
        ProtocolError::NestingTooDeep(MAX_NESTING)
    );
}

#[test]
fn deeply_nested_message_is_rejected() {
    // V2 header, one field, then 16000 list headers (id 1, tag 9, count 1)
    let levels = 16_000;
    let size = 7 + levels * 4;
    let mut bytes = vec![0x27];
    bytes.extend_from_slice(&(size as u16).to_le_bytes());
    bytes.extend_from_slice(&[3, 4, 1, 0]);
    for _ in 0..levels {
        bytes.extend_from_slice(&[0x01, 0x90, 0x01, 0x00]);
    }
    assert_eq!(bytes.len(), size);

    assert_eq!(
        decode_message(&bytes).unwrap_err(),
        ProtocolError::NestingTooDeep(MAX_NESTING)
    );
}

#[test]
fn repeated_ids_preserve_order() {
    let list = FieldList::new()
        .with(1, FieldValue::Int32(1))
        .with(1, FieldValue::Int32(2));
    let decoded = roundtrip(&list);
    let values: Vec<_> = decoded.iter().map(|f| f.value.clone()).collect();
    assert_eq!(values, vec![FieldValue::Int32(1), FieldValue::Int32(2)]);
    // Lookup returns the first
    assert_eq!(decoded.int32(1), Some(1));
}

// ── Malformed input ─────────────────────────────────────────────

#[test]
fn truncated_payload_is_error() {
    let bytes = [0x01, 0x10, 0x01, 0x02];
    let mut reader = FieldReader::new(&bytes);
    assert!(matches!(
        decode_fields(&mut reader, 1),
        Err(ProtocolError::Truncated { needed: 4, available: 2 })
    ));
}

#[test]
fn missing_fields_are_truncation() {
    let bytes = [0x01, 0x20, 0x07];
    let mut reader = FieldReader::new(&bytes);
    assert!(matches!(
        decode_fields(&mut reader, 2),
        Err(ProtocolError::Truncated { .. })
    ));
}

#[test]
fn unknown_tag_keeps_earlier_fields() {
    // Byte id 1, then tag 0xA (unknown), then garbage
    let bytes = [0x01, 0x20, 0x07, 0x02, 0xA0, 0xDE, 0xAD];
    let mut reader = FieldReader::new(&bytes);
    let list = decode_fields(&mut reader, 3).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list.get(1), Some(&FieldValue::Byte(7)));
    assert!(reader.is_stopped());
}

#[test]
fn unknown_tags_are_10_to_15() {
    for tag in 0..=9u8 {
        assert_eq!(FieldType::from_tag(tag).map(FieldType::tag), Some(tag));
    }
    for tag in 10..=15u8 {
        assert!(FieldType::from_tag(tag).is_none());
    }
}

// ── Properties ──────────────────────────────────────────────────

fn leaf_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        any::<i16>().prop_map(FieldValue::Int16),
        any::<i32>().prop_map(FieldValue::Int32),
        any::<u8>().prop_map(FieldValue::Byte),
        any::<bool>().prop_map(FieldValue::Bool),
        (-1.0e12f64..1.0e12).prop_map(FieldValue::Double),
        any::<i64>().prop_map(FieldValue::DateTime),
        proptest::option::of(".{0,40}").prop_map(FieldValue::String),
        proptest::option::of(prop::collection::vec(any::<u8>(), 0..64)).prop_map(FieldValue::Binary),
        proptest::option::of(prop::collection::vec(any::<u8>(), 0..64))
            .prop_map(FieldValue::LongBinary),
    ]
}

fn field_value() -> impl Strategy<Value = FieldValue> {
    leaf_value().prop_recursive(3, 32, 6, |inner| {
        prop::collection::vec((0u16..=0x0FFF, inner), 0..6).prop_map(|fields| {
            FieldValue::List(
                fields
                    .into_iter()
                    .map(|(id, value)| Field::new(id, value))
                    .collect(),
            )
        })
    })
}

proptest! {
    #[test]
    fn field_lists_roundtrip(fields in prop::collection::vec((0u16..=0x0FFF, field_value()), 0..12)) {
        let list: FieldList = fields.into_iter().map(|(id, v)| Field::new(id, v)).collect();
        let mut buf = Vec::new();
        write_field_list(&mut buf, &list).unwrap();
        let mut reader = FieldReader::new(&buf);
        prop_assert_eq!(decode_field_list(&mut reader).unwrap(), list);
        prop_assert_eq!(reader.remaining(), 0);
    }
}

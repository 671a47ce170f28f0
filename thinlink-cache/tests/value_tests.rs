use pretty_assertions::assert_eq;
use thinlink_cache::{CacheHint, CacheMode, CachedValue, StoredType, ENVELOPE_VERSION};
use thinlink_protocol::{FieldList, FieldValue, Message, ProtocolVersion};

// ── CacheHint ───────────────────────────────────────────────────

#[test]
fn hint_modes() {
    assert_eq!(CacheHint::NONE.cache_mode(), None);
    assert_eq!(CacheHint::GUARANTEED.cache_mode(), None);
    assert_eq!(CacheHint::SESSION.cache_mode(), Some(CacheMode::Session));
    assert_eq!(CacheHint::PERSISTENT.cache_mode(), Some(CacheMode::Persistent));
    assert_eq!(
        (CacheHint::SESSION | CacheHint::PERSISTENT).cache_mode(),
        Some(CacheMode::Persistent)
    );
    assert_eq!(CacheHint::from(0x09).cache_mode(), Some(CacheMode::Session));
}

#[test]
fn hint_debug_lists_flags() {
    let hint = CacheHint::PERSISTENT | CacheHint::BACK_STACK_ONLY;
    assert_eq!(format!("{hint:?}"), "CacheHint(PERSISTENT | BACK_STACK_ONLY)");
    assert_eq!(format!("{:?}", CacheHint::NONE), "CacheHint(NONE)");
}

// ── Envelope ────────────────────────────────────────────────────

#[test]
fn envelope_header_layout() {
    let bytes = CachedValue::from("hi").to_envelope().unwrap();
    assert_eq!(bytes, vec![ENVELOPE_VERSION, 1, 0, b'h', b'i']);
}

#[test]
fn every_registered_type_restores() {
    let values = vec![
        CachedValue::Binary(vec![0, 1, 2]),
        CachedValue::Text("text".into()),
        CachedValue::FieldList(FieldList::new().with(3, FieldValue::Int16(-3))),
        CachedValue::Message(
            Message::new(ProtocolVersion::V4, 2, 8).with_field(1, FieldValue::string("m")),
        ),
    ];
    for value in values {
        let envelope = value.to_envelope().unwrap();
        assert_eq!(CachedValue::from_envelope(&envelope), Some(value));
    }
}

#[test]
fn unknown_tag_is_miss() {
    assert_eq!(StoredType::from_tag(4), None);
    assert_eq!(CachedValue::from_envelope(&[ENVELOPE_VERSION, 4, 0, 1]), None);
}

#[test]
fn unknown_version_is_miss() {
    assert_eq!(CachedValue::from_envelope(&[2, 0, 0, 1]), None);
}

#[test]
fn short_envelope_is_miss() {
    assert_eq!(CachedValue::from_envelope(&[ENVELOPE_VERSION, 0]), None);
}

#[test]
fn corrupt_payload_is_miss() {
    // Text with invalid UTF-8
    assert_eq!(CachedValue::restore(StoredType::Text.tag(), &[0xC3, 0x28]), None);
    // Message with an unknown magic byte
    assert_eq!(CachedValue::restore(StoredType::Message.tag(), &[0x00; 9]), None);
}

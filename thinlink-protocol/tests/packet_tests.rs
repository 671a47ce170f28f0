use proptest::prelude::*;
use thinlink_protocol::{
    PacketHeader, Priority, PriorityPacket, ProtocolError, MAX_PACKET_PAYLOAD, PACKET_HEADER_LEN,
};

#[test]
fn header_bit_layout() {
    let header = PacketHeader::new(Priority::TRANSACTIONAL, 0x0ABC).unwrap();
    // priority in byte0 low nibble, length low nibble in byte0 high nibble
    assert_eq!(header.encode(), [0xC3, 0xAB]);
}

#[test]
fn max_length_is_accepted() {
    let header = PacketHeader::new(Priority::CONTROL, MAX_PACKET_PAYLOAD).unwrap();
    assert_eq!(header.encode(), [0xFF, 0xFF]);
    assert_eq!(PacketHeader::decode([0xFF, 0xFF]), header);
}

#[test]
fn length_over_4095_is_rejected() {
    assert_eq!(
        PacketHeader::new(Priority::STREAMING, 4096).unwrap_err(),
        ProtocolError::PacketTooLong(4096)
    );
    assert!(PriorityPacket::new(Priority::STREAMING, vec![0; 4096]).is_err());
}

#[test]
fn priority_is_four_bits() {
    assert!(Priority::new(15).is_ok());
    assert_eq!(Priority::new(16).unwrap_err(), ProtocolError::InvalidPriority(16));
    assert!(Priority::CONTROL.is_control());
    assert!(!Priority::TRANSACTIONAL.is_control());
}

#[test]
fn packet_encode_prefixes_header() {
    let packet = PriorityPacket::new(Priority::STREAMING, vec![1, 2, 3]).unwrap();
    let bytes = packet.encode();
    assert_eq!(bytes.len(), PACKET_HEADER_LEN + 3);
    assert_eq!(PacketHeader::decode([bytes[0], bytes[1]]).length, 3);
    assert_eq!(&bytes[2..], &[1, 2, 3]);
}

proptest! {
    #[test]
    fn header_roundtrip(priority in 0u8..16, length in 0usize..=MAX_PACKET_PAYLOAD) {
        let header = PacketHeader::new(Priority::new(priority).unwrap(), length).unwrap();
        let decoded = PacketHeader::decode(header.encode());
        prop_assert_eq!(decoded, header);
        prop_assert_eq!(usize::from(decoded.length), length);
    }
}

//! Wire format for thinlink: a self-describing binary field encoding,
//! versioned message framing with optional deflate compression, the
//! PriorityPacket header, and in-order message reassembly.
//!
//! Everything in this crate is pure and synchronous. Transports feed bytes
//! in and take messages out.

pub mod assembler;
pub mod codec;
pub mod error;
pub mod field;
pub mod message;
pub mod packet;

pub use assembler::PacketAssembler;
pub use codec::{
    decode_field, decode_field_list, decode_fields, encode_field, write_field, write_field_list,
    write_fields, FieldReader, MAX_NESTING, NULL_LEN_16, NULL_LEN_24,
};
pub use error::{ProtocolError, ProtocolResult};
pub use field::{Field, FieldList, FieldType, FieldValue, MAX_FIELD_ID};
pub use message::{
    decode_message, encode_message, peek_header, Message, MessageHeader, ProtocolVersion,
    LONG_HEADER_LEN, SHORT_HEADER_LEN,
};
pub use packet::{
    PacketHeader, Priority, PriorityPacket, MAX_PACKET_PAYLOAD, PACKET_HEADER_LEN,
};

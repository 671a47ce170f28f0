//! Error types for the protocol layer.

use crate::message::ProtocolVersion;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding a single message.
///
/// A protocol error is always scoped to one message; it never invalidates
/// the channel that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The magic byte does not map to a known protocol version.
    #[error("unknown protocol version (magic 0x{0:02x})")]
    UnknownProtocolVersion(u8),

    /// The input ended before a declared length or count was satisfied.
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// A header declared an impossible size.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Field IDs are 12 bits wide.
    #[error("field id {0} exceeds 4095")]
    InvalidFieldId(u16),

    /// A string or binary payload does not fit its length prefix.
    #[error("field {id} payload of {len} bytes exceeds maximum {max}")]
    FieldTooLong { id: u16, len: usize, max: usize },

    /// FieldLists are nested deeper than the codec accepts.
    #[error("field lists nested deeper than {0}")]
    NestingTooDeep(usize),

    /// A list or message holds more children than a u16 count can express.
    #[error("too many fields: {0}")]
    TooManyFields(usize),

    /// A string field does not hold valid UTF-8.
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(u16),

    /// The encoded message does not fit the version's size field.
    #[error("message of {size} bytes exceeds {max} for this protocol version")]
    MessageTooLarge { size: usize, max: usize },

    /// Compression requested on a version without an extras byte.
    #[error("compression is not supported by {0:?}")]
    CompressionUnsupported(ProtocolVersion),

    /// Deflate or inflate failed, or the inflated size is wrong.
    #[error("compression error: {0}")]
    Compression(String),

    /// PriorityPacket payloads are limited to 12 bits of length.
    #[error("packet payload of {0} bytes exceeds 4095")]
    PacketTooLong(usize),

    /// PriorityPacket priorities are 4 bits wide.
    #[error("invalid packet priority {0}")]
    InvalidPriority(u8),
}

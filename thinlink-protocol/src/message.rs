//! Whole-message framing: version-dependent header plus field stream.
//!
//! ```text
//! V2/V3 (7 bytes):  magic | size u16 | app u8 | msg u8 | count u16
//! V4    (9 bytes):  magic | size u24 | app u8 | msg u8 | count u16 | extras u8
//! ```
//!
//! `size` covers the whole message including its header. In V4 the extras
//! byte carries the compression flag (bit 0) and, in its high nibble, the
//! length of an extended header that decoders skip. A compressed body is a
//! u24 uncompressed length followed by a raw deflate stream.

use crate::codec::{decode_fields, put_u24, write_fields, FieldReader};
use crate::error::{ProtocolError, ProtocolResult};
use crate::field::{Field, FieldList, FieldValue};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::borrow::Cow;
use std::io::{Read, Write};
use tracing::debug;

/// Length of the V2/V3 header.
pub const SHORT_HEADER_LEN: usize = 7;

/// Length of the V4 header.
pub const LONG_HEADER_LEN: usize = 9;

/// Length of the uncompressed-size prefix of a compressed body.
pub const COMPRESSED_PREFIX_LEN: usize = 3;

const EXTRAS_COMPRESSED: u8 = 0x01;

/// Protocol version, identified on the wire by its magic byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    V2,
    V3,
    V4,
}

impl ProtocolVersion {
    /// Maps a magic byte to its version.
    pub fn from_magic(magic: u8) -> ProtocolResult<Self> {
        match magic {
            0x27 => Ok(Self::V2),
            0x37 => Ok(Self::V3),
            0x49 => Ok(Self::V4),
            other => Err(ProtocolError::UnknownProtocolVersion(other)),
        }
    }

    pub fn magic(self) -> u8 {
        match self {
            Self::V2 => 0x27,
            Self::V3 => 0x37,
            Self::V4 => 0x49,
        }
    }

    /// Numeric version (2, 3 or 4).
    pub fn number(self) -> u8 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
        }
    }

    pub fn header_len(self) -> usize {
        match self {
            Self::V2 | Self::V3 => SHORT_HEADER_LEN,
            Self::V4 => LONG_HEADER_LEN,
        }
    }

    /// Largest total size the header can declare.
    pub fn max_size(self) -> usize {
        match self {
            Self::V2 | Self::V3 => usize::from(u16::MAX),
            Self::V4 => 0x00FF_FFFF,
        }
    }

    /// Only V4 has an extras byte to carry the compression flag.
    pub fn supports_compression(self) -> bool {
        matches!(self, Self::V4)
    }
}

/// A decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: ProtocolVersion,
    /// Total message size in bytes, header included.
    pub size: usize,
    pub application_id: u8,
    pub message_id: u8,
    pub field_count: u16,
    pub compressed: bool,
    /// Extended-header bytes following the fixed header (V4 only).
    pub extended_len: usize,
}

impl MessageHeader {
    /// Offset of the body (fields or compressed prefix).
    pub fn body_offset(&self) -> usize {
        self.version.header_len() + self.extended_len
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub version: ProtocolVersion,
    pub application_id: u8,
    pub message_id: u8,
    pub fields: FieldList,
    pub compressed: bool,
}

impl Message {
    /// Creates an empty, uncompressed message.
    pub fn new(version: ProtocolVersion, application_id: u8, message_id: u8) -> Self {
        Self {
            version,
            application_id,
            message_id,
            fields: FieldList::new(),
            compressed: false,
        }
    }

    /// Appends a field.
    pub fn with_field(mut self, id: u16, value: FieldValue) -> Self {
        self.fields.push(Field::new(id, value));
        self
    }

    /// Sets the compression flag.
    pub fn with_compression(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_message(self)
    }

    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_message(bytes)
    }
}

/// Serializes a message, compressing the field stream when requested.
pub fn encode_message(message: &Message) -> ProtocolResult<Vec<u8>> {
    let version = message.version;
    if message.compressed && !version.supports_compression() {
        return Err(ProtocolError::CompressionUnsupported(version));
    }
    let field_count = u16::try_from(message.fields.len())
        .map_err(|_| ProtocolError::TooManyFields(message.fields.len()))?;

    let mut body = Vec::new();
    write_fields(&mut body, &message.fields)?;

    if message.compressed {
        body = compress_body(&body)?;
    }

    let size = version.header_len() + body.len();
    if size > version.max_size() {
        return Err(ProtocolError::MessageTooLarge {
            size,
            max: version.max_size(),
        });
    }

    let mut out = Vec::with_capacity(size);
    out.push(version.magic());
    match version {
        ProtocolVersion::V2 | ProtocolVersion::V3 => {
            out.extend_from_slice(&(size as u16).to_le_bytes());
        }
        ProtocolVersion::V4 => put_u24(&mut out, size as u32),
    }
    out.push(message.application_id);
    out.push(message.message_id);
    out.extend_from_slice(&field_count.to_le_bytes());
    if version == ProtocolVersion::V4 {
        out.push(if message.compressed { EXTRAS_COMPRESSED } else { 0 });
    }
    out.extend_from_slice(&body);
    Ok(out)
}

fn compress_body(raw: &[u8]) -> ProtocolResult<Vec<u8>> {
    if raw.len() > 0x00FF_FFFF {
        return Err(ProtocolError::MessageTooLarge {
            size: raw.len(),
            max: 0x00FF_FFFF,
        });
    }
    let mut out = Vec::with_capacity(COMPRESSED_PREFIX_LEN + raw.len() / 2);
    put_u24(&mut out, raw.len() as u32);
    let mut encoder = DeflateEncoder::new(out, Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| ProtocolError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ProtocolError::Compression(e.to_string()))
}

/// Parses a header from the front of `bytes`.
///
/// Returns `Ok(None)` when more bytes are needed to read the header of the
/// detected version. An unknown magic byte or an impossible size is an
/// error.
pub fn peek_header(bytes: &[u8]) -> ProtocolResult<Option<MessageHeader>> {
    let Some(&magic) = bytes.first() else {
        return Ok(None);
    };
    let version = ProtocolVersion::from_magic(magic)?;
    let header_len = version.header_len();
    if bytes.len() < header_len {
        return Ok(None);
    }

    let (size, rest) = match version {
        ProtocolVersion::V2 | ProtocolVersion::V3 => {
            (usize::from(u16::from_le_bytes([bytes[1], bytes[2]])), &bytes[3..])
        }
        ProtocolVersion::V4 => (
            u32::from_le_bytes([bytes[1], bytes[2], bytes[3], 0]) as usize,
            &bytes[4..],
        ),
    };
    let application_id = rest[0];
    let message_id = rest[1];
    let field_count = u16::from_le_bytes([rest[2], rest[3]]);
    let (compressed, extended_len) = match version {
        ProtocolVersion::V4 => {
            let extras = rest[4];
            (extras & EXTRAS_COMPRESSED != 0, usize::from(extras >> 4))
        }
        _ => (false, 0),
    };

    let header = MessageHeader {
        version,
        size,
        application_id,
        message_id,
        field_count,
        compressed,
        extended_len,
    };

    let minimum = header.body_offset() + if compressed { COMPRESSED_PREFIX_LEN } else { 0 };
    if size < minimum {
        return Err(ProtocolError::MalformedHeader(format!(
            "declared size {size} is below the minimum of {minimum}"
        )));
    }
    Ok(Some(header))
}

/// Decodes one message from the front of `bytes`.
///
/// Bytes past the declared size are ignored.
pub fn decode_message(bytes: &[u8]) -> ProtocolResult<Message> {
    let header = peek_header(bytes)?.ok_or_else(|| {
        let needed = bytes
            .first()
            .and_then(|&m| ProtocolVersion::from_magic(m).ok())
            .map_or(SHORT_HEADER_LEN, ProtocolVersion::header_len);
        ProtocolError::Truncated {
            needed,
            available: bytes.len(),
        }
    })?;
    decode_with_header(&header, bytes)
}

/// Decodes the body of a message whose header has already been parsed.
pub(crate) fn decode_with_header(header: &MessageHeader, bytes: &[u8]) -> ProtocolResult<Message> {
    if bytes.len() < header.size {
        return Err(ProtocolError::Truncated {
            needed: header.size,
            available: bytes.len(),
        });
    }
    let body = &bytes[header.body_offset()..header.size];

    let fields_bytes: Cow<'_, [u8]> = if header.compressed {
        Cow::Owned(inflate_body(body)?)
    } else {
        Cow::Borrowed(body)
    };

    let mut reader = FieldReader::new(&fields_bytes);
    let fields = decode_fields(&mut reader, usize::from(header.field_count))?;
    if !reader.is_stopped() && reader.remaining() > 0 {
        debug!(
            trailing = reader.remaining(),
            app = header.application_id,
            msg = header.message_id,
            "ignoring trailing bytes after declared fields"
        );
    }

    Ok(Message {
        version: header.version,
        application_id: header.application_id,
        message_id: header.message_id,
        fields,
        compressed: header.compressed,
    })
}

fn inflate_body(body: &[u8]) -> ProtocolResult<Vec<u8>> {
    let mut reader = FieldReader::new(body);
    let raw_len = reader.read_u24()? as usize;
    let compressed = &body[COMPRESSED_PREFIX_LEN..];

    let mut out = Vec::with_capacity(raw_len);
    // One extra byte so an over-long stream is detected without inflating it all
    DeflateDecoder::new(compressed)
        .take(raw_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ProtocolError::Compression(e.to_string()))?;
    if out.len() != raw_len {
        return Err(ProtocolError::Compression(format!(
            "inflated {} bytes, header declared {raw_len}",
            out.len()
        )));
    }
    Ok(out)
}

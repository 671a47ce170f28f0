//! Typed values and the versioned envelope they are stored in.
//!
//! ```text
//! byte0    format version (1)
//! byte1-2  StoredType tag, u16 LE
//! rest     type-specific payload
//! ```

use crate::error::CacheResult;
use thinlink_protocol::{
    decode_field_list, decode_message, encode_message, write_field_list, FieldList, FieldReader,
    Message,
};
use tracing::debug;

/// Envelope format version written by this crate.
pub const ENVELOPE_VERSION: u8 = 1;

/// Envelope header length.
pub const ENVELOPE_HEADER_LEN: usize = 3;

/// Registered stored types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StoredType {
    Binary = 0,
    Text = 1,
    FieldList = 2,
    Message = 3,
}

impl StoredType {
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0 => Some(Self::Binary),
            1 => Some(Self::Text),
            2 => Some(Self::FieldList),
            3 => Some(Self::Message),
            _ => None,
        }
    }

    pub fn tag(self) -> u16 {
        self as u16
    }
}

/// A value that can be stored in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Binary(Vec<u8>),
    Text(String),
    FieldList(FieldList),
    Message(Message),
}

impl CachedValue {
    pub fn stored_type(&self) -> StoredType {
        match self {
            Self::Binary(_) => StoredType::Binary,
            Self::Text(_) => StoredType::Text,
            Self::FieldList(_) => StoredType::FieldList,
            Self::Message(_) => StoredType::Message,
        }
    }

    /// Serializes the payload (without envelope).
    pub fn persist(&self) -> CacheResult<Vec<u8>> {
        Ok(match self {
            Self::Binary(b) => b.clone(),
            Self::Text(s) => s.as_bytes().to_vec(),
            Self::FieldList(list) => {
                let mut out = Vec::new();
                write_field_list(&mut out, list)?;
                out
            }
            Self::Message(m) => encode_message(m)?,
        })
    }

    /// Rebuilds a value from its tag and payload. Unknown tags and payloads
    /// that fail to decode yield `None`.
    pub fn restore(tag: u16, payload: &[u8]) -> Option<Self> {
        match StoredType::from_tag(tag)? {
            StoredType::Binary => Some(Self::Binary(payload.to_vec())),
            StoredType::Text => String::from_utf8(payload.to_vec()).ok().map(Self::Text),
            StoredType::FieldList => {
                let mut reader = FieldReader::new(payload);
                decode_field_list(&mut reader).ok().map(Self::FieldList)
            }
            StoredType::Message => decode_message(payload).ok().map(Self::Message),
        }
    }

    /// Wraps the persisted payload in the versioned envelope.
    pub fn to_envelope(&self) -> CacheResult<Vec<u8>> {
        let payload = self.persist()?;
        let mut out = Vec::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
        out.push(ENVELOPE_VERSION);
        out.extend_from_slice(&self.stored_type().tag().to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Parses an envelope. Unknown versions, unknown tags and corrupt
    /// payloads yield `None`.
    pub fn from_envelope(data: &[u8]) -> Option<Self> {
        if data.len() < ENVELOPE_HEADER_LEN {
            debug!(len = data.len(), "cache envelope too short");
            return None;
        }
        if data[0] != ENVELOPE_VERSION {
            debug!(version = data[0], "unsupported cache envelope version");
            return None;
        }
        let tag = u16::from_le_bytes([data[1], data[2]]);
        let value = Self::restore(tag, &data[ENVELOPE_HEADER_LEN..]);
        if value.is_none() {
            debug!(tag, "cache payload could not be restored");
        }
        value
    }
}

impl From<Vec<u8>> for CachedValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl From<String> for CachedValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for CachedValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<FieldList> for CachedValue {
    fn from(list: FieldList) -> Self {
        Self::FieldList(list)
    }
}

impl From<Message> for CachedValue {
    fn from(m: Message) -> Self {
        Self::Message(m)
    }
}

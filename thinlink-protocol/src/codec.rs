//! Encoder/decoder for the tagged, recursive field format.
//!
//! Field header: little-endian u16, low 12 bits = id, high 4 bits = type
//! tag. Fixed-width payloads follow directly; String/Binary carry a u16
//! length prefix, LongBinary a u24 prefix, FieldList a u16 child count.
//! The all-ones length is the null marker.

use crate::error::{ProtocolError, ProtocolResult};
use crate::field::{Field, FieldList, FieldType, FieldValue, MAX_FIELD_ID};
use tracing::warn;

/// Null marker for u16-prefixed payloads.
pub const NULL_LEN_16: u16 = 0xFFFF;

/// Null marker for u24-prefixed payloads.
pub const NULL_LEN_24: u32 = 0x00FF_FFFF;

/// Deepest FieldList nesting accepted by the encoder and decoder.
pub const MAX_NESTING: usize = 64;

/// Cursor over an encoded field stream.
///
/// Once an unknown type tag is met the reader is marked stopped: the
/// lengths of the remaining fields cannot be known, so every enclosing
/// list ends early as well.
#[derive(Debug)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
    stopped: bool,
    /// Number of FieldLists currently open.
    depth: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            stopped: false,
            depth: 0,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether decoding stopped at an unknown type tag.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn take(&mut self, n: usize) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> ProtocolResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u24(&mut self) -> ProtocolResult<u32> {
        let [a, b, c] = self.take_array()?;
        Ok(u32::from_le_bytes([a, b, c, 0]))
    }
}

/// Appends a little-endian u24.
pub(crate) fn put_u24(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Encodes a single field into a fresh buffer.
pub fn encode_field(field: &Field) -> ProtocolResult<Vec<u8>> {
    let mut out = Vec::new();
    write_field(&mut out, field)?;
    Ok(out)
}

/// Appends the encoding of `field` to `out`.
pub fn write_field(out: &mut Vec<u8>, field: &Field) -> ProtocolResult<()> {
    write_field_at(out, field, 0)
}

fn write_field_at(out: &mut Vec<u8>, field: &Field, depth: usize) -> ProtocolResult<()> {
    if field.id > MAX_FIELD_ID {
        return Err(ProtocolError::InvalidFieldId(field.id));
    }
    let header = field.id | (u16::from(field.value.field_type().tag()) << 12);
    out.extend_from_slice(&header.to_le_bytes());

    match &field.value {
        FieldValue::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Byte(v) => out.push(*v),
        FieldValue::Bool(v) => out.push(u8::from(*v)),
        FieldValue::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::DateTime(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::String(s) => write_short(out, field.id, s.as_ref().map(|s| s.as_bytes()))?,
        FieldValue::Binary(b) => write_short(out, field.id, b.as_deref())?,
        FieldValue::LongBinary(b) => match b {
            None => put_u24(out, NULL_LEN_24),
            Some(b) => {
                let max = (NULL_LEN_24 - 1) as usize;
                if b.len() > max {
                    return Err(ProtocolError::FieldTooLong {
                        id: field.id,
                        len: b.len(),
                        max,
                    });
                }
                put_u24(out, b.len() as u32);
                out.extend_from_slice(b);
            }
        },
        FieldValue::List(list) => write_list_at(out, list, depth + 1)?,
    }
    Ok(())
}

fn write_short(out: &mut Vec<u8>, id: u16, data: Option<&[u8]>) -> ProtocolResult<()> {
    match data {
        None => out.extend_from_slice(&NULL_LEN_16.to_le_bytes()),
        Some(data) => {
            let max = usize::from(NULL_LEN_16 - 1);
            if data.len() > max {
                return Err(ProtocolError::FieldTooLong {
                    id,
                    len: data.len(),
                    max,
                });
            }
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
    }
    Ok(())
}

/// Appends a u16 child count followed by every child field.
pub fn write_field_list(out: &mut Vec<u8>, list: &FieldList) -> ProtocolResult<()> {
    write_list_at(out, list, 1)
}

fn write_list_at(out: &mut Vec<u8>, list: &FieldList, depth: usize) -> ProtocolResult<()> {
    if depth > MAX_NESTING {
        return Err(ProtocolError::NestingTooDeep(MAX_NESTING));
    }
    let count = u16::try_from(list.len()).map_err(|_| ProtocolError::TooManyFields(list.len()))?;
    out.extend_from_slice(&count.to_le_bytes());
    for field in list {
        write_field_at(out, field, depth)?;
    }
    Ok(())
}

/// Appends every field of `list` without a count prefix.
pub fn write_fields(out: &mut Vec<u8>, list: &FieldList) -> ProtocolResult<()> {
    for field in list {
        write_field(out, field)?;
    }
    Ok(())
}

/// Decodes `count` fields.
///
/// Running out of input before `count` fields is a `Truncated` error. An
/// unknown type tag ends decoding early and keeps what was decoded.
pub fn decode_fields(reader: &mut FieldReader<'_>, count: usize) -> ProtocolResult<FieldList> {
    let mut list = FieldList::with_capacity(count.min(reader.remaining() / 2));
    for _ in 0..count {
        if reader.stopped {
            break;
        }
        match decode_field(reader)? {
            Some(field) => list.push(field),
            None => break,
        }
    }
    Ok(list)
}

/// Decodes a u16 child count followed by that many fields.
///
/// Lists nested deeper than [`MAX_NESTING`] fail with `NestingTooDeep`.
pub fn decode_field_list(reader: &mut FieldReader<'_>) -> ProtocolResult<FieldList> {
    if reader.depth >= MAX_NESTING {
        return Err(ProtocolError::NestingTooDeep(MAX_NESTING));
    }
    let count = reader.read_u16()?;
    reader.depth += 1;
    let list = decode_fields(reader, usize::from(count));
    reader.depth -= 1;
    list
}

/// Decodes one field. Returns `Ok(None)` at an unknown type tag.
pub fn decode_field(reader: &mut FieldReader<'_>) -> ProtocolResult<Option<Field>> {
    let header = reader.read_u16()?;
    let id = header & MAX_FIELD_ID;
    let tag = (header >> 12) as u8;

    let Some(field_type) = FieldType::from_tag(tag) else {
        warn!(field_id = id, tag, "unknown field type, skipping remaining fields");
        reader.stopped = true;
        return Ok(None);
    };

    let value = match field_type {
        FieldType::Int16 => FieldValue::Int16(i16::from_le_bytes(reader.take_array()?)),
        FieldType::Int32 => FieldValue::Int32(i32::from_le_bytes(reader.take_array()?)),
        FieldType::Byte => FieldValue::Byte(reader.read_u8()?),
        FieldType::Bool => FieldValue::Bool(reader.read_u8()? != 0),
        FieldType::Double => FieldValue::Double(f64::from_le_bytes(reader.take_array()?)),
        FieldType::DateTime => FieldValue::DateTime(i64::from_le_bytes(reader.take_array()?)),
        FieldType::String => match read_short(reader)? {
            None => FieldValue::String(None),
            Some(bytes) => {
                let s = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8(id))?;
                FieldValue::String(Some(s.to_owned()))
            }
        },
        FieldType::Binary => FieldValue::Binary(read_short(reader)?.map(<[u8]>::to_vec)),
        FieldType::LongBinary => {
            let len = reader.read_u24()?;
            if len == NULL_LEN_24 {
                FieldValue::LongBinary(None)
            } else {
                FieldValue::LongBinary(Some(reader.take(len as usize)?.to_vec()))
            }
        }
        FieldType::FieldList => FieldValue::List(decode_field_list(reader)?),
    };
    Ok(Some(Field::new(id, value)))
}

fn read_short<'a>(reader: &mut FieldReader<'a>) -> ProtocolResult<Option<&'a [u8]>> {
    let len = reader.read_u16()?;
    if len == NULL_LEN_16 {
        return Ok(None);
    }
    reader.take(usize::from(len)).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_id_low_and_tag_high() {
        let bytes = encode_field(&Field::new(0x123, FieldValue::Int32(0))).unwrap();
        // tag 1 (Int32) in the high nibble
        assert_eq!(&bytes[..2], &0x1123u16.to_le_bytes());
    }

    #[test]
    fn u24_roundtrip() {
        let mut out = Vec::new();
        put_u24(&mut out, 0x00AB_CDEF);
        assert_eq!(out, [0xEF, 0xCD, 0xAB]);
        let mut reader = FieldReader::new(&out);
        assert_eq!(reader.read_u24().unwrap(), 0x00AB_CDEF);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn reader_take_reports_shortfall() {
        let mut reader = FieldReader::new(&[1, 2]);
        assert_eq!(
            reader.take(3).unwrap_err(),
            ProtocolError::Truncated {
                needed: 3,
                available: 2
            }
        );
        // Failed take does not advance
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn unknown_tag_stops_nested_lists() {
        // Outer list of 2: [inner list of 2: [Int16 id 1, unknown tag], Byte id 3]
        let mut buf = Vec::new();
        buf.extend_from_slice(&(2u16 | (9 << 12)).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&(1u16).to_le_bytes());
        buf.extend_from_slice(&7i16.to_le_bytes());
        buf.extend_from_slice(&(5u16 | (0xC << 12)).to_le_bytes());
        buf.extend_from_slice(&(3u16 | (2 << 12)).to_le_bytes());
        buf.push(9);

        let mut reader = FieldReader::new(&buf);
        let list = decode_fields(&mut reader, 2).unwrap();
        assert!(reader.is_stopped());
        assert_eq!(list.len(), 1);
        let inner = list.list(2).unwrap();
        assert_eq!(inner.int16(1), Some(7));
        assert_eq!(inner.len(), 1);
    }
}

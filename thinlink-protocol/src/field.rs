//! Field values carried by protocol messages.
//!
//! A field is a 12-bit id plus a typed value. The codec treats ids as
//! opaque: nothing here knows what a given id means to the application.

use chrono::{DateTime, TimeZone, Utc};

/// Highest field id that fits the 12-bit id slot of a field header.
pub const MAX_FIELD_ID: u16 = 0x0FFF;

/// 4-bit type tag stored in the high nibble of a field header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Int16 = 0,
    Int32 = 1,
    Byte = 2,
    Bool = 3,
    Double = 4,
    DateTime = 5,
    String = 6,
    Binary = 7,
    LongBinary = 8,
    FieldList = 9,
}

impl FieldType {
    /// Maps a wire tag to a type. Tags 10..=15 are unknown.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Int16,
            1 => Self::Int32,
            2 => Self::Byte,
            3 => Self::Bool,
            4 => Self::Double,
            5 => Self::DateTime,
            6 => Self::String,
            7 => Self::Binary,
            8 => Self::LongBinary,
            9 => Self::FieldList,
            _ => return None,
        })
    }

    /// Returns the wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Payload width for fixed-size types, `None` for length-prefixed ones.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            Self::Byte | Self::Bool => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 => Some(4),
            Self::Double | Self::DateTime => Some(8),
            Self::String | Self::Binary | Self::LongBinary | Self::FieldList => None,
        }
    }
}

/// A typed field value.
///
/// `String`, `Binary` and `LongBinary` distinguish an absent value (`None`)
/// from an empty one (`Some` of length 0); both survive a round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int16(i16),
    Int32(i32),
    Byte(u8),
    Bool(bool),
    Double(f64),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    String(Option<String>),
    Binary(Option<Vec<u8>>),
    LongBinary(Option<Vec<u8>>),
    List(FieldList),
}

impl FieldValue {
    /// Returns the wire type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int16(_) => FieldType::Int16,
            Self::Int32(_) => FieldType::Int32,
            Self::Byte(_) => FieldType::Byte,
            Self::Bool(_) => FieldType::Bool,
            Self::Double(_) => FieldType::Double,
            Self::DateTime(_) => FieldType::DateTime,
            Self::String(_) => FieldType::String,
            Self::Binary(_) => FieldType::Binary,
            Self::LongBinary(_) => FieldType::LongBinary,
            Self::List(_) => FieldType::FieldList,
        }
    }

    /// Builds a present string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(Some(s.into()))
    }

    /// Builds a present binary value.
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary(Some(data.into()))
    }

    /// Builds a DateTime value from a UTC timestamp (millisecond precision).
    pub fn datetime(at: DateTime<Utc>) -> Self {
        Self::DateTime(at.timestamp_millis())
    }

    /// Interprets a DateTime value as a UTC timestamp.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(ms) => Utc.timestamp_millis_opt(*ms).single(),
            _ => None,
        }
    }
}

/// A field: 12-bit id plus value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: u16,
    pub value: FieldValue,
}

impl Field {
    pub fn new(id: u16, value: FieldValue) -> Self {
        Self { id, value }
    }
}

/// An ordered list of fields. Ids may repeat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldList(Vec<Field>);

impl FieldList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Appends a field.
    pub fn push(&mut self, field: Field) {
        self.0.push(field);
    }

    /// Builder-style append.
    pub fn with(mut self, id: u16, value: FieldValue) -> Self {
        self.0.push(Field::new(id, value));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Field] {
        &self.0
    }

    /// Returns the value of the first field with `id`.
    pub fn get(&self, id: u16) -> Option<&FieldValue> {
        self.0.iter().find(|f| f.id == id).map(|f| &f.value)
    }

    pub fn int16(&self, id: u16) -> Option<i16> {
        match self.get(id)? {
            FieldValue::Int16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn int32(&self, id: u16) -> Option<i32> {
        match self.get(id)? {
            FieldValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn bool(&self, id: u16) -> Option<bool> {
        match self.get(id)? {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a present string value. Absent strings yield `None`.
    pub fn string(&self, id: u16) -> Option<&str> {
        match self.get(id)? {
            FieldValue::String(Some(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a present binary value of either width.
    pub fn binary(&self, id: u16) -> Option<&[u8]> {
        match self.get(id)? {
            FieldValue::Binary(Some(b)) | FieldValue::LongBinary(Some(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn list(&self, id: u16) -> Option<&FieldList> {
        match self.get(id)? {
            FieldValue::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<Vec<Field>> for FieldList {
    fn from(fields: Vec<Field>) -> Self {
        Self(fields)
    }
}

impl FromIterator<Field> for FieldList {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FieldList {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

//! `--field id=type:value` arguments and message printing.
//!
//! Types: `i16`, `i32`, `u8`, `bool`, `f64`, `time` (RFC 3339), `str`,
//! `hex` (u16-prefixed binary), `longhex` (u24-prefixed binary). A `str`,
//! `hex` or `longhex` field written as `id=type` with no `:value` is null.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;
use thinlink_protocol::{Field, FieldList, FieldValue, MAX_FIELD_ID, Message};

/// Parses one `id=type:value` argument.
pub fn parse_field(arg: &str) -> Result<Field> {
    let (id, spec) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("Field '{arg}' must look like id=type:value"))?;
    let id: u16 = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid field id '{id}'"))?;
    if id > MAX_FIELD_ID {
        bail!("Field id {id} exceeds {MAX_FIELD_ID}");
    }

    let (ty, value) = match spec.split_once(':') {
        Some((ty, value)) => (ty, Some(value)),
        None => (spec, None),
    };
    Ok(Field::new(id, parse_value(ty, value)?))
}

fn parse_value(ty: &str, value: Option<&str>) -> Result<FieldValue> {
    let nullable = matches!(ty, "str" | "hex" | "longhex");
    let Some(value) = value else {
        if nullable {
            return Ok(match ty {
                "str" => FieldValue::String(None),
                "hex" => FieldValue::Binary(None),
                _ => FieldValue::LongBinary(None),
            });
        }
        bail!("Field type '{ty}' needs a value");
    };

    let bad = || format!("Invalid {ty} value '{value}'");
    Ok(match ty {
        "i16" => FieldValue::Int16(value.parse().with_context(bad)?),
        "i32" => FieldValue::Int32(value.parse().with_context(bad)?),
        "u8" => FieldValue::Byte(value.parse().with_context(bad)?),
        "bool" => FieldValue::Bool(value.parse().with_context(bad)?),
        "f64" => FieldValue::Double(value.parse().with_context(bad)?),
        "time" => {
            let at = DateTime::parse_from_rfc3339(value).with_context(bad)?;
            FieldValue::datetime(at.with_timezone(&Utc))
        }
        "str" => FieldValue::string(value),
        "hex" => FieldValue::Binary(Some(hex::decode(value).with_context(bad)?)),
        "longhex" => FieldValue::LongBinary(Some(hex::decode(value).with_context(bad)?)),
        other => bail!("Unknown field type '{other}'"),
    })
}

/// Renders a value the way `parse_field` accepts it.
pub fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Int16(v) => format!("i16:{v}"),
        FieldValue::Int32(v) => format!("i32:{v}"),
        FieldValue::Byte(v) => format!("u8:{v}"),
        FieldValue::Bool(v) => format!("bool:{v}"),
        FieldValue::Double(v) => format!("f64:{v}"),
        FieldValue::DateTime(ms) => match value.as_datetime() {
            Some(at) => format!("time:{}", at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => format!("time:{ms}ms"),
        },
        FieldValue::String(None) => "str".to_string(),
        FieldValue::String(Some(s)) => format!("str:{s}"),
        FieldValue::Binary(None) => "hex".to_string(),
        FieldValue::Binary(Some(b)) => format!("hex:{}", hex::encode(b)),
        FieldValue::LongBinary(None) => "longhex".to_string(),
        FieldValue::LongBinary(Some(b)) => format!("longhex:{}", hex::encode(b)),
        FieldValue::List(list) => format!("list[{}]", format_fields(list)),
    }
}

/// Space-separated `id=value` pairs.
pub fn format_fields(fields: &FieldList) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}={}", field.id, format_value(&field.value));
    }
    out
}

/// One-line summary of a message.
pub fn format_message(message: &Message) -> String {
    format!(
        "v{} app={} msg={}{} {}",
        message.version.number(),
        message.application_id,
        message.message_id,
        if message.compressed { " (deflate)" } else { "" },
        format_fields(&message.fields)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use thinlink_protocol::ProtocolVersion;

    fn value(arg: &str) -> FieldValue {
        parse_field(arg).unwrap().value
    }

    #[test]
    fn scalar_types() {
        assert_eq!(parse_field("12=i32:-5").unwrap(), Field::new(12, FieldValue::Int32(-5)));
        assert_eq!(value("1=i16:300"), FieldValue::Int16(300));
        assert_eq!(value("1=u8:255"), FieldValue::Byte(255));
        assert_eq!(value("1=bool:true"), FieldValue::Bool(true));
        assert_eq!(value("1=f64:1.5"), FieldValue::Double(1.5));
    }

    #[test]
    fn strings_keep_colons_and_empty_values() {
        assert_eq!(value("3=str:a:b"), FieldValue::string("a:b"));
        assert_eq!(value("3=str:"), FieldValue::string(""));
        assert_eq!(value("3=str"), FieldValue::String(None));
    }

    #[test]
    fn binary_types() {
        assert_eq!(value("4=hex:00ff"), FieldValue::binary(vec![0x00, 0xFF]));
        assert_eq!(value("4=longhex:"), FieldValue::LongBinary(Some(Vec::new())));
        assert_eq!(value("4=hex"), FieldValue::Binary(None));
    }

    #[test]
    fn time_values_are_millis() {
        assert_eq!(value("5=time:1970-01-01T00:00:01.250Z"), FieldValue::DateTime(1250));
    }

    #[test]
    fn rejects_malformed_arguments() {
        let table = [
            "no-equals",
            "x=i32:1",
            "4096=i32:1",
            "1=i32",
            "1=i16:70000",
            "1=bool:yes",
            "1=hex:zz",
            "1=blob:00",
        ];
        for arg in table {
            assert!(parse_field(arg).is_err(), "{arg} should be rejected");
        }
    }

    #[test]
    fn formatted_values_parse_back() {
        let values = [
            FieldValue::Int16(-2),
            FieldValue::Int32(70_000),
            FieldValue::Byte(9),
            FieldValue::Bool(false),
            FieldValue::string("hi"),
            FieldValue::String(None),
            FieldValue::binary(vec![1, 2]),
            FieldValue::LongBinary(None),
            FieldValue::DateTime(1_700_000_000_123),
        ];
        for v in values {
            let arg = format!("7={}", format_value(&v));
            assert_eq!(value(&arg), v, "{arg}");
        }
    }

    #[test]
    fn message_summary() {
        let message = Message::new(ProtocolVersion::V4, 3, 8)
            .with_field(1, FieldValue::Int32(1))
            .with_field(2, FieldValue::string("x"))
            .with_compression(true);
        assert_eq!(format_message(&message), "v4 app=3 msg=8 (deflate) 1=i32:1 2=str:x");
    }
}

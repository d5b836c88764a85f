use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};
use crate::ids::RecordId;

/// Declared type of an entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DataType {
    Number,
    Text,
    Date,
    Item,
    Connection,
}

impl DataType {
    /// Tag used in the archive wire form.
    pub fn tag(self) -> &'static str {
        match self {
            DataType::Number => "number",
            DataType::Text => "text",
            DataType::Date => "date",
            DataType::Item => "item",
            DataType::Connection => "connection",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "number" => Ok(DataType::Number),
            "text" => Ok(DataType::Text),
            "date" => Ok(DataType::Date),
            "item" => Ok(DataType::Item),
            "connection" => Ok(DataType::Connection),
            other => Err(Error::UnknownDataType(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Literal or item-reference payload of an entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    Item(RecordId),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Number(_) => DataType::Number,
            Value::Text(_) => DataType::Text,
            Value::Date(_) => DataType::Date,
            Value::Item(_) => DataType::Item,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<RecordId> {
        match self {
            Value::Item(id) => Some(*id),
            _ => None,
        }
    }

    /// Wire encoding selected by the value's own type.
    pub fn encode(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Text(text) => escape_text(text),
            Value::Date(date) => date.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Item(id) => id.to_string(),
        }
    }

    /// Inverse of [`Value::encode`] for a declared type.
    pub fn decode(data_type: DataType, raw: &str) -> Result<Self> {
        match data_type {
            DataType::Number => raw
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|err| Error::InvalidArchive(format!("bad number `{raw}`: {err}"))),
            DataType::Text => unescape_text(raw).map(Value::Text),
            DataType::Date => DateTime::parse_from_rfc3339(raw)
                .map(|date| Value::Date(date.with_timezone(&Utc)))
                .map_err(|err| Error::InvalidArchive(format!("bad date `{raw}`: {err}"))),
            DataType::Item => RecordId::parse(raw).map(Value::Item),
            DataType::Connection => Err(Error::InvalidArchive(
                "connection entries carry no literal value".into(),
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(text) => f.write_str(text),
            Value::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Value::Item(id) => write!(f, "{id}"),
        }
    }
}

/// Percent-escape `%`, ASCII control characters and every non-ASCII byte.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte == b'%' || byte.is_ascii_control() || !byte.is_ascii() {
            out.push_str(&format!("%{byte:02X}"));
        } else {
            out.push(byte as char);
        }
    }
    out
}

pub fn unescape_text(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .ok_or_else(|| Error::InvalidArchive(format!("truncated escape in `{raw}`")))?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::InvalidArchive(format!("bad escape `%{hex}` in `{raw}`")));
            }
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| Error::InvalidArchive(format!("bad escape `%{hex}` in `{raw}`")))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|err| Error::InvalidArchive(format!("escaped text is not UTF-8: {err}")))
}

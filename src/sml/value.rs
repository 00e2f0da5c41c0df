use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::obis::Obis;

/// The universal representation of every field exchanged over the wire.
///
/// Decoded messages are trees of `SmlValue`, the `Tree` variant holding the
/// ordered elements of an SML list.
#[derive(Debug, Clone, PartialEq)]
pub enum SmlValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    OctetString(Vec<u8>),
    String(String),
    Time(DateTime<Utc>),
    Tree(Vec<SmlValue>),
}

impl SmlValue {
    /// Short name of the variant, used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            SmlValue::Null => "null",
            SmlValue::Bool(_) => "bool",
            SmlValue::Int8(_) => "i8",
            SmlValue::Int16(_) => "i16",
            SmlValue::Int32(_) => "i32",
            SmlValue::Int64(_) => "i64",
            SmlValue::UInt8(_) => "u8",
            SmlValue::UInt16(_) => "u16",
            SmlValue::UInt32(_) => "u32",
            SmlValue::UInt64(_) => "u64",
            SmlValue::OctetString(_) => "octet string",
            SmlValue::String(_) => "string",
            SmlValue::Time(_) => "time",
            SmlValue::Tree(_) => "tree",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SmlValue::Null)
    }

    /// Value of any unsigned integer variant.
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            SmlValue::UInt8(u) => Some(*u as u64),
            SmlValue::UInt16(u) => Some(*u as u64),
            SmlValue::UInt32(u) => Some(*u as u64),
            SmlValue::UInt64(u) => Some(*u),
            _ => None,
        }
    }

    /// Value of any signed integer variant.
    pub fn as_signed(&self) -> Option<i64> {
        match self {
            SmlValue::Int8(i) => Some(*i as i64),
            SmlValue::Int16(i) => Some(*i as i64),
            SmlValue::Int32(i) => Some(*i as i64),
            SmlValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Value of any integer variant, signed or not.
    pub fn as_integer(&self) -> Option<i128> {
        self.as_signed()
            .map(i128::from)
            .or_else(|| self.as_unsigned().map(i128::from))
    }

    pub fn as_octets(&self) -> Option<&[u8]> {
        match self {
            SmlValue::OctetString(bytes) => Some(bytes),
            SmlValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&[SmlValue]> {
        match self {
            SmlValue::Tree(items) => Some(items),
            _ => None,
        }
    }

    /// Printable ASCII octets become a `String`, anything else stays an octet string.
    pub fn text_or_octets(bytes: &[u8]) -> SmlValue {
        if !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            // all bytes are ASCII, so this is lossless
            SmlValue::String(String::from_utf8_lossy(bytes).into_owned())
        } else {
            SmlValue::OctetString(bytes.to_vec())
        }
    }
}

impl fmt::Display for SmlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmlValue::Null => f.write_str("null"),
            SmlValue::Bool(b) => write!(f, "{}", b),
            SmlValue::Int8(i) => write!(f, "{}", i),
            SmlValue::Int16(i) => write!(f, "{}", i),
            SmlValue::Int32(i) => write!(f, "{}", i),
            SmlValue::Int64(i) => write!(f, "{}", i),
            SmlValue::UInt8(u) => write!(f, "{}", u),
            SmlValue::UInt16(u) => write!(f, "{}", u),
            SmlValue::UInt32(u) => write!(f, "{}", u),
            SmlValue::UInt64(u) => write!(f, "{}", u),
            SmlValue::OctetString(bytes) => f.write_str(&hex::encode(bytes)),
            SmlValue::String(s) => f.write_str(s),
            SmlValue::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            SmlValue::Tree(items) => {
                let formatted: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", formatted.join(", "))
            }
        }
    }
}

impl Serialize for SmlValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SmlValue::Null => serializer.serialize_unit(),
            SmlValue::Bool(b) => serializer.serialize_bool(*b),
            SmlValue::Int8(i) => serializer.serialize_i8(*i),
            SmlValue::Int16(i) => serializer.serialize_i16(*i),
            SmlValue::Int32(i) => serializer.serialize_i32(*i),
            SmlValue::Int64(i) => serializer.serialize_i64(*i),
            SmlValue::UInt8(u) => serializer.serialize_u8(*u),
            SmlValue::UInt16(u) => serializer.serialize_u16(*u),
            SmlValue::UInt32(u) => serializer.serialize_u32(*u),
            SmlValue::UInt64(u) => serializer.serialize_u64(*u),
            SmlValue::OctetString(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            SmlValue::String(s) => serializer.serialize_str(s),
            SmlValue::Time(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            SmlValue::Tree(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

macro_rules! impl_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for SmlValue {
            fn from(v: $t) -> Self {
                SmlValue::$variant(v)
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(i8, Int8);
impl_from!(i16, Int16);
impl_from!(i32, Int32);
impl_from!(i64, Int64);
impl_from!(u8, UInt8);
impl_from!(u16, UInt16);
impl_from!(u32, UInt32);
impl_from!(u64, UInt64);
impl_from!(Vec<u8>, OctetString);
impl_from!(String, String);
impl_from!(DateTime<Utc>, Time);
impl_from!(Vec<SmlValue>, Tree);

impl From<&[u8]> for SmlValue {
    fn from(v: &[u8]) -> Self {
        SmlValue::OctetString(v.to_vec())
    }
}

impl From<&str> for SmlValue {
    fn from(v: &str) -> Self {
        SmlValue::String(v.to_string())
    }
}

impl From<Obis> for SmlValue {
    fn from(code: Obis) -> Self {
        SmlValue::OctetString(code.to_buffer().to_vec())
    }
}

impl<T: Into<SmlValue>> From<Option<T>> for SmlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SmlValue::Null)
    }
}

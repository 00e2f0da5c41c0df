use log::debug;

use super::boxing::crc16;
use super::generator::time_tree;
use super::{SmlError, SmlValue};

const TYPE_OCTET_STRING: u8 = 0x00;
const TYPE_BOOL: u8 = 0x40;
const TYPE_SIGNED: u8 = 0x50;
const TYPE_UNSIGNED: u8 = 0x60;
const TYPE_LIST: u8 = 0x70;

/// Write a TL field. `len` is the payload length, or the element count for lists.
fn write_type_length(out: &mut Vec<u8>, kind: u8, len: usize) {
    let mut tl_bytes = 1;
    let total = loop {
        let total = if kind == TYPE_LIST { len } else { len + tl_bytes };
        if total < 1usize << (4 * tl_bytes) {
            break total;
        }
        tl_bytes += 1;
    };

    for i in 0..tl_bytes {
        let nibble = ((total >> (4 * (tl_bytes - 1 - i))) & 0x0F) as u8;
        let more = if i + 1 < tl_bytes { 0x80 } else { 0x00 };
        let kind = if i == 0 { kind } else { 0x00 };
        out.push(more | kind | nibble);
    }
}

fn write_octets(out: &mut Vec<u8>, bytes: &[u8]) {
    write_type_length(out, TYPE_OCTET_STRING, bytes.len());
    out.extend_from_slice(bytes);
}

/// Append the encoding of `value`.
///
/// Integers keep the width of their variant. Strings are written as octet
/// strings, times as the SML_Time timestamp choice.
pub fn serialize_value(value: &SmlValue, out: &mut Vec<u8>) {
    match value {
        SmlValue::Null => out.push(0x01),
        SmlValue::Bool(b) => out.extend_from_slice(&[TYPE_BOOL | 2, *b as u8]),
        SmlValue::Int8(i) => {
            out.push(TYPE_SIGNED | 2);
            out.extend_from_slice(&i.to_be_bytes());
        }
        SmlValue::Int16(i) => {
            out.push(TYPE_SIGNED | 3);
            out.extend_from_slice(&i.to_be_bytes());
        }
        SmlValue::Int32(i) => {
            out.push(TYPE_SIGNED | 5);
            out.extend_from_slice(&i.to_be_bytes());
        }
        SmlValue::Int64(i) => {
            out.push(TYPE_SIGNED | 9);
            out.extend_from_slice(&i.to_be_bytes());
        }
        SmlValue::UInt8(u) => {
            out.push(TYPE_UNSIGNED | 2);
            out.extend_from_slice(&u.to_be_bytes());
        }
        SmlValue::UInt16(u) => {
            out.push(TYPE_UNSIGNED | 3);
            out.extend_from_slice(&u.to_be_bytes());
        }
        SmlValue::UInt32(u) => {
            out.push(TYPE_UNSIGNED | 5);
            out.extend_from_slice(&u.to_be_bytes());
        }
        SmlValue::UInt64(u) => {
            out.push(TYPE_UNSIGNED | 9);
            out.extend_from_slice(&u.to_be_bytes());
        }
        SmlValue::OctetString(bytes) => write_octets(out, bytes),
        SmlValue::String(s) => write_octets(out, s.as_bytes()),
        SmlValue::Time(at) => serialize_value(&time_tree(*at), out),
        SmlValue::Tree(items) => {
            write_type_length(out, TYPE_LIST, items.len());
            for item in items {
                serialize_value(item, out);
            }
        }
    }
}

/// Encode one SML_Message tree, computing the CRC and end of message marker.
///
/// Elements 4 and 5 of the tree (CRC, end marker) are ignored and rewritten.
pub fn serialize_message(message: &SmlValue) -> Result<Vec<u8>, SmlError> {
    let fields = message.as_tree().ok_or(SmlError::TypeMismatch {
        context: "SML_Message",
        expected: "tree",
        actual: message.type_name(),
    })?;
    if fields.len() != 6 {
        return Err(SmlError::Arity { context: "SML_Message", expected: 6, actual: fields.len() });
    }

    let mut out = Vec::new();
    write_type_length(&mut out, TYPE_LIST, 6);
    for field in &fields[..4] {
        serialize_value(field, &mut out);
    }

    let crc = crc16(&out);
    out.push(TYPE_UNSIGNED | 3);
    out.extend_from_slice(&crc.to_be_bytes());
    out.push(0x00);
    Ok(out)
}

pub fn serialize_messages(messages: &[SmlValue]) -> Result<Vec<u8>, SmlError> {
    let mut out = Vec::new();
    for message in messages {
        out.extend(serialize_message(message)?);
    }
    debug!("Serialized {} SML messages into {} bytes", messages.len(), out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sml::parser::{parse_messages, parse_value};
    use crate::sml::ResponseGenerator;

    fn encode(value: &SmlValue) -> Vec<u8> {
        let mut out = Vec::new();
        serialize_value(value, &mut out);
        out
    }

    #[test]
    fn test_fixed_widths() {
        assert_eq!(encode(&SmlValue::Null), vec![0x01]);
        assert_eq!(encode(&SmlValue::Bool(true)), vec![0x42, 0x01]);
        assert_eq!(encode(&SmlValue::Int8(-1)), vec![0x52, 0xFF]);
        assert_eq!(encode(&SmlValue::Int16(-200)), vec![0x53, 0xFF, 0x38]);
        assert_eq!(encode(&SmlValue::Int32(1))[0], 0x55);
        assert_eq!(encode(&SmlValue::Int64(1))[0], 0x59);
        assert_eq!(encode(&SmlValue::UInt8(30)), vec![0x62, 0x1E]);
        assert_eq!(encode(&SmlValue::UInt16(0x0701)), vec![0x63, 0x07, 0x01]);
        assert_eq!(encode(&SmlValue::UInt32(1))[0], 0x65);
        assert_eq!(encode(&SmlValue::UInt64(1))[0], 0x69);
        assert_eq!(encode(&SmlValue::from("AB")), vec![0x03, 0x41, 0x42]);
    }

    #[test]
    fn test_multi_byte_tl() {
        let payload = vec![0xCD; 20];
        let bytes = encode(&SmlValue::OctetString(payload.clone()));
        /* 20 payload bytes + 2 TL bytes = 0x16 */
        assert_eq!(&bytes[..2], &[0x81, 0x06]);
        assert_eq!(parse_value(&bytes).unwrap(), SmlValue::OctetString(payload));

        /* 14 payload bytes + 1 TL byte still fits in one nibble */
        assert_eq!(encode(&SmlValue::OctetString(vec![0; 14]))[0], 0x0F);
        /* 15 + 1 does not */
        assert_eq!(&encode(&SmlValue::OctetString(vec![0; 15]))[..2], &[0x81, 0x01]);

        let items = vec![SmlValue::Null; 16];
        assert_eq!(&encode(&SmlValue::Tree(items))[..2], &[0xF1, 0x00]);
    }

    #[test]
    fn test_nested_value_decodes() {
        let value = SmlValue::Tree(vec![
            SmlValue::OctetString(vec![1, 0, 1, 8, 0, 255]),
            SmlValue::Tree(vec![SmlValue::Int32(-5), SmlValue::Bool(false)]),
            SmlValue::Null,
        ]);
        assert_eq!(parse_value(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn test_message_crc() {
        let mut generator = ResponseGenerator::default();
        let msg = generator.close_response(b"1", None);
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(bytes[0], 0x76);
        assert_eq!(*bytes.last().unwrap(), 0x00);

        let parsed = parse_messages(&bytes, true).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].as_tree().unwrap()[..4], msg.as_tree().unwrap()[..4]);

        let mut corrupted = bytes.clone();
        corrupted[2] ^= 0x01;
        assert!(matches!(parse_messages(&corrupted, true), Err(SmlError::CrcMismatch { .. })));
        assert!(parse_messages(&corrupted, false).is_ok());
    }

    #[test]
    fn test_message_arity() {
        assert_eq!(
            serialize_message(&SmlValue::Tree(vec![SmlValue::Null])).unwrap_err(),
            SmlError::Arity { context: "SML_Message", expected: 6, actual: 1 }
        );
    }
}

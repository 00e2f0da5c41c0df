//! SML type-length decoding into [`SmlValue`] trees.
//!
//! Every element starts with a TL field: bit 7 "another TL byte follows",
//! bits 6..4 the type, bits 3..0 the length nibble. For scalars the length
//! counts the TL bytes too, for lists it is the number of elements.

use log::{debug, warn};

use super::boxing::crc16;
use super::{SmlError, SmlValue};

const TYPE_OCTET_STRING: u8 = 0;
const TYPE_BOOL: u8 = 4;
const TYPE_SIGNED: u8 = 5;
const TYPE_UNSIGNED: u8 = 6;
const TYPE_LIST: u8 = 7;

/// Optional element not present.
const OPTIONAL_ABSENT: u8 = 0x01;
const END_OF_MESSAGE: u8 = 0x00;

/* messages never nest this deep, anything beyond is garbage */
const MAX_NESTING: usize = 128;

pub struct SmlParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SmlParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn next_byte(&mut self) -> Result<u8, SmlError> {
        let byte = *self.data.get(self.pos).ok_or(SmlError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SmlError> {
        let end = self.pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(SmlError::UnexpectedEnd(self.data.len()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Returns the type and the payload length (element count for lists).
    fn parse_type_length(&mut self) -> Result<(u8, usize), SmlError> {
        let offset = self.pos;
        let first = self.next_byte()?;
        let kind = (first >> 4) & 0x07;
        let mut length = (first & 0x0F) as usize;
        let mut more = first & 0x80 != 0;
        let mut tl_bytes = 1;

        while more {
            let byte = self.next_byte()?;
            if byte & 0x70 != 0 || length > usize::MAX >> 4 {
                return Err(SmlError::InvalidTypeLength { tl: byte, offset: self.pos - 1 });
            }
            length = (length << 4) | (byte & 0x0F) as usize;
            more = byte & 0x80 != 0;
            tl_bytes += 1;
        }

        if kind != TYPE_LIST {
            if length < tl_bytes {
                return Err(SmlError::InvalidTypeLength { tl: first, offset });
            }
            length -= tl_bytes;
        }
        Ok((kind, length))
    }

    pub fn parse_value(&mut self) -> Result<SmlValue, SmlError> {
        self.parse_nested(0)
    }

    fn parse_nested(&mut self, depth: usize) -> Result<SmlValue, SmlError> {
        if depth > MAX_NESTING {
            return Err(SmlError::Framing(format!("nesting deeper than {}", MAX_NESTING)));
        }
        if self.data.get(self.pos) == Some(&OPTIONAL_ABSENT) {
            self.pos += 1;
            return Ok(SmlValue::Null);
        }

        let offset = self.pos;
        let first = *self.data.get(offset).ok_or(SmlError::UnexpectedEnd(offset))?;
        let (kind, length) = self.parse_type_length()?;

        match kind {
            TYPE_OCTET_STRING => Ok(SmlValue::OctetString(self.take(length)?.to_vec())),
            TYPE_BOOL if length == 1 => Ok(SmlValue::Bool(self.next_byte()? != 0)),
            TYPE_SIGNED if (1..=8).contains(&length) => {
                let bytes = self.take(length)?;
                /* sign extend from the first payload byte */
                let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
                for b in bytes {
                    value = (value << 8) | *b as i64;
                }
                Ok(match length {
                    1 => SmlValue::Int8(value as i8),
                    2 => SmlValue::Int16(value as i16),
                    3 | 4 => SmlValue::Int32(value as i32),
                    _ => SmlValue::Int64(value),
                })
            }
            TYPE_UNSIGNED if (1..=8).contains(&length) => {
                let bytes = self.take(length)?;
                let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
                Ok(match length {
                    1 => SmlValue::UInt8(value as u8),
                    2 => SmlValue::UInt16(value as u16),
                    3 | 4 => SmlValue::UInt32(value as u32),
                    _ => SmlValue::UInt64(value),
                })
            }
            TYPE_LIST => {
                let mut items = Vec::with_capacity(length.min(64));
                for _ in 0..length {
                    items.push(self.parse_nested(depth + 1)?);
                }
                Ok(SmlValue::Tree(items))
            }
            _ => Err(SmlError::InvalidTypeLength { tl: first, offset }),
        }
    }

    /// Parse one SML_Message and check its CRC.
    ///
    /// The returned tree has the layout the reader expects, with the CRC as
    /// `UInt16` and `Null` in place of the end of message marker.
    pub fn parse_message(&mut self, verify_crc: bool) -> Result<SmlValue, SmlError> {
        let start = self.pos;
        let (kind, length) = self.parse_type_length()?;
        if kind != TYPE_LIST || length != 6 {
            return Err(SmlError::Arity { context: "SML_Message", expected: 6, actual: length });
        }

        let mut fields = Vec::with_capacity(6);
        for _ in 0..4 {
            fields.push(self.parse_nested(1)?);
        }

        let crc_start = self.pos;
        let received = match self.parse_value()?.as_unsigned() {
            Some(crc) if crc <= u16::MAX as u64 => crc as u16,
            _ => return Err(SmlError::Framing(format!("invalid message CRC field at offset {}", crc_start))),
        };
        let computed = crc16(&self.data[start..crc_start]);
        if received != computed {
            if verify_crc {
                return Err(SmlError::CrcMismatch { received, computed });
            }
            warn!("Ignoring message CRC mismatch 0x{:04x} != 0x{:04x}", received, computed);
        }

        if self.next_byte()? != END_OF_MESSAGE {
            return Err(SmlError::Framing(format!("missing end of message at offset {}", self.pos - 1)));
        }

        fields.push(SmlValue::UInt16(received));
        fields.push(SmlValue::Null);
        Ok(SmlValue::Tree(fields))
    }
}

/// Split an SML file body into its messages. Trailing zero padding is skipped.
pub fn parse_messages(data: &[u8], verify_crc: bool) -> Result<Vec<SmlValue>, SmlError> {
    let mut parser = SmlParser::new(data);
    let mut messages = Vec::new();

    while !parser.is_at_end() {
        if data[parser.position()] == 0x00 {
            parser.pos += 1;
            continue;
        }
        messages.push(parser.parse_message(verify_crc)?);
    }

    debug!("Parsed {} SML messages from {} bytes", messages.len(), data.len());
    Ok(messages)
}

/// Decode a single value.
pub fn parse_value(data: &[u8]) -> Result<SmlValue, SmlError> {
    SmlParser::new(data).parse_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_value(&[0x01]).unwrap(), SmlValue::Null);
        assert_eq!(parse_value(&[0x42, 0x01]).unwrap(), SmlValue::Bool(true));
        assert_eq!(parse_value(&[0x52, 0xFF]).unwrap(), SmlValue::Int8(-1));
        assert_eq!(parse_value(&[0x53, 0xFF, 0x38]).unwrap(), SmlValue::Int16(-200));
        assert_eq!(parse_value(&[0x62, 0x1E]).unwrap(), SmlValue::UInt8(30));
        assert_eq!(parse_value(&[0x63, 0x07, 0x01]).unwrap(), SmlValue::UInt16(0x0701));
        assert_eq!(parse_value(&[0x65, 0x00, 0x00, 0x01, 0x01]).unwrap(), SmlValue::UInt32(0x0101));
        assert_eq!(parse_value(&[0x04, 0x41, 0x42, 0x43]).unwrap(), SmlValue::OctetString(b"ABC".to_vec()));
    }

    #[test]
    fn test_odd_width_integers() {
        assert_eq!(parse_value(&[0x64, 0x01, 0x02, 0x03]).unwrap(), SmlValue::UInt32(0x010203));
        assert_eq!(parse_value(&[0x54, 0xFF, 0xFF, 0xFE]).unwrap(), SmlValue::Int32(-2));
        assert_eq!(
            parse_value(&[0x56, 0x80, 0x00, 0x00, 0x00, 0x00]).unwrap(),
            SmlValue::Int64(-(1i64 << 39))
        );
    }

    #[test]
    fn test_list() {
        let value = parse_value(&[0x72, 0x62, 0x01, 0x01]).unwrap();
        assert_eq!(value, SmlValue::Tree(vec![SmlValue::UInt8(1), SmlValue::Null]));
    }

    #[test]
    fn test_multi_byte_tl() {
        /* 17 bytes payload + 2 TL bytes = 0x13 */
        let mut data = vec![0x81, 0x03];
        data.extend([0xAB; 17]);
        assert_eq!(parse_value(&data).unwrap(), SmlValue::OctetString(vec![0xAB; 17]));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_value(&[]).unwrap_err(), SmlError::UnexpectedEnd(0));
        assert_eq!(parse_value(&[0x63, 0x07]).unwrap_err(), SmlError::UnexpectedEnd(2));
        assert_eq!(
            parse_value(&[0x00]).unwrap_err(),
            SmlError::InvalidTypeLength { tl: 0x00, offset: 0 }
        );
        assert_eq!(
            parse_value(&[0x32, 0x00]).unwrap_err(),
            SmlError::InvalidTypeLength { tl: 0x32, offset: 0 }
        );
        assert_eq!(
            parse_value(&[0x81, 0x73]).unwrap_err(),
            SmlError::InvalidTypeLength { tl: 0x73, offset: 1 }
        );
    }

    #[test]
    fn test_huge_length_does_not_overflow() {
        let mut data = vec![0x71];
        data.extend([0x8F; 15]);
        data.push(0x0F);
        assert_eq!(parse_value(&data).unwrap_err(), SmlError::UnexpectedEnd(17));

        /* more length nibbles than fit into usize */
        let mut data = vec![0x8F; 17];
        data.push(0x0F);
        assert!(matches!(parse_value(&data), Err(SmlError::InvalidTypeLength { .. })));
    }

    #[test]
    fn test_nesting_limit() {
        let data = vec![0x71; MAX_NESTING + 2];
        assert!(matches!(parse_value(&data), Err(SmlError::Framing(_))));
    }
}

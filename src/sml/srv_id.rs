//! Classification and rendering of SML server/device identifiers.
//!
//! The meaning of an identifier is fixed by its length and a few marker
//! bytes, nothing is guessed from the content beyond that.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use super::SmlError;

pub const MBUS_WIRELESS: u8 = 0x01;
pub const MBUS_WIRED: u8 = 0x02;
pub const GATEWAY_MAC: u8 = 0x05;
pub const DKE_1: u8 = 0x06;
pub const DKE_2: u8 = 0x09;
pub const EON: u8 = 0x0A;

lazy_static! {
    static ref RE_MBUS: Regex = Regex::new(
        r"^([0-9a-fA-F]{2})-([0-9a-fA-F]{4})-([0-9a-fA-F]{8})-([0-9a-fA-F]{2})-([0-9a-fA-F]{2})$"
    )
    .unwrap();
    static ref RE_GROUPED: Regex =
        Regex::new(r"^([0-9a-fA-F]{2})-([0-9a-fA-F]{4})-([0-9a-fA-F]{8})-([0-9a-fA-F]{2})$").unwrap();
    static ref RE_GATEWAY: Regex = Regex::new(r"^[0-9a-fA-F]{2}(:[0-9a-fA-F]{2}){5}$").unwrap();
    static ref RE_SERIAL: Regex = Regex::new(r"^[0-9A-Z]{8}$").unwrap();
    static ref RE_HEX: Regex = Regex::new(r"^([0-9a-fA-F]{2})+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SrvIdKind {
    /// Wireless or wired M-Bus, 9 bytes.
    MBus,
    /// Eight ASCII characters `[0-9A-Z]`.
    Serial,
    /// Gateway MAC address with a one byte marker, 7 bytes.
    Gateway,
    VendorDke1,
    VendorDke2,
    Bcd,
    Eon,
    Other,
}

impl fmt::Display for SrvIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SrvIdKind::MBus => "M-Bus",
            SrvIdKind::Serial => "serial",
            SrvIdKind::Gateway => "gateway",
            SrvIdKind::VendorDke1 => "DKE-1",
            SrvIdKind::VendorDke2 => "DKE-2",
            SrvIdKind::Bcd => "BCD",
            SrvIdKind::Eon => "EON",
            SrvIdKind::Other => "other",
        };
        f.write_str(name)
    }
}

pub fn is_mbus_wireless(id: &[u8]) -> bool {
    id.len() == 9 && id[0] == MBUS_WIRELESS
}

pub fn is_mbus_wired(id: &[u8]) -> bool {
    id.len() == 9 && id[0] == MBUS_WIRED
}

fn is_serial(id: &[u8]) -> bool {
    id.len() == 8 && id.iter().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

fn is_bcd(id: &[u8]) -> bool {
    id.len() == 8 && id.iter().all(|b| (b >> 4) <= 9 && (b & 0x0F) <= 9)
}

pub fn classify(id: &[u8]) -> SrvIdKind {
    match id.len() {
        9 if is_mbus_wireless(id) || is_mbus_wired(id) => SrvIdKind::MBus,
        8 if is_serial(id) => SrvIdKind::Serial,
        7 if id[0] == GATEWAY_MAC => SrvIdKind::Gateway,
        10 if id[0] == DKE_1 => SrvIdKind::VendorDke1,
        10 if id[0] == DKE_2 => SrvIdKind::VendorDke2,
        10 if id[0] == EON => SrvIdKind::Eon,
        8 if is_bcd(id) => SrvIdKind::Bcd,
        _ => SrvIdKind::Other,
    }
}

/// Canonical text of an identifier.
///
/// * M-Bus: `MM-aaaa-ssssssss-vv-gg`, e.g. `01-e61e-13090016-3c-07`
/// * serial: the ASCII characters
/// * gateway: colon separated MAC without the marker byte
/// * BCD: the digits
/// * other 8 byte ids: `MM-aaaa-ssssssss-vv`
/// * everything else: plain lowercase hex
pub fn render(id: &[u8]) -> String {
    match classify(id) {
        SrvIdKind::MBus => format!(
            "{}-{}-{}-{}-{}",
            hex::encode(&id[0..1]),
            hex::encode(&id[1..3]),
            hex::encode(&id[3..7]),
            hex::encode(&id[7..8]),
            hex::encode(&id[8..9])
        ),
        SrvIdKind::Serial => String::from_utf8_lossy(id).into_owned(),
        SrvIdKind::Gateway => id[1..]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
        SrvIdKind::Bcd => hex::encode(id),
        SrvIdKind::Other if id.len() == 8 => format!(
            "{}-{}-{}-{}",
            hex::encode(&id[0..1]),
            hex::encode(&id[1..3]),
            hex::encode(&id[3..7]),
            hex::encode(&id[7..8])
        ),
        _ => hex::encode(id),
    }
}

/// Three letter M-Bus manufacturer (flag) code, e.g. `GWF`.
pub fn manufacturer(id: &[u8]) -> Option<String> {
    if classify(id) != SrvIdKind::MBus {
        return None;
    }
    let m = u16::from_le_bytes([id[1], id[2]]);
    [(m >> 10) & 0x1F, (m >> 5) & 0x1F, m & 0x1F]
        .into_iter()
        .map(|c| match c {
            1..=26 => Some((c as u8 + 64) as char),
            _ => None,
        })
        .collect()
}

fn decode_hex(text: &str) -> Result<Vec<u8>, SmlError> {
    hex::decode(text).map_err(|_| SmlError::Syntax(text.to_string()))
}

/// Raw bytes of an M-Bus rendering.
pub fn parse_mbus(text: &str) -> Result<Vec<u8>, SmlError> {
    let caps = RE_MBUS
        .captures(text.trim())
        .ok_or_else(|| SmlError::Syntax(text.to_string()))?;
    let joined: String = (1..=5).map(|i| &caps[i]).collect();
    let bytes = decode_hex(&joined)?;
    if is_mbus_wireless(&bytes) || is_mbus_wired(&bytes) {
        Ok(bytes)
    } else {
        Err(SmlError::Syntax(text.to_string()))
    }
}

/// The serial number part (`ssssssss`) of an M-Bus rendering.
pub fn mbus_serial(text: &str) -> Result<String, SmlError> {
    parse_mbus(text)?;
    RE_MBUS
        .captures(text.trim())
        .map(|caps| caps[3].to_lowercase())
        .ok_or_else(|| SmlError::Syntax(text.to_string()))
}

/// Raw bytes of a gateway rendering, the marker byte is restored.
pub fn parse_gateway(text: &str) -> Result<Vec<u8>, SmlError> {
    let text = text.trim();
    if !RE_GATEWAY.is_match(text) {
        return Err(SmlError::Syntax(text.to_string()));
    }
    let mut bytes = vec![GATEWAY_MAC];
    bytes.extend(decode_hex(&text.replace(':', ""))?);
    Ok(bytes)
}

pub fn parse_serial(text: &str) -> Result<Vec<u8>, SmlError> {
    let text = text.trim();
    if RE_SERIAL.is_match(text) {
        Ok(text.as_bytes().to_vec())
    } else {
        Err(SmlError::Syntax(text.to_string()))
    }
}

/// Recover the raw bytes from any text produced by [`render`].
///
/// Eight decimal digits are both a serial and the hex of a four byte id.
/// They are read as hex, use [`parse_serial`] for the serial.
pub fn from_text(text: &str) -> Result<Vec<u8>, SmlError> {
    let text = text.trim();
    let all_digits = text.bytes().all(|b| b.is_ascii_digit());
    parse_mbus(text)
        .or_else(|_| parse_gateway(text))
        .or_else(|e| if all_digits { Err(e) } else { parse_serial(text) })
        .or_else(|_| match RE_GROUPED.captures(text) {
            Some(caps) => decode_hex(&(1..=4).map(|i| &caps[i]).collect::<String>()),
            None => Err(SmlError::Syntax(text.to_string())),
        })
        .or_else(|_| {
            if RE_HEX.is_match(text) {
                decode_hex(text)
            } else {
                Err(SmlError::Syntax(text.to_string()))
            }
        })
}

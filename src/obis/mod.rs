//! OBIS object identifiers (IEC 62056-61).
//!
//! An identifier is always six bytes `A-B:C.D.E*F`:
//! A medium, B channel, C indicator, D mode, E quantity, F storage.
//! E and F use `0xFF` as "don't care".

use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};
use serde::{Serialize, Serializer};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use crate::sml::SmlError;

pub mod codes;

/// Value of E or F meaning "don't care".
pub const WILDCARD: u8 = 0xFF;

lazy_static! {
    static ref RE_MEDIUM_SEPARATED: Regex =
        Regex::new(r"^(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})([*&])(\d{1,3})$").unwrap();
    static ref RE_SHORT: Regex =
        Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:([*&])(\d{1,3}))?$").unwrap();
    static ref RE_LETTER: Regex =
        Regex::new(r"^([CFLP])\.(\d{1,3})\.(\d{1,3})(?:([*&])(\d{1,3}))?$").unwrap();
    static ref RE_FULL: Regex =
        Regex::new(r"^(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap();
    static ref RE_HEX: Regex = Regex::new(
        r"^([0-9A-Fa-f]{2})\s*([0-9A-Fa-f]{2})\s*([0-9A-Fa-f]{2})\s*([0-9A-Fa-f]{2})\s*([0-9A-Fa-f]{2})\s*([0-9A-Fa-f]{2})$"
    )
    .unwrap();
}

/// A six byte OBIS code.
///
/// Equality, ordering and hashing are lexicographic over the six bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Obis([u8; 6]);

impl Obis {
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Obis([a, b, c, d, e, f])
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Obis(bytes)
    }

    /// Parse any of the textual notations.
    ///
    /// Alternatives are tried in this order and the first match wins:
    /// the literal `F.F`, `A-B:C.D.E*F` / `A-B:C.D.E&F`, the short forms
    /// `C.D.E[*F|&F]` and `{C|F|L|P}.D.E[*F|&F]` (A and B are 0),
    /// `A-B:C.D.E` (F is 255) and finally six hex octets.
    pub fn parse_decimal(text: &str) -> Result<Self, SmlError> {
        Self::parse_decimal_with_reset(text).map(|(code, _)| code)
    }

    /// Like [`Obis::parse_decimal`], also reporting whether F was introduced by
    /// the `&` ("manually reset") separator instead of `*`.
    pub fn parse_decimal_with_reset(text: &str) -> Result<(Self, bool), SmlError> {
        let text = text.trim();
        let parsed = parse_sentinel(text)
            .or_else(|| parse_medium_separated(text))
            .or_else(|| parse_short(text))
            .or_else(|| parse_letter(text))
            .or_else(|| parse_full(text))
            .or_else(|| parse_hex(text));

        match parsed {
            Some(result) => Ok(result),
            None => {
                debug!("No OBIS notation matches {:?}", text);
                Err(SmlError::Syntax(text.to_string()))
            }
        }
    }

    pub fn to_buffer(&self) -> [u8; 6] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex, e.g. `0100010800ff`. Used as readout key.
    pub fn to_hex_string(&self) -> String {
        hex::encode(self.0)
    }

    /// Full notation `A-B:C.D.E*F`, lossless.
    pub fn to_decimal_string(&self) -> String {
        let [a, b, c, d, e, f] = self.0;
        format!("{}-{}:{}.{}.{}*{}", a, b, c, d, e, f)
    }

    /// Short notation `C.D.E*F`. A and B are dropped, re-parsing yields A = B = 0.
    pub fn to_short_string(&self) -> String {
        let [_, _, c, d, e, f] = self.0;
        format!("{}.{}.{}*{}", c, d, e, f)
    }

    pub fn medium(&self) -> u8 {
        self.0[0]
    }

    pub fn channel(&self) -> u8 {
        self.0[1]
    }

    pub fn indicator(&self) -> u8 {
        self.0[2]
    }

    pub fn mode(&self) -> u8 {
        self.0[3]
    }

    pub fn quantity(&self) -> u8 {
        self.0[4]
    }

    pub fn storage(&self) -> u8 {
        self.0[5]
    }

    /// All six bytes are zero.
    pub fn is_nil(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Indicator in the manufacturer specific range 128..=199.
    pub fn is_private(&self) -> bool {
        (128..200).contains(&self.indicator())
    }

    /// Compare the first four groups.
    pub fn is_matching(&self, a: u8, b: u8, c: u8, d: u8) -> bool {
        self.0[..4] == [a, b, c, d]
    }

    /// Compare the first five groups, returning F on a match.
    pub fn is_matching5(&self, a: u8, b: u8, c: u8, d: u8, e: u8) -> Option<u8> {
        if self.0[..5] == [a, b, c, d, e] {
            Some(self.storage())
        } else {
            None
        }
    }

    /// Prefix match against up to six bytes. Longer prefixes never match.
    pub fn matches_prefix(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }
}

fn group(caps: &Captures, idx: usize) -> Option<u8> {
    caps.get(idx)?.as_str().parse::<u8>().ok()
}

/* storage group and separator of the optional `*F` / `&F` suffix */
fn storage_suffix(caps: &Captures, sep: usize, value: usize) -> Option<(u8, bool)> {
    match caps.get(sep) {
        Some(s) => Some((group(caps, value)?, s.as_str() == "&")),
        None => Some((WILDCARD, false)),
    }
}

fn parse_sentinel(text: &str) -> Option<(Obis, bool)> {
    if text == "F.F" {
        Some((codes::OBIS_FF, false))
    } else {
        None
    }
}

fn parse_medium_separated(text: &str) -> Option<(Obis, bool)> {
    let caps = RE_MEDIUM_SEPARATED.captures(text)?;
    let code = Obis::new(
        group(&caps, 1)?,
        group(&caps, 2)?,
        group(&caps, 3)?,
        group(&caps, 4)?,
        group(&caps, 5)?,
        group(&caps, 7)?,
    );
    Some((code, &caps[6] == "&"))
}

fn parse_short(text: &str) -> Option<(Obis, bool)> {
    let caps = RE_SHORT.captures(text)?;
    let (f, reset) = storage_suffix(&caps, 4, 5)?;
    let code = Obis::new(0, 0, group(&caps, 1)?, group(&caps, 2)?, group(&caps, 3)?, f);
    Some((code, reset))
}

fn parse_letter(text: &str) -> Option<(Obis, bool)> {
    let caps = RE_LETTER.captures(text)?;
    let indicator = match &caps[1] {
        "C" => 96,
        "F" => 97,
        "L" => 98,
        "P" => 99,
        _ => return None,
    };
    let (f, reset) = storage_suffix(&caps, 4, 5)?;
    let code = Obis::new(0, 0, indicator, group(&caps, 2)?, group(&caps, 3)?, f);
    Some((code, reset))
}

fn parse_full(text: &str) -> Option<(Obis, bool)> {
    let caps = RE_FULL.captures(text)?;
    let code = Obis::new(
        group(&caps, 1)?,
        group(&caps, 2)?,
        group(&caps, 3)?,
        group(&caps, 4)?,
        group(&caps, 5)?,
        WILDCARD,
    );
    Some((code, false))
}

fn parse_hex(text: &str) -> Option<(Obis, bool)> {
    let caps = RE_HEX.captures(text)?;
    let mut bytes = [0u8; 6];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&caps[i + 1], 16).ok()?;
    }
    Some((Obis(bytes), false))
}

impl From<[u8; 6]> for Obis {
    fn from(bytes: [u8; 6]) -> Self {
        Obis(bytes)
    }
}

impl TryFrom<&[u8]> for Obis {
    type Error = SmlError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 6] = bytes
            .try_into()
            .map_err(|_| SmlError::InvalidLength(bytes.len()))?;
        Ok(Obis(bytes))
    }
}

impl FromStr for Obis {
    type Err = SmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Obis::parse_decimal(s)
    }
}

impl fmt::Display for Obis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl fmt::Debug for Obis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obis({})", self.to_decimal_string())
    }
}

impl Serialize for Obis {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

//! SML transport protocol version 1.
//!
//! `1b1b1b1b 01010101 <body> 1b1b1b1b 1a <pad> <crc>`, the body padded with
//! zeros to a multiple of four. A four byte aligned `1b1b1b1b` inside the
//! body is escaped by repeating it.

use crc16::{State, X_25};
use log::debug;

use super::{parser, serializer, SmlError, SmlValue};

const ESCAPE: [u8; 4] = [0x1B; 4];
const VERSION_1: [u8; 4] = [0x01; 4];
const END_MARK: u8 = 0x1A;

/// CRC16 X.25 in wire byte order, used for messages and the transport trailer.
pub(crate) fn crc16(data: &[u8]) -> u16 {
    State::<X_25>::calculate(data).swap_bytes()
}

/// Wrap an already serialized SML file body.
pub fn frame(body: &[u8]) -> Vec<u8> {
    let pad = (4 - body.len() % 4) % 4;
    let mut padded = body.to_vec();
    padded.resize(body.len() + pad, 0x00);

    let mut out = Vec::with_capacity(padded.len() + 16);
    out.extend_from_slice(&ESCAPE);
    out.extend_from_slice(&VERSION_1);
    for chunk in padded.chunks(4) {
        if chunk == ESCAPE {
            out.extend_from_slice(&ESCAPE);
        }
        out.extend_from_slice(chunk);
    }
    out.extend_from_slice(&ESCAPE);
    out.push(END_MARK);
    out.push(pad as u8);

    let crc = crc16(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// Serialize and frame a sequence of built messages.
pub fn boxing(messages: &[SmlValue]) -> Result<Vec<u8>, SmlError> {
    let body = serializer::serialize_messages(messages)?;
    Ok(frame(&body))
}

/// Strip the transport layer, returning the unescaped body without padding.
pub fn unbox(data: &[u8], verify_crc: bool) -> Result<Vec<u8>, SmlError> {
    let start = data
        .windows(8)
        .position(|w| w[..4] == ESCAPE && w[4..] == VERSION_1)
        .ok_or_else(|| SmlError::Framing("no start sequence".to_string()))?;
    if start > 0 {
        debug!("Skipping {} bytes before start sequence", start);
    }

    let mut body = Vec::with_capacity(data.len());
    let mut pos = start + 8;
    loop {
        let chunk = data
            .get(pos..pos + 4)
            .ok_or_else(|| SmlError::Framing(format!("truncated at offset {}", pos)))?;
        if chunk != ESCAPE {
            body.extend_from_slice(chunk);
            pos += 4;
            continue;
        }

        let next = data
            .get(pos + 4..pos + 8)
            .ok_or_else(|| SmlError::Framing(format!("truncated escape at offset {}", pos)))?;
        if next == ESCAPE {
            body.extend_from_slice(&ESCAPE);
            pos += 8;
            continue;
        }
        if next[0] != END_MARK {
            return Err(SmlError::Framing(format!("unexpected escape sequence {} at offset {}", hex::encode(next), pos)));
        }

        let pad = next[1] as usize;
        let received = u16::from_be_bytes([next[2], next[3]]);
        let computed = crc16(&data[start..pos + 6]);
        if verify_crc && received != computed {
            return Err(SmlError::CrcMismatch { received, computed });
        }
        if pad > 3 || pad > body.len() {
            return Err(SmlError::Framing(format!("invalid padding {}", pad)));
        }
        body.truncate(body.len() - pad);
        return Ok(body);
    }
}

/// Unbox and parse all messages of a transport frame.
pub fn unboxing(data: &[u8], verify_crc: bool) -> Result<Vec<SmlValue>, SmlError> {
    let body = unbox(data, verify_crc)?;
    parser::parse_messages(&body, verify_crc)
}

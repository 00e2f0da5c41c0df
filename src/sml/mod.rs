use serde::Serialize;
use std::convert::TryFrom;
use std::fmt;
use thiserror::Error;

pub mod value;
pub mod units;
pub mod srv_id;
pub mod readout;
pub mod reader;
pub mod generator;

#[cfg(feature = "wire")]
pub mod parser;
#[cfg(feature = "wire")]
pub mod serializer;
#[cfg(feature = "wire")]
pub mod boxing;

pub use value::SmlValue;
pub use readout::{Param, ParamMap, Readout};
pub use reader::Reader;
pub use generator::{child_list_tree, parameter_tree, RequestGenerator, ResponseGenerator, Trx};

/// Errors of the SML codec.
///
/// Every error is local to the message that caused it. A caller typically
/// drops the offending message and keeps the session alive.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmlError {
    #[error("invalid notation: {0:?}")]
    Syntax(String),
    #[error("invalid OBIS length {0}, expected 6 bytes")]
    InvalidLength(usize),
    #[error("{context}: expected {expected} elements, got {actual}")]
    Arity {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("unknown message choice 0x{0:08x}")]
    UnknownChoice(u32),
    #[error("message {0} is not interpreted by the reader")]
    UnsupportedMessage(MessageType),
    #[error("tree node {0} carries both a parameter value and a child list")]
    StructuralInvariant(String),

    #[error("unexpected end of data at offset {0}")]
    UnexpectedEnd(usize),
    #[error("invalid type-length field 0x{tl:02x} at offset {offset}")]
    InvalidTypeLength { tl: u8, offset: usize },
    #[error("CRC mismatch: received 0x{received:04x}, computed 0x{computed:04x}")]
    CrcMismatch { received: u16, computed: u16 },
    #[error("framing error: {0}")]
    Framing(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Choice tags of the SML message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum MessageType {
    OpenRequest = 0x0000_0100,
    OpenResponse = 0x0000_0101,
    CloseRequest = 0x0000_0200,
    CloseResponse = 0x0000_0201,
    GetProfilePackRequest = 0x0000_0300,
    GetProfilePackResponse = 0x0000_0301,
    GetProfileListRequest = 0x0000_0400,
    GetProfileListResponse = 0x0000_0401,
    GetProcParameterRequest = 0x0000_0500,
    GetProcParameterResponse = 0x0000_0501,
    SetProcParameterRequest = 0x0000_0600,
    SetProcParameterResponse = 0x0000_0601,
    GetListRequest = 0x0000_0700,
    GetListResponse = 0x0000_0701,
    AttentionResponse = 0x0000_FF01,
}

impl MessageType {
    /// Number of elements the message body tuple carries.
    pub fn arity(&self) -> usize {
        match self {
            MessageType::OpenRequest => 7,
            MessageType::OpenResponse => 6,
            MessageType::CloseRequest | MessageType::CloseResponse => 1,
            MessageType::GetProfilePackRequest => 9,
            MessageType::GetProfilePackResponse => 8,
            MessageType::GetProfileListRequest => 9,
            MessageType::GetProfileListResponse => 9,
            MessageType::GetProcParameterRequest => 5,
            MessageType::GetProcParameterResponse => 3,
            MessageType::SetProcParameterRequest => 5,
            MessageType::SetProcParameterResponse => 3,
            MessageType::GetListRequest => 5,
            MessageType::GetListResponse => 7,
            MessageType::AttentionResponse => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageType::OpenRequest => "OpenRequest",
            MessageType::OpenResponse => "OpenResponse",
            MessageType::CloseRequest => "CloseRequest",
            MessageType::CloseResponse => "CloseResponse",
            MessageType::GetProfilePackRequest => "GetProfilePackRequest",
            MessageType::GetProfilePackResponse => "GetProfilePackResponse",
            MessageType::GetProfileListRequest => "GetProfileListRequest",
            MessageType::GetProfileListResponse => "GetProfileListResponse",
            MessageType::GetProcParameterRequest => "GetProcParameterRequest",
            MessageType::GetProcParameterResponse => "GetProcParameterResponse",
            MessageType::SetProcParameterRequest => "SetProcParameterRequest",
            MessageType::SetProcParameterResponse => "SetProcParameterResponse",
            MessageType::GetListRequest => "GetListRequest",
            MessageType::GetListResponse => "GetListResponse",
            MessageType::AttentionResponse => "AttentionResponse",
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = SmlError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        Ok(match tag {
            0x0100 => MessageType::OpenRequest,
            0x0101 => MessageType::OpenResponse,
            0x0200 => MessageType::CloseRequest,
            0x0201 => MessageType::CloseResponse,
            0x0300 => MessageType::GetProfilePackRequest,
            0x0301 => MessageType::GetProfilePackResponse,
            0x0400 => MessageType::GetProfileListRequest,
            0x0401 => MessageType::GetProfileListResponse,
            0x0500 => MessageType::GetProcParameterRequest,
            0x0501 => MessageType::GetProcParameterResponse,
            0x0600 => MessageType::SetProcParameterRequest,
            0x0601 => MessageType::SetProcParameterResponse,
            0x0700 => MessageType::GetListRequest,
            0x0701 => MessageType::GetListResponse,
            0xFF01 => MessageType::AttentionResponse,
            other => return Err(SmlError::UnknownChoice(other)),
        })
    }
}

impl From<MessageType> for u32 {
    fn from(kind: MessageType) -> u32 {
        kind as u32
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_round_trip() {
        for tag in [0x0101u32, 0x0201, 0x0401, 0x0501, 0x0600, 0xFF01] {
            let kind = MessageType::try_from(tag).unwrap();
            assert_eq!(u32::from(kind), tag);
        }
    }

    #[test]
    fn test_unknown_choice() {
        assert_eq!(MessageType::try_from(0x0801), Err(SmlError::UnknownChoice(0x0801)));
    }

    #[test]
    fn test_error_messages() {
        let e = SmlError::Arity { context: "OpenResponse", expected: 6, actual: 4 };
        assert_eq!(e.to_string(), "OpenResponse: expected 6 elements, got 4");

        let e = SmlError::UnknownChoice(0x0999);
        assert_eq!(e.to_string(), "unknown message choice 0x00000999");
    }
}

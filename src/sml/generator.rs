use chrono::{DateTime, Utc};
use log::{debug, warn};
use uuid::Uuid;

use crate::config::GeneratorConfig;
use crate::obis::Obis;

use super::{MessageType, SmlValue};

/// Leaf node `[code, [1, value], -]`. Time values use the time choice `[4, time]`.
pub fn parameter_tree(code: Obis, value: SmlValue) -> SmlValue {
    let proc_par_value = match value {
        SmlValue::Time(at) => SmlValue::Tree(vec![SmlValue::UInt8(4), time_tree(at)]),
        other => SmlValue::Tree(vec![SmlValue::UInt8(1), other]),
    };
    SmlValue::Tree(vec![code.into(), proc_par_value, SmlValue::Null])
}

/// Inner node `[code, -, children]`.
pub fn child_list_tree(code: Obis, children: Vec<SmlValue>) -> SmlValue {
    SmlValue::Tree(vec![code.into(), SmlValue::Null, SmlValue::Tree(children)])
}

/// SML_Time timestamp choice `[2, seconds]`.
///
/// Times outside the `u32` range are clamped to 1970 or 2106.
pub fn time_tree(at: DateTime<Utc>) -> SmlValue {
    let timestamp = at.timestamp();
    let seconds = u32::try_from(timestamp.clamp(0, u32::MAX as i64)).unwrap_or(u32::MAX);
    if seconds as i64 != timestamp {
        warn!("Clamping time {} to SML timestamp {}", at, seconds);
    }
    SmlValue::Tree(vec![SmlValue::UInt8(2), SmlValue::UInt32(seconds)])
}

fn tree_path(code: Obis) -> SmlValue {
    SmlValue::Tree(vec![code.into()])
}

fn octets(bytes: &[u8]) -> SmlValue {
    SmlValue::OctetString(bytes.to_vec())
}

fn optional_octets(bytes: Option<&[u8]>) -> SmlValue {
    bytes.map(octets).unwrap_or(SmlValue::Null)
}

/// Transaction ids `<prefix>-<counter>`, unique per session.
#[derive(Debug, Clone)]
pub struct Trx {
    prefix: String,
    counter: u64,
}

impl Trx {
    pub fn new(prefix_len: usize) -> Self {
        let mut prefix = Uuid::new_v4().simple().to_string();
        prefix.truncate(prefix_len.clamp(1, 32));
        Trx { prefix, counter: 0 }
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Trx { prefix: prefix.to_string(), counter: 0 }
    }

    pub fn current(&self) -> String {
        format!("{}-{}", self.prefix, self.counter)
    }

    pub fn next(&mut self) -> String {
        self.counter += 1;
        self.current()
    }
}

/* SML_Message with a zero CRC placeholder, the serializer computes the real one */
fn build_message(trx: &[u8], group_no: u8, abort_on_error: u8, kind: MessageType, body: Vec<SmlValue>) -> SmlValue {
    debug!("Building {} for trx {}", kind, String::from_utf8_lossy(trx));
    SmlValue::Tree(vec![
        octets(trx),
        SmlValue::UInt8(group_no),
        SmlValue::UInt8(abort_on_error),
        SmlValue::Tree(vec![SmlValue::UInt32(kind.into()), SmlValue::Tree(body)]),
        SmlValue::UInt16(0),
        SmlValue::Null,
    ])
}

/// Builds the answers of a server. Every response echoes the transaction id
/// of the request it answers.
#[derive(Debug, Clone)]
pub struct ResponseGenerator {
    group_no: u8,
    abort_on_error: u8,
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        ResponseGenerator::new(&GeneratorConfig::default())
    }
}

impl ResponseGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        ResponseGenerator { group_no: 0, abort_on_error: config.abort_on_error }
    }

    /// Start a new SML file, the group number restarts at 0.
    pub fn reset(&mut self) {
        self.group_no = 0;
    }

    fn message(&mut self, trx: &[u8], kind: MessageType, body: Vec<SmlValue>) -> SmlValue {
        let msg = build_message(trx, self.group_no, self.abort_on_error, kind, body);
        self.group_no = self.group_no.wrapping_add(1);
        msg
    }

    #[allow(clippy::too_many_arguments)]
    pub fn open_response(
        &mut self,
        trx: &[u8],
        codepage: Option<&[u8]>,
        client_id: Option<&[u8]>,
        req_file_id: &[u8],
        server_id: &[u8],
        ref_time: Option<DateTime<Utc>>,
        sml_version: Option<u8>,
    ) -> SmlValue {
        self.reset();
        let body = vec![
            optional_octets(codepage),
            optional_octets(client_id),
            octets(req_file_id),
            octets(server_id),
            ref_time.map(time_tree).unwrap_or(SmlValue::Null),
            sml_version.into(),
        ];
        self.message(trx, MessageType::OpenResponse, body)
    }

    pub fn close_response(&mut self, trx: &[u8], signature: Option<&[u8]>) -> SmlValue {
        self.message(trx, MessageType::CloseResponse, vec![optional_octets(signature)])
    }

    /// `params` is the parameter tree, built from [`parameter_tree`] and
    /// [`child_list_tree`]; `code` becomes the single element tree path.
    pub fn get_proc_parameter_response(&mut self, trx: &[u8], server_id: &[u8], code: Obis, params: SmlValue) -> SmlValue {
        let body = vec![octets(server_id), tree_path(code), params];
        self.message(trx, MessageType::GetProcParameterResponse, body)
    }

    pub fn attention_response(&mut self, trx: &[u8], server_id: &[u8], code: Obis, msg: Option<&str>) -> SmlValue {
        let body = vec![
            octets(server_id),
            code.into(),
            msg.map(|m| octets(m.as_bytes())).unwrap_or(SmlValue::Null),
            SmlValue::Null,
        ];
        self.message(trx, MessageType::AttentionResponse, body)
    }
}

/// Builds the requests of a client. Transaction ids come from an own [`Trx`].
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    trx: Trx,
    group_no: u8,
    abort_on_error: u8,
    sml_version: u8,
    client_id: Vec<u8>,
}

impl RequestGenerator {
    pub fn new(config: &GeneratorConfig, client_id: &[u8]) -> Self {
        RequestGenerator {
            trx: Trx::new(config.trx_prefix_len),
            group_no: 0,
            abort_on_error: config.abort_on_error,
            sml_version: config.sml_version,
            client_id: client_id.to_vec(),
        }
    }

    /// Transaction id of the last built message.
    pub fn current_trx(&self) -> String {
        self.trx.current()
    }

    fn message(&mut self, kind: MessageType, body: Vec<SmlValue>) -> SmlValue {
        let trx = self.trx.next();
        let msg = build_message(trx.as_bytes(), self.group_no, self.abort_on_error, kind, body);
        self.group_no = self.group_no.wrapping_add(1);
        msg
    }

    pub fn open_request(
        &mut self,
        req_file_id: &[u8],
        server_id: Option<&[u8]>,
        user: Option<&str>,
        pwd: Option<&str>,
    ) -> SmlValue {
        self.group_no = 0;
        let body = vec![
            SmlValue::Null,
            octets(&self.client_id),
            octets(req_file_id),
            optional_octets(server_id),
            optional_octets(user.map(str::as_bytes)),
            optional_octets(pwd.map(str::as_bytes)),
            SmlValue::UInt8(self.sml_version),
        ];
        self.message(MessageType::OpenRequest, body)
    }

    pub fn close_request(&mut self) -> SmlValue {
        self.message(MessageType::CloseRequest, vec![SmlValue::Null])
    }

    pub fn get_proc_parameter_request(
        &mut self,
        server_id: &[u8],
        user: Option<&str>,
        pwd: Option<&str>,
        code: Obis,
    ) -> SmlValue {
        let body = vec![
            octets(server_id),
            optional_octets(user.map(str::as_bytes)),
            optional_octets(pwd.map(str::as_bytes)),
            tree_path(code),
            SmlValue::Null,
        ];
        self.message(MessageType::GetProcParameterRequest, body)
    }

    pub fn set_proc_parameter_request(
        &mut self,
        server_id: &[u8],
        user: Option<&str>,
        pwd: Option<&str>,
        code: Obis,
        params: SmlValue,
    ) -> SmlValue {
        let body = vec![
            octets(server_id),
            optional_octets(user.map(str::as_bytes)),
            optional_octets(pwd.map(str::as_bytes)),
            tree_path(code),
            params,
        ];
        self.message(MessageType::SetProcParameterRequest, body)
    }

    pub fn get_list_request(&mut self, server_id: &[u8], list_name: Option<Obis>) -> SmlValue {
        let body = vec![
            octets(&self.client_id),
            octets(server_id),
            SmlValue::Null,
            SmlValue::Null,
            list_name.into(),
        ];
        self.message(MessageType::GetListRequest, body)
    }
}

//! Interpretation of decoded SML message trees.
//!
//! The [`Reader`] walks one message at a time and fills a [`Readout`].
//! Every message kind has a fixed tuple layout; elements are addressed by
//! position, optional elements are `SmlValue::Null` when absent.
//!
//! Parameter trees (get/set proc parameter, attention details) are stored
//! as nested maps keyed by the hex rendering of each node's OBIS code, so a
//! leaf at path `[A, B, C]` ends up at `values[hex(A)][hex(B)][hex(C)]`.

use chrono::DateTime;
use log::{debug, warn};
use std::convert::TryFrom;

use crate::config::ReaderConfig;
use crate::obis::{codes, Obis};

use super::readout::{Param, ParamMap, Readout};
use super::units::{get_unit_name, scale_value};
use super::{srv_id, MessageType, SmlError, SmlValue};

/// Choice tags of SML_ProcParValue.
const PROC_PAR_VALUE: u64 = 1;
const PROC_PAR_PERIOD_ENTRY: u64 = 2;
const PROC_PAR_TUPEL_ENTRY: u64 = 3;
const PROC_PAR_TIME: u64 = 4;
const PROC_PAR_LIST_ENTRY: u64 = 5;

/// Choice tags of SML_Time.
const TIME_SEC_INDEX: u64 = 1;
const TIME_TIMESTAMP: u64 = 2;
const TIME_LOCAL_TIMESTAMP: u64 = 3;

const SML_TREE: &str = "SML_Tree";

fn expect_octets<'a>(value: &'a SmlValue, context: &'static str) -> Result<&'a [u8], SmlError> {
    value.as_octets().ok_or(SmlError::TypeMismatch {
        context,
        expected: "octet string",
        actual: value.type_name(),
    })
}

fn optional_octets<'a>(value: &'a SmlValue, context: &'static str) -> Result<Option<&'a [u8]>, SmlError> {
    match value {
        SmlValue::Null => Ok(None),
        other => expect_octets(other, context).map(Some),
    }
}

fn expect_unsigned(value: &SmlValue, context: &'static str) -> Result<u64, SmlError> {
    value.as_unsigned().ok_or(SmlError::TypeMismatch {
        context,
        expected: "unsigned",
        actual: value.type_name(),
    })
}

fn expect_scaler(value: &SmlValue, context: &'static str) -> Result<i8, SmlError> {
    value
        .as_integer()
        .and_then(|i| i8::try_from(i).ok())
        .ok_or(SmlError::TypeMismatch {
            context,
            expected: "i8",
            actual: value.type_name(),
        })
}

fn expect_unit(value: &SmlValue, context: &'static str) -> Result<u16, SmlError> {
    value
        .as_unsigned()
        .and_then(|u| u16::try_from(u).ok())
        .ok_or(SmlError::TypeMismatch {
            context,
            expected: "unit code",
            actual: value.type_name(),
        })
}

/// Convert an SML_Time choice.
///
/// Second indices stay a `UInt32`, timestamps become `SmlValue::Time` (UTC,
/// offsets of the local variant are not applied).
pub fn read_time(value: &SmlValue) -> Result<SmlValue, SmlError> {
    let choice = match value {
        SmlValue::Time(_) => return Ok(value.clone()),
        SmlValue::Tree(items) if items.len() == 2 => items,
        other => {
            return Err(SmlError::TypeMismatch {
                context: "SML_Time",
                expected: "tree",
                actual: other.type_name(),
            })
        }
    };

    let tag = expect_unsigned(&choice[0], "SML_Time.choice")?;
    let seconds = match tag {
        TIME_SEC_INDEX => {
            let idx = expect_unsigned(&choice[1], "SML_Time.secIndex")?;
            return u32::try_from(idx).map(SmlValue::UInt32).map_err(|_| SmlError::TypeMismatch {
                context: "SML_Time.secIndex",
                expected: "u32",
                actual: choice[1].type_name(),
            });
        }
        TIME_TIMESTAMP => expect_unsigned(&choice[1], "SML_Time.timestamp")?,
        TIME_LOCAL_TIMESTAMP => {
            let local = choice[1].as_tree().ok_or(SmlError::TypeMismatch {
                context: "SML_TimestampLocal",
                expected: "tree",
                actual: choice[1].type_name(),
            })?;
            if local.len() < 3 {
                return Err(SmlError::Arity { context: "SML_TimestampLocal", expected: 3, actual: local.len() });
            }
            expect_unsigned(&local[0], "SML_TimestampLocal.timestamp")?
        }
        other => return Err(SmlError::UnknownChoice(other as u32)),
    };

    DateTime::from_timestamp(seconds as i64, 0)
        .map(SmlValue::Time)
        .ok_or_else(|| SmlError::Syntax(format!("timestamp {}", seconds)))
}

/// The sequence of OBIS codes of an SML_TreePath.
pub fn read_param_tree_path(value: &SmlValue) -> Result<Vec<Obis>, SmlError> {
    let items = value.as_tree().ok_or(SmlError::TypeMismatch {
        context: "SML_TreePath",
        expected: "tree",
        actual: value.type_name(),
    })?;
    items
        .iter()
        .map(|item| Obis::try_from(expect_octets(item, "SML_TreePath")?))
        .collect()
}

pub struct Reader {
    readout: Readout,
    idx: usize,
    strict_arity: bool,
    render_ids: bool,
}

impl Default for Reader {
    fn default() -> Self {
        Reader::new(&ReaderConfig::default())
    }
}

impl Reader {
    pub fn new(config: &ReaderConfig) -> Self {
        Reader {
            readout: Readout::new(),
            idx: 0,
            strict_arity: config.strict_arity,
            render_ids: config.render_ids,
        }
    }

    pub fn readout(&self) -> &Readout {
        &self.readout
    }

    pub fn into_readout(self) -> Readout {
        self.readout
    }

    /// Read a complete SML_Message
    /// `[trx, groupNo, abortOnError, [choice, body], crc, endOfMsg]`.
    pub fn read_message(&mut self, message: &SmlValue) -> Result<&Readout, SmlError> {
        let fields = self.expect_tuple(message, 6, "SML_Message")?;
        self.next_readout();

        let trx = expect_octets(&fields[0], "SML_Message.transactionId")?;
        self.readout.set_trx(trx);
        let group_no = expect_unsigned(&fields[1], "SML_Message.groupNo")?;
        self.readout.set_value("groupNo", SmlValue::UInt64(group_no));
        let abort = expect_unsigned(&fields[2], "SML_Message.abortOnError")?;
        self.readout.set_value("abortOnError", SmlValue::UInt64(abort));

        let body = self.expect_tuple(&fields[3], 2, "SML_MessageBody")?;
        let choice = expect_unsigned(&body[0], "SML_MessageBody.choice")?;
        let choice = u32::try_from(choice).map_err(|_| SmlError::UnknownChoice(u32::MAX))?;
        self.dispatch(choice, &body[1])?;
        Ok(&self.readout)
    }

    /// Read a message body given its choice tag.
    pub fn read_body(&mut self, choice: u32, body: &SmlValue) -> Result<&Readout, SmlError> {
        self.next_readout();
        self.dispatch(choice, body)?;
        Ok(&self.readout)
    }

    fn next_readout(&mut self) {
        self.readout.reset(self.idx);
        self.idx += 1;
    }

    fn dispatch(&mut self, choice: u32, body: &SmlValue) -> Result<(), SmlError> {
        let kind = MessageType::try_from(choice)?;
        if matches!(kind, MessageType::GetProfilePackRequest | MessageType::GetProfilePackResponse) {
            warn!("{} is not interpreted", kind);
            return Err(SmlError::UnsupportedMessage(kind));
        }

        let fields = self.expect_tuple(body, kind.arity(), kind.name())?;
        debug!("Reading {} with {} elements", kind, fields.len());
        self.readout.message = Some(kind);

        match kind {
            MessageType::OpenRequest => self.read_open_request(fields),
            MessageType::OpenResponse => self.read_open_response(fields),
            MessageType::CloseRequest | MessageType::CloseResponse => self.read_close(fields),
            MessageType::GetProfileListRequest => self.read_get_profile_list_request(fields),
            MessageType::GetProfileListResponse => self.read_get_profile_list_response(fields),
            MessageType::GetProcParameterRequest => self.read_get_proc_parameter_request(fields),
            MessageType::GetProcParameterResponse | MessageType::SetProcParameterResponse => {
                self.read_get_proc_parameter_response(fields)
            }
            MessageType::SetProcParameterRequest => self.read_set_proc_parameter_request(fields),
            MessageType::GetListRequest => self.read_get_list_request(fields),
            MessageType::GetListResponse => self.read_get_list_response(fields),
            MessageType::AttentionResponse => self.read_attention_response(fields),
            MessageType::GetProfilePackRequest | MessageType::GetProfilePackResponse => {
                Err(SmlError::UnsupportedMessage(kind))
            }
        }
    }

    fn expect_tuple<'a>(
        &self,
        value: &'a SmlValue,
        arity: usize,
        context: &'static str,
    ) -> Result<&'a [SmlValue], SmlError> {
        let items = value.as_tree().ok_or(SmlError::TypeMismatch {
            context,
            expected: "tree",
            actual: value.type_name(),
        })?;

        if items.len() < arity || (self.strict_arity && items.len() > arity) {
            return Err(SmlError::Arity { context, expected: arity, actual: items.len() });
        }
        if items.len() > arity {
            warn!("{}: ignoring {} extra elements", context, items.len() - arity);
        }
        Ok(&items[..arity])
    }

    fn id_value(&self, id: &[u8]) -> SmlValue {
        if self.render_ids {
            SmlValue::String(srv_id::render(id))
        } else {
            SmlValue::OctetString(id.to_vec())
        }
    }

    fn set_server_id(&mut self, id: &[u8]) {
        self.readout.server_id = id.to_vec();
        let value = self.id_value(id);
        self.readout.set_value("serverId", value);
    }

    fn set_client_id(&mut self, id: &[u8]) {
        self.readout.client_id = id.to_vec();
        let value = self.id_value(id);
        self.readout.set_value("clientId", value);
    }

    fn set_optional_server_id(&mut self, value: &SmlValue, context: &'static str) -> Result<(), SmlError> {
        if let Some(id) = optional_octets(value, context)? {
            self.set_server_id(id);
        }
        Ok(())
    }

    fn set_optional_client_id(&mut self, value: &SmlValue, context: &'static str) -> Result<(), SmlError> {
        if let Some(id) = optional_octets(value, context)? {
            self.set_client_id(id);
        }
        Ok(())
    }

    /* absent optional fields are skipped, present ones stored as text when printable */
    fn set_optional_text(&mut self, key: &str, value: &SmlValue, context: &'static str) -> Result<(), SmlError> {
        match optional_octets(value, context)? {
            Some(bytes) => self.readout.set_value(key, SmlValue::text_or_octets(bytes)),
            None => debug!("{} not present", key),
        }
        Ok(())
    }

    fn set_optional_octets(&mut self, key: &str, value: &SmlValue, context: &'static str) -> Result<(), SmlError> {
        if let Some(bytes) = optional_octets(value, context)? {
            self.readout.set_value(key, SmlValue::OctetString(bytes.to_vec()));
        }
        Ok(())
    }

    fn set_optional_time(&mut self, key: &str, value: &SmlValue) -> Result<(), SmlError> {
        if !value.is_null() {
            let time = read_time(value)?;
            self.readout.set_value(key, time);
        }
        Ok(())
    }

    fn set_optional_unsigned(&mut self, key: &str, value: &SmlValue, context: &'static str) -> Result<(), SmlError> {
        if !value.is_null() {
            let u = expect_unsigned(value, context)?;
            self.readout.set_value(key, SmlValue::UInt64(u));
        }
        Ok(())
    }

    fn set_tree_path(&mut self, value: &SmlValue) -> Result<Vec<Obis>, SmlError> {
        let path = read_param_tree_path(value)?;
        let rendered: Vec<SmlValue> = path.iter().map(|code| SmlValue::from(*code)).collect();
        self.readout.set_value("parameterTreePath", SmlValue::Tree(rendered));
        Ok(path)
    }

    fn read_open_request(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        self.set_optional_text("codepage", &f[0], "OpenRequest.codepage")?;
        let client = expect_octets(&f[1], "OpenRequest.clientId")?;
        self.set_client_id(client);
        let file_id = expect_octets(&f[2], "OpenRequest.reqFileId")?;
        self.readout.set_value("reqFileId", SmlValue::text_or_octets(file_id));
        self.set_optional_server_id(&f[3], "OpenRequest.serverId")?;
        self.set_optional_text("userName", &f[4], "OpenRequest.username")?;
        self.set_optional_octets("password", &f[5], "OpenRequest.password")?;
        self.set_optional_unsigned("SMLVersion", &f[6], "OpenRequest.smlVersion")
    }

    fn read_open_response(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        self.set_optional_text("codepage", &f[0], "OpenResponse.codepage")?;
        self.set_optional_client_id(&f[1], "OpenResponse.clientId")?;
        let file_id = expect_octets(&f[2], "OpenResponse.reqFileId")?;
        self.readout.set_value("reqFileId", SmlValue::text_or_octets(file_id));
        let server = expect_octets(&f[3], "OpenResponse.serverId")?;
        self.set_server_id(server);
        self.set_optional_time("refTime", &f[4])?;
        self.set_optional_unsigned("SMLVersion", &f[5], "OpenResponse.smlVersion")
    }

    fn read_close(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        self.set_optional_octets("globalSignature", &f[0], "Close.globalSignature")
    }

    fn read_get_profile_list_request(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        self.set_optional_server_id(&f[0], "GetProfileListRequest.serverId")?;
        self.set_optional_text("userName", &f[1], "GetProfileListRequest.username")?;
        self.set_optional_octets("password", &f[2], "GetProfileListRequest.password")?;
        match &f[3] {
            SmlValue::Null => debug!("withRawdata not present"),
            SmlValue::Bool(raw) => self.readout.set_value("withRawdata", *raw),
            other => {
                return Err(SmlError::TypeMismatch {
                    context: "GetProfileListRequest.withRawdata",
                    expected: "bool",
                    actual: other.type_name(),
                })
            }
        }
        self.set_optional_time("beginTime", &f[4])?;
        self.set_optional_time("endTime", &f[5])?;
        self.set_tree_path(&f[6])?;
        match &f[7] {
            SmlValue::Null => debug!("objectList not present"),
            SmlValue::Tree(objects) => self.readout.set_value("objectList", SmlValue::Tree(objects.clone())),
            other => {
                return Err(SmlError::TypeMismatch {
                    context: "GetProfileListRequest.objectList",
                    expected: "tree",
                    actual: other.type_name(),
                })
            }
        }
        if !f[8].is_null() {
            self.read_param_tree(&["dasDetails".to_string()], &f[8])?;
        }
        Ok(())
    }

    fn read_get_profile_list_response(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        let server = expect_octets(&f[0], "GetProfileListResponse.serverId")?;
        self.set_server_id(server);
        self.set_optional_time("actTime", &f[1])?;
        let period = expect_unsigned(&f[2], "GetProfileListResponse.regPeriod")?;
        self.readout.set_value("regPeriod", SmlValue::UInt64(period));
        self.set_tree_path(&f[3])?;
        self.set_optional_time("valTime", &f[4])?;
        self.set_optional_unsigned("status", &f[5], "GetProfileListResponse.status")?;

        let periods = f[6].as_tree().ok_or(SmlError::TypeMismatch {
            context: "GetProfileListResponse.periodList",
            expected: "tree",
            actual: f[6].type_name(),
        })?;
        debug!("Period list with {} entries", periods.len());
        for entry in periods {
            let (key, reading) = self.read_period_entry(entry)?;
            self.readout.set_nested(&[key], Param::Map(reading));
        }

        self.set_optional_octets("rawdata", &f[7], "GetProfileListResponse.rawdata")?;
        self.set_optional_octets("periodSignature", &f[8], "GetProfileListResponse.periodSignature")
    }

    fn read_get_proc_parameter_request(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        self.set_optional_server_id(&f[0], "GetProcParameterRequest.serverId")?;
        self.set_optional_text("userName", &f[1], "GetProcParameterRequest.username")?;
        self.set_optional_octets("password", &f[2], "GetProcParameterRequest.password")?;
        self.set_tree_path(&f[3])?;
        self.set_optional_octets("attribute", &f[4], "GetProcParameterRequest.attribute")
    }

    fn read_get_proc_parameter_response(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        let server = expect_octets(&f[0], "GetProcParameterResponse.serverId")?;
        self.set_server_id(server);
        self.set_tree_path(&f[1])?;
        self.read_param_tree(&[], &f[2])
    }

    fn read_set_proc_parameter_request(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        self.set_optional_server_id(&f[0], "SetProcParameterRequest.serverId")?;
        self.set_optional_text("userName", &f[1], "SetProcParameterRequest.username")?;
        self.set_optional_octets("password", &f[2], "SetProcParameterRequest.password")?;
        self.set_tree_path(&f[3])?;
        self.read_param_tree(&[], &f[4])
    }

    fn read_get_list_request(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        let client = expect_octets(&f[0], "GetListRequest.clientId")?;
        self.set_client_id(client);
        self.set_optional_server_id(&f[1], "GetListRequest.serverId")?;
        self.set_optional_text("userName", &f[2], "GetListRequest.username")?;
        self.set_optional_octets("password", &f[3], "GetListRequest.password")?;
        self.set_optional_octets("listName", &f[4], "GetListRequest.listName")
    }

    fn read_get_list_response(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        self.set_optional_client_id(&f[0], "GetListResponse.clientId")?;
        let server = expect_octets(&f[1], "GetListResponse.serverId")?;
        self.set_server_id(server);
        self.set_optional_octets("listName", &f[2], "GetListResponse.listName")?;
        self.set_optional_time("actSensorTime", &f[3])?;

        let entries = f[4].as_tree().ok_or(SmlError::TypeMismatch {
            context: "GetListResponse.valList",
            expected: "tree",
            actual: f[4].type_name(),
        })?;
        debug!("Value list with {} entries", entries.len());
        for entry in entries {
            let (key, reading) = self.read_list_entry(entry)?;
            self.readout.set_nested(&[key], Param::Map(reading));
        }

        self.set_optional_octets("listSignature", &f[5], "GetListResponse.listSignature")?;
        self.set_optional_time("actGatewayTime", &f[6])
    }

    fn read_attention_response(&mut self, f: &[SmlValue]) -> Result<(), SmlError> {
        let server = expect_octets(&f[0], "AttentionResponse.serverId")?;
        self.set_server_id(server);

        let number = expect_octets(&f[1], "AttentionResponse.attentionNo")?;
        self.readout.set_value("attentionNo", SmlValue::OctetString(number.to_vec()));
        let name = match Obis::try_from(number) {
            Ok(code) => codes::get_attention_name(&code),
            Err(_) => codes::UNKNOWN_ATTENTION,
        };
        debug!("Attention {}: {}", hex::encode(number), name);
        self.readout.set_value("attentionName", name);

        self.set_optional_text("attentionMsg", &f[2], "AttentionResponse.attentionMsg")?;
        if !f[3].is_null() {
            self.read_param_tree(&["attentionDetails".to_string()], &f[3])?;
        }
        Ok(())
    }

    /// Walk an SML_Tree `[parameterName, parameterValue?, childList?]`.
    ///
    /// A node holds either a value or children. Nodes carrying both are
    /// rejected before anything of them is stored.
    pub fn read_param_tree(&mut self, parent: &[String], node: &SmlValue) -> Result<(), SmlError> {
        let fields = self.expect_tuple(node, 3, SML_TREE)?;
        let name = expect_octets(&fields[0], "SML_Tree.parameterName")?;

        let mut path = parent.to_vec();
        path.push(hex::encode(name));

        let value = &fields[1];
        let children: &[SmlValue] = match &fields[2] {
            SmlValue::Null => &[],
            SmlValue::Tree(items) => items,
            other => {
                return Err(SmlError::TypeMismatch {
                    context: "SML_Tree.childList",
                    expected: "tree",
                    actual: other.type_name(),
                })
            }
        };

        if !value.is_null() && !children.is_empty() {
            return Err(SmlError::StructuralInvariant(path.join("/")));
        }

        if !value.is_null() {
            let param = self.read_proc_par_value(value)?;
            self.readout.set_nested(&path, param);
        } else if !children.is_empty() {
            debug!("Descending into {} with {} children", path.join("/"), children.len());
            for child in children {
                self.read_param_tree(&path, child)?;
            }
        } else {
            self.readout.set_nested(&path, Param::Value(SmlValue::Null));
        }
        Ok(())
    }

    fn read_proc_par_value(&self, value: &SmlValue) -> Result<Param, SmlError> {
        let choice = self.expect_tuple(value, 2, "SML_ProcParValue")?;
        let tag = expect_unsigned(&choice[0], "SML_ProcParValue.choice")?;
        match tag {
            PROC_PAR_VALUE => Ok(Param::Value(choice[1].clone())),
            PROC_PAR_PERIOD_ENTRY => self.read_period_entry(&choice[1]).map(|(_, m)| Param::Map(m)),
            PROC_PAR_TUPEL_ENTRY => Ok(Param::Value(choice[1].clone())),
            PROC_PAR_TIME => read_time(&choice[1]).map(Param::Value),
            PROC_PAR_LIST_ENTRY => self.read_list_entry(&choice[1]).map(|(_, m)| Param::Map(m)),
            other => {
                warn!("Unknown proc parameter value tag {}, storing verbatim", other);
                Ok(Param::Value(choice[1].clone()))
            }
        }
    }

    /// SML_PeriodEntry `[objName, unit, scaler, value, valueSignature?]`.
    fn read_period_entry(&self, entry: &SmlValue) -> Result<(String, ParamMap), SmlError> {
        let f = self.expect_tuple(entry, 5, "SML_PeriodEntry")?;
        let code = expect_octets(&f[0], "SML_PeriodEntry.objName")?;
        let unit = expect_unit(&f[1], "SML_PeriodEntry.unit")?;
        let scaler = expect_scaler(&f[2], "SML_PeriodEntry.scaler")?;

        let mut reading = reading_map(code, Some(unit), scaler, &f[3]);
        if let Some(sig) = optional_octets(&f[4], "SML_PeriodEntry.valueSignature")? {
            reading.insert("valueSignature".into(), SmlValue::OctetString(sig.to_vec()).into());
        }
        Ok((hex::encode(code), reading))
    }

    /// SML_ListEntry `[objName, status?, valTime?, unit?, scaler?, value, valueSignature?]`.
    fn read_list_entry(&self, entry: &SmlValue) -> Result<(String, ParamMap), SmlError> {
        let f = self.expect_tuple(entry, 7, "SML_ListEntry")?;
        let code = expect_octets(&f[0], "SML_ListEntry.objName")?;
        let unit = match &f[3] {
            SmlValue::Null => None,
            other => Some(expect_unit(other, "SML_ListEntry.unit")?),
        };
        let scaler = match &f[4] {
            SmlValue::Null => 0,
            other => expect_scaler(other, "SML_ListEntry.scaler")?,
        };

        let mut reading = reading_map(code, unit, scaler, &f[5]);
        if !f[1].is_null() {
            reading.insert("status".into(), f[1].clone().into());
        }
        if !f[2].is_null() {
            reading.insert("valTime".into(), read_time(&f[2])?.into());
        }
        if let Some(sig) = optional_octets(&f[6], "SML_ListEntry.valueSignature")? {
            reading.insert("valueSignature".into(), SmlValue::OctetString(sig.to_vec()).into());
        }
        Ok((hex::encode(code), reading))
    }
}

/* value scaled by 10^scaler plus everything needed to interpret it */
fn reading_map(code: &[u8], unit: Option<u16>, scaler: i8, raw: &SmlValue) -> ParamMap {
    let mut reading = ParamMap::new();

    let value = match scale_value(raw, scaler) {
        Some(scaled) => SmlValue::String(scaled),
        None => match raw {
            SmlValue::OctetString(bytes) => SmlValue::text_or_octets(bytes),
            other => other.clone(),
        },
    };
    reading.insert("value".into(), value.into());
    reading.insert("raw".into(), raw.clone().into());
    reading.insert("scaler".into(), SmlValue::Int8(scaler).into());
    reading.insert("type".into(), SmlValue::from(raw.type_name()).into());
    if let Some(unit) = unit {
        reading.insert("unit".into(), SmlValue::UInt16(unit).into());
        reading.insert("unitName".into(), SmlValue::from(get_unit_name(unit)).into());
    }
    if let Ok(obis) = Obis::try_from(code) {
        if let Some(desc) = codes::get_obis_description(&obis) {
            reading.insert("description".into(), SmlValue::from(desc).into());
        }
    } else {
        debug!("Storing non OBIS name {} verbatim", hex::encode(code));
    }
    reading
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sml::generator::{child_list_tree, parameter_tree};

    fn octets(bytes: &[u8]) -> SmlValue {
        SmlValue::OctetString(bytes.to_vec())
    }

    fn tree(items: Vec<SmlValue>) -> SmlValue {
        SmlValue::Tree(items)
    }

    const SERVER: [u8; 9] = [0x01, 0xE6, 0x1E, 0x13, 0x09, 0x00, 0x16, 0x3C, 0x07];

    fn message(choice: u32, body: SmlValue) -> SmlValue {
        tree(vec![
            octets(b"trx-1"),
            SmlValue::UInt8(0),
            SmlValue::UInt8(0),
            tree(vec![SmlValue::UInt32(choice), body]),
            SmlValue::UInt16(0),
            SmlValue::Null,
        ])
    }

    #[test]
    fn test_open_response() {
        let body = tree(vec![
            SmlValue::Null,
            octets(&[0x05, 0x00, 0xFF, 0xB0, 0x0B, 0xCA, 0xAE]),
            octets(b"file-7"),
            octets(&SERVER),
            tree(vec![SmlValue::UInt8(2), SmlValue::UInt32(1_600_000_000)]),
            SmlValue::UInt8(1),
        ]);

        let mut reader = Reader::default();
        let readout = reader.read_message(&message(0x0101, body)).unwrap();
        assert_eq!(readout.trx, "trx-1");
        assert_eq!(readout.message, Some(MessageType::OpenResponse));
        assert_eq!(readout.server_id, SERVER.to_vec());
        assert_eq!(readout.get_value("serverId"), Some(&SmlValue::from("01-e61e-13090016-3c-07")));
        assert_eq!(readout.get_value("clientId"), Some(&SmlValue::from("00:ff:b0:0b:ca:ae")));
        assert_eq!(readout.get_value("reqFileId"), Some(&SmlValue::from("file-7")));
        assert_eq!(
            readout.get_value("refTime"),
            Some(&SmlValue::Time(DateTime::from_timestamp(1_600_000_000, 0).unwrap()))
        );
        assert_eq!(readout.get_value("SMLVersion"), Some(&SmlValue::UInt64(1)));
        /* absent codepage is skipped, not defaulted */
        assert!(readout.get("codepage").is_none());
    }

    #[test]
    fn test_open_request_raw_ids() {
        let config = ReaderConfig { strict_arity: false, render_ids: false };
        let body = tree(vec![
            SmlValue::Null,
            octets(&[0xAA, 0xBB]),
            octets(b"f"),
            SmlValue::Null,
            octets(b"operator"),
            octets(b"secret"),
            SmlValue::Null,
        ]);

        let mut reader = Reader::new(&config);
        let readout = reader.read_body(0x0100, &body).unwrap();
        assert_eq!(readout.client_id, vec![0xAA, 0xBB]);
        assert_eq!(readout.get_value("clientId"), Some(&octets(&[0xAA, 0xBB])));
        assert_eq!(readout.get_value("userName"), Some(&SmlValue::from("operator")));
        assert!(readout.get("serverId").is_none());
        assert!(readout.get("SMLVersion").is_none());
    }

    #[test]
    fn test_close_response() {
        let mut reader = Reader::default();
        let readout = reader.read_body(0x0201, &tree(vec![octets(&[1, 2])])).unwrap();
        assert_eq!(readout.message, Some(MessageType::CloseResponse));
        assert_eq!(readout.get_value("globalSignature"), Some(&octets(&[1, 2])));
    }

    #[test]
    fn test_index_increments() {
        let mut reader = Reader::default();
        let close = tree(vec![SmlValue::Null]);
        assert_eq!(reader.read_body(0x0201, &close).unwrap().idx, 0);
        assert_eq!(reader.read_body(0x0201, &close).unwrap().idx, 1);
        assert_eq!(reader.read_body(0x0201, &close).unwrap().idx, 2);
    }

    #[test]
    fn test_unknown_choice() {
        let mut reader = Reader::default();
        assert_eq!(
            reader.read_body(0x0999, &tree(vec![])).unwrap_err(),
            SmlError::UnknownChoice(0x0999)
        );
    }

    #[test]
    fn test_profile_pack_not_supported() {
        let mut reader = Reader::default();
        assert_eq!(
            reader.read_body(0x0301, &tree(vec![])).unwrap_err(),
            SmlError::UnsupportedMessage(MessageType::GetProfilePackResponse)
        );
    }

    #[test]
    fn test_short_tuple() {
        let mut reader = Reader::default();
        let body = tree(vec![SmlValue::Null, SmlValue::Null, octets(b"f"), octets(&SERVER)]);
        assert_eq!(
            reader.read_body(0x0101, &body).unwrap_err(),
            SmlError::Arity { context: "OpenResponse", expected: 6, actual: 4 }
        );
    }

    #[test]
    fn test_long_tuple_strict_and_lenient() {
        let body = tree(vec![SmlValue::Null, SmlValue::Null]);

        let mut lenient = Reader::default();
        assert!(lenient.read_body(0x0200, &body).is_ok());

        let mut strict = Reader::new(&ReaderConfig { strict_arity: true, render_ids: true });
        assert_eq!(
            strict.read_body(0x0200, &body).unwrap_err(),
            SmlError::Arity { context: "CloseRequest", expected: 1, actual: 2 }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let mut reader = Reader::default();
        let body = tree(vec![
            SmlValue::Null,
            SmlValue::Null,
            octets(b"f"),
            SmlValue::UInt32(7),
            SmlValue::Null,
            SmlValue::Null,
        ]);
        assert_eq!(
            reader.read_body(0x0101, &body).unwrap_err(),
            SmlError::TypeMismatch {
                context: "OpenResponse.serverId",
                expected: "octet string",
                actual: "u32"
            }
        );
    }

    #[test]
    fn test_proc_parameter_nested_path() {
        let a = Obis::new(0x81, 0x81, 0x11, 0x06, 0xFF, 0xFF);
        let b = Obis::new(0x81, 0x81, 0x11, 0x06, 0x01, 0xFF);
        let c = Obis::new(0x81, 0x81, 0xC7, 0x82, 0x03, 0xFF);
        let v = SmlValue::from("EMH");

        let params = child_list_tree(a, vec![child_list_tree(b, vec![parameter_tree(c, v.clone())])]);
        let body = tree(vec![octets(&SERVER), tree(vec![a.into()]), params]);

        let mut reader = Reader::default();
        let readout = reader.read_body(0x0501, &body).unwrap();
        let path = [a.to_hex_string(), b.to_hex_string(), c.to_hex_string()];
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        assert_eq!(readout.get_nested(&path), Some(&Param::Value(v)));
        assert_eq!(readout.get_value("parameterTreePath"), Some(&tree(vec![a.into()])));
    }

    #[test]
    fn test_siblings_merge() {
        let root = Obis::new(0x81, 0x49, 0x0D, 0x07, 0x00, 0xFF);
        let x = Obis::new(0x81, 0x49, 0x17, 0x07, 0x00, 0x01);
        let y = Obis::new(0x81, 0x49, 0x17, 0x07, 0x00, 0x02);
        let params = child_list_tree(
            root,
            vec![parameter_tree(x, SmlValue::UInt16(1)), parameter_tree(y, SmlValue::UInt16(2))],
        );

        let mut reader = Reader::default();
        reader.read_param_tree(&[], &params).unwrap();
        let map = reader.readout().get(&root.to_hex_string()).unwrap().as_map().unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_value_and_children_rejected() {
        let a = Obis::new(1, 0, 1, 8, 0, 255);
        let b = Obis::new(1, 0, 1, 8, 1, 255);
        let malformed = tree(vec![
            a.into(),
            tree(vec![SmlValue::UInt8(1), SmlValue::UInt8(5)]),
            tree(vec![parameter_tree(b, SmlValue::UInt8(6))]),
        ]);

        let mut reader = Reader::default();
        let err = reader.read_param_tree(&[], &malformed).unwrap_err();
        assert_eq!(err, SmlError::StructuralInvariant(a.to_hex_string()));
        assert!(reader.readout().values.is_empty());
    }

    #[test]
    fn test_empty_node_stored_as_null() {
        let a = Obis::new(1, 0, 1, 8, 0, 255);
        let mut reader = Reader::default();
        reader.read_param_tree(&[], &tree(vec![a.into(), SmlValue::Null, SmlValue::Null])).unwrap();
        assert_eq!(reader.readout().get_value(&a.to_hex_string()), Some(&SmlValue::Null));
    }

    #[test]
    fn test_time_parameter() {
        let a = Obis::new(0, 0, 1, 0, 0, 255);
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut reader = Reader::default();
        reader.read_param_tree(&[], &parameter_tree(a, SmlValue::Time(at))).unwrap();
        assert_eq!(reader.readout().get_value(&a.to_hex_string()), Some(&SmlValue::Time(at)));
    }

    #[test]
    fn test_get_list_response() {
        let energy = Obis::new(1, 0, 1, 8, 0, 255);
        let entry = tree(vec![
            energy.into(),
            SmlValue::UInt32(0x0018_2104),
            SmlValue::Null,
            SmlValue::UInt8(30),
            SmlValue::Int8(-1),
            SmlValue::UInt64(123_456),
            SmlValue::Null,
        ]);
        let body = tree(vec![
            SmlValue::Null,
            octets(&SERVER),
            SmlValue::Null,
            tree(vec![SmlValue::UInt8(1), SmlValue::UInt32(42)]),
            tree(vec![entry]),
            SmlValue::Null,
            SmlValue::Null,
        ]);

        let mut reader = Reader::default();
        let readout = reader.read_body(0x0701, &body).unwrap();
        let reading = readout.get(&energy.to_hex_string()).unwrap().as_map().unwrap();
        assert_eq!(reading["value"], Param::Value(SmlValue::from("12345.6")));
        assert_eq!(reading["unitName"], Param::Value(SmlValue::from("Wh")));
        assert_eq!(reading["scaler"], Param::Value(SmlValue::Int8(-1)));
        assert_eq!(reading["type"], Param::Value(SmlValue::from("u64")));
        assert_eq!(reading["description"], Param::Value(SmlValue::from("Active energy + (total)")));
        assert_eq!(readout.get_value("actSensorTime"), Some(&SmlValue::UInt32(42)));
    }

    #[test]
    fn test_get_profile_list_response() {
        let power = Obis::new(1, 0, 16, 7, 0, 255);
        let entry = tree(vec![power.into(), SmlValue::UInt8(27), SmlValue::Int8(0), SmlValue::Int32(-250), SmlValue::Null]);
        let body = tree(vec![
            octets(&SERVER),
            tree(vec![SmlValue::UInt8(2), SmlValue::UInt32(1_700_000_000)]),
            SmlValue::UInt32(900),
            tree(vec![codes::OBIS_PROFILE_15_MINUTE.into()]),
            tree(vec![SmlValue::UInt8(2), SmlValue::UInt32(1_700_000_000)]),
            SmlValue::UInt64(0),
            tree(vec![entry]),
            SmlValue::Null,
            SmlValue::Null,
        ]);

        let mut reader = Reader::default();
        let readout = reader.read_body(0x0401, &body).unwrap();
        assert_eq!(readout.get_value("regPeriod"), Some(&SmlValue::UInt64(900)));
        let reading = readout.get(&power.to_hex_string()).unwrap().as_map().unwrap();
        assert_eq!(reading["value"], Param::Value(SmlValue::from("-250")));
        assert_eq!(reading["unitName"], Param::Value(SmlValue::from("W")));
    }

    #[test]
    fn test_attention_response() {
        let body = tree(vec![
            octets(&SERVER),
            codes::OBIS_ATTENTION_INVALID_CRC.into(),
            octets(b"bad crc"),
            SmlValue::Null,
        ]);

        let mut reader = Reader::default();
        let readout = reader.read_body(0xFF01, &body).unwrap();
        assert_eq!(readout.get_value("attentionName"), Some(&SmlValue::from("checksum faulty")));
        assert_eq!(readout.get_value("attentionMsg"), Some(&SmlValue::from("bad crc")));
    }

    #[test]
    fn test_read_time_variants() {
        assert_eq!(
            read_time(&tree(vec![SmlValue::UInt8(1), SmlValue::UInt32(77)])).unwrap(),
            SmlValue::UInt32(77)
        );
        let local = tree(vec![
            SmlValue::UInt8(3),
            tree(vec![SmlValue::UInt32(60), SmlValue::Int16(60), SmlValue::Int16(0)]),
        ]);
        assert_eq!(read_time(&local).unwrap(), SmlValue::Time(DateTime::from_timestamp(60, 0).unwrap()));
        assert_eq!(
            read_time(&tree(vec![SmlValue::UInt8(9), SmlValue::UInt32(0)])).unwrap_err(),
            SmlError::UnknownChoice(9)
        );
        assert_eq!(
            read_time(&tree(vec![SmlValue::UInt8(1), SmlValue::UInt64(0x1_0000_0005)])).unwrap_err(),
            SmlError::TypeMismatch { context: "SML_Time.secIndex", expected: "u32", actual: "u64" }
        );
    }

    fn profile_list_request(with_rawdata: SmlValue, object_list: SmlValue) -> SmlValue {
        let profile = Obis::new(0x81, 0x81, 0xC7, 0x86, 0x20, 0xFF);
        tree(vec![
            octets(&SERVER),
            SmlValue::Null,
            SmlValue::Null,
            with_rawdata,
            SmlValue::Null,
            SmlValue::Null,
            tree(vec![profile.into()]),
            object_list,
            SmlValue::Null,
        ])
    }

    #[test]
    fn test_get_profile_list_request() {
        let energy = Obis::new(1, 0, 1, 8, 0, 255);
        let objects = tree(vec![energy.into()]);
        let mut reader = Reader::default();
        let readout = reader
            .read_body(0x0400, &profile_list_request(SmlValue::Bool(true), objects.clone()))
            .unwrap();
        assert_eq!(readout.message, Some(MessageType::GetProfileListRequest));
        assert_eq!(readout.get_value("withRawdata"), Some(&SmlValue::Bool(true)));
        assert_eq!(readout.get_value("objectList"), Some(&objects));

        let readout = reader
            .read_body(0x0400, &profile_list_request(SmlValue::Null, SmlValue::Null))
            .unwrap();
        assert!(readout.get_value("withRawdata").is_none());
        assert!(readout.get_value("objectList").is_none());
    }

    #[test]
    fn test_get_profile_list_request_wrong_types() {
        let mut reader = Reader::default();
        let err = reader
            .read_body(0x0400, &profile_list_request(SmlValue::UInt8(5), SmlValue::Null))
            .unwrap_err();
        assert_eq!(
            err,
            SmlError::TypeMismatch { context: "GetProfileListRequest.withRawdata", expected: "bool", actual: "u8" }
        );

        let err = reader
            .read_body(0x0400, &profile_list_request(SmlValue::Null, octets(b"list")))
            .unwrap_err();
        assert_eq!(
            err,
            SmlError::TypeMismatch { context: "GetProfileListRequest.objectList", expected: "tree", actual: "octet string" }
        );
    }
}

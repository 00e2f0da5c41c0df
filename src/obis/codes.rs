use lazy_static::lazy_static;
use std::collections::HashMap;

use super::Obis;

/// Sentinel returned for the `F.F` notation (error register).
pub const OBIS_FF: Obis = Obis::new(0, 0, 97, 97, 0, 255);

// Identification
pub const OBIS_SERIAL_NR: Obis = Obis::new(0, 0, 96, 1, 0, 255);
pub const OBIS_SERIAL_NR_SECOND: Obis = Obis::new(0, 0, 96, 1, 255, 255);
pub const OBIS_DEVICE_ID: Obis = Obis::new(0, 0, 0, 0, 0, 255);
pub const OBIS_DATE_TIME: Obis = Obis::new(0, 0, 1, 0, 0, 255);
pub const OBIS_FIRMWARE_VERSION: Obis = Obis::new(0, 0, 0, 2, 0, 255);

pub const OBIS_ROOT_DEVICE_IDENT: Obis = Obis::new(0x81, 0x81, 0xC7, 0x82, 0x01, 0xFF);
pub const OBIS_DEVICE_CLASS: Obis = Obis::new(0x81, 0x81, 0xC7, 0x82, 0x02, 0xFF);
pub const OBIS_DATA_MANUFACTURER: Obis = Obis::new(0x81, 0x81, 0xC7, 0x82, 0x03, 0xFF);
pub const OBIS_SERVER_ID: Obis = Obis::new(0x81, 0x81, 0xC7, 0x82, 0x04, 0xFF);
pub const OBIS_ROOT_FIRMWARE: Obis = Obis::new(0x81, 0x81, 0xC7, 0x82, 0x06, 0xFF);

// Energy register
pub const OBIS_REG_POS_AE_NO_TARIFF: Obis = Obis::new(1, 0, 1, 8, 0, 255);
pub const OBIS_REG_POS_AE_T1: Obis = Obis::new(1, 0, 1, 8, 1, 255);
pub const OBIS_REG_POS_AE_T2: Obis = Obis::new(1, 0, 1, 8, 2, 255);
pub const OBIS_REG_NEG_AE_NO_TARIFF: Obis = Obis::new(1, 0, 2, 8, 0, 255);
pub const OBIS_REG_NEG_AE_T1: Obis = Obis::new(1, 0, 2, 8, 1, 255);
pub const OBIS_REG_NEG_AE_T2: Obis = Obis::new(1, 0, 2, 8, 2, 255);

// Instantaneous values
pub const OBIS_REG_CUR_POS_AE: Obis = Obis::new(1, 0, 1, 7, 0, 255);
pub const OBIS_REG_CUR_AP: Obis = Obis::new(1, 0, 16, 7, 0, 255);
pub const OBIS_REG_VOLTAGE_L1: Obis = Obis::new(1, 0, 32, 7, 0, 255);
pub const OBIS_REG_VOLTAGE_L2: Obis = Obis::new(1, 0, 52, 7, 0, 255);
pub const OBIS_REG_VOLTAGE_L3: Obis = Obis::new(1, 0, 72, 7, 0, 255);
pub const OBIS_REG_CURRENT_L1: Obis = Obis::new(1, 0, 31, 7, 0, 255);
pub const OBIS_REG_CURRENT_L2: Obis = Obis::new(1, 0, 51, 7, 0, 255);
pub const OBIS_REG_CURRENT_L3: Obis = Obis::new(1, 0, 71, 7, 0, 255);
pub const OBIS_REG_FREQUENCY: Obis = Obis::new(1, 0, 14, 7, 0, 255);

// Load profiles
pub const OBIS_PROFILE_1_MINUTE: Obis = Obis::new(0x81, 0x81, 0xC7, 0x86, 0x10, 0xFF);
pub const OBIS_PROFILE_15_MINUTE: Obis = Obis::new(0x81, 0x81, 0xC7, 0x86, 0x11, 0xFF);
pub const OBIS_PROFILE_60_MINUTE: Obis = Obis::new(0x81, 0x81, 0xC7, 0x86, 0x12, 0xFF);
pub const OBIS_PROFILE_24_HOUR: Obis = Obis::new(0x81, 0x81, 0xC7, 0x86, 0x13, 0xFF);

// Attention codes, 81 81 C7 C7 FD/FE xx
pub const OBIS_ATTENTION_OK: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFD, 0x00);
pub const OBIS_ATTENTION_JOB_IS_RUNNING: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFD, 0x01);
pub const OBIS_ATTENTION_UNKNOWN_ERROR: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x00);
pub const OBIS_ATTENTION_UNKNOWN_SML_ID: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x01);
pub const OBIS_ATTENTION_NOT_AUTHORIZED: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x02);
pub const OBIS_ATTENTION_NO_SERVER_ID: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x03);
pub const OBIS_ATTENTION_NO_REQ_FIELD: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x04);
pub const OBIS_ATTENTION_CANNOT_WRITE: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x05);
pub const OBIS_ATTENTION_CANNOT_READ: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x06);
pub const OBIS_ATTENTION_COMM_ERROR: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x07);
pub const OBIS_ATTENTION_PARSER_ERROR: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x08);
pub const OBIS_ATTENTION_OUT_OF_RANGE: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x09);
pub const OBIS_ATTENTION_NOT_EXECUTED: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x0A);
pub const OBIS_ATTENTION_INVALID_CRC: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x0B);
pub const OBIS_ATTENTION_NO_BROADCAST: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x0C);
pub const OBIS_ATTENTION_UNEXPECTED_MSG: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x0D);
pub const OBIS_ATTENTION_UNKNOWN_OBIS_CODE: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x0E);
pub const OBIS_ATTENTION_UNSUPPORTED_DATA_TYPE: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x0F);
pub const OBIS_ATTENTION_ELEMENT_NOT_SUPPORTED: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x10);
pub const OBIS_ATTENTION_NO_ENTRIES: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x11);
pub const OBIS_ATTENTION_END_LIMIT_BEFORE_START: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x12);
pub const OBIS_ATTENTION_NO_ENTRIES_IN_RANGE: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x13);
pub const OBIS_ATTENTION_MISSING_CLOSE_MSG: Obis = Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x14);

/// Name used for attention codes outside the table.
pub const UNKNOWN_ATTENTION: &str = "unknown attention code";

lazy_static! {
    static ref DESCRIPTIONS: HashMap<Obis, &'static str> = {
        let mut map = HashMap::new();

        // Energy values
        map.insert(OBIS_REG_POS_AE_NO_TARIFF, "Active energy + (total)");
        map.insert(OBIS_REG_POS_AE_T1, "Active energy + (tariff 1)");
        map.insert(OBIS_REG_POS_AE_T2, "Active energy + (tariff 2)");
        map.insert(OBIS_REG_NEG_AE_NO_TARIFF, "Active energy - (total)");
        map.insert(OBIS_REG_NEG_AE_T1, "Active energy - (tariff 1)");
        map.insert(OBIS_REG_NEG_AE_T2, "Active energy - (tariff 2)");

        // Power, voltage and current
        map.insert(OBIS_REG_CUR_POS_AE, "Active power + (total)");
        map.insert(OBIS_REG_CUR_AP, "Sum active instantaneous power");
        map.insert(OBIS_REG_VOLTAGE_L1, "Voltage (L1)");
        map.insert(OBIS_REG_VOLTAGE_L2, "Voltage (L2)");
        map.insert(OBIS_REG_VOLTAGE_L3, "Voltage (L3)");
        map.insert(OBIS_REG_CURRENT_L1, "Current (L1)");
        map.insert(OBIS_REG_CURRENT_L2, "Current (L2)");
        map.insert(OBIS_REG_CURRENT_L3, "Current (L3)");
        map.insert(OBIS_REG_FREQUENCY, "Supply frequency");

        // Identification
        map.insert(OBIS_SERIAL_NR, "Serial number");
        map.insert(OBIS_SERIAL_NR_SECOND, "Serial number (second)");
        map.insert(OBIS_DEVICE_ID, "Device ID");
        map.insert(OBIS_DATE_TIME, "Date and time");
        map.insert(OBIS_FIRMWARE_VERSION, "Firmware version");
        map.insert(OBIS_ROOT_DEVICE_IDENT, "Device identification");
        map.insert(OBIS_DEVICE_CLASS, "Device class");
        map.insert(OBIS_DATA_MANUFACTURER, "Manufacturer");
        map.insert(OBIS_SERVER_ID, "Server ID");
        map.insert(OBIS_ROOT_FIRMWARE, "Firmware");
        map.insert(OBIS_FF, "Error register");

        map.insert(OBIS_PROFILE_1_MINUTE, "Load profile 1 minute");
        map.insert(OBIS_PROFILE_15_MINUTE, "Load profile 15 minutes");
        map.insert(OBIS_PROFILE_60_MINUTE, "Load profile 60 minutes");
        map.insert(OBIS_PROFILE_24_HOUR, "Load profile 24 hours");

        map
    };

    static ref ATTENTION_NAMES: HashMap<Obis, &'static str> = {
        let mut map = HashMap::new();
        map.insert(OBIS_ATTENTION_OK, "no error");
        map.insert(OBIS_ATTENTION_JOB_IS_RUNNING, "job accepted, processing later");
        map.insert(OBIS_ATTENTION_UNKNOWN_ERROR, "unknown error");
        map.insert(OBIS_ATTENTION_UNKNOWN_SML_ID, "unknown SML identifier");
        map.insert(OBIS_ATTENTION_NOT_AUTHORIZED, "insufficient authentication");
        map.insert(OBIS_ATTENTION_NO_SERVER_ID, "destination address not available");
        map.insert(OBIS_ATTENTION_NO_REQ_FIELD, "request not available");
        map.insert(OBIS_ATTENTION_CANNOT_WRITE, "one or more target attributes cannot be written");
        map.insert(OBIS_ATTENTION_CANNOT_READ, "one or more target attributes cannot be read");
        map.insert(OBIS_ATTENTION_COMM_ERROR, "communication with metering point disturbed");
        map.insert(OBIS_ATTENTION_PARSER_ERROR, "raw data cannot be interpreted");
        map.insert(OBIS_ATTENTION_OUT_OF_RANGE, "value out of range");
        map.insert(OBIS_ATTENTION_NOT_EXECUTED, "request not executed");
        map.insert(OBIS_ATTENTION_INVALID_CRC, "checksum faulty");
        map.insert(OBIS_ATTENTION_NO_BROADCAST, "broadcast not supported");
        map.insert(OBIS_ATTENTION_UNEXPECTED_MSG, "unexpected SML message");
        map.insert(OBIS_ATTENTION_UNKNOWN_OBIS_CODE, "unknown object in load profile");
        map.insert(OBIS_ATTENTION_UNSUPPORTED_DATA_TYPE, "data type not supported");
        map.insert(OBIS_ATTENTION_ELEMENT_NOT_SUPPORTED, "optional element not supported");
        map.insert(OBIS_ATTENTION_NO_ENTRIES, "load profile has no entry");
        map.insert(OBIS_ATTENTION_END_LIMIT_BEFORE_START, "end limit before start limit");
        map.insert(OBIS_ATTENTION_NO_ENTRIES_IN_RANGE, "no entries in requested range");
        map.insert(OBIS_ATTENTION_MISSING_CLOSE_MSG, "close message missing");
        map
    };
}

/// Human readable label of a well known code.
///
/// Wildcard storage is normalised, so `1-0:1.8.0*0` and `1-0:1.8.0*255`
/// get the same label.
pub fn get_obis_description(code: &Obis) -> Option<&'static str> {
    if let Some(desc) = DESCRIPTIONS.get(code) {
        return Some(desc);
    }
    let mut bytes = code.to_buffer();
    bytes[5] = super::WILDCARD;
    DESCRIPTIONS.get(&Obis::from(bytes)).copied()
}

pub fn is_attention_code(code: &Obis) -> bool {
    code.is_matching(0x81, 0x81, 0xC7, 0xC7) && matches!(code.quantity(), 0xFD | 0xFE)
}

/// Name of an attention code, [`UNKNOWN_ATTENTION`] when not in the table.
pub fn get_attention_name(code: &Obis) -> &'static str {
    ATTENTION_NAMES.get(code).copied().unwrap_or(UNKNOWN_ATTENTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_obis_description() {
        assert_eq!(get_obis_description(&OBIS_REG_POS_AE_T1), Some("Active energy + (tariff 1)"));
        assert_eq!(
            get_obis_description(&Obis::new(1, 0, 1, 8, 0, 0)),
            Some("Active energy + (total)")
        );
        assert_eq!(get_obis_description(&Obis::new(9, 9, 9, 9, 9, 9)), None);
    }

    #[test]
    fn test_attention_names() {
        assert!(is_attention_code(&OBIS_ATTENTION_OK));
        assert!(is_attention_code(&OBIS_ATTENTION_MISSING_CLOSE_MSG));
        assert!(!is_attention_code(&OBIS_SERIAL_NR));

        assert_eq!(get_attention_name(&OBIS_ATTENTION_OK), "no error");
        assert_eq!(get_attention_name(&OBIS_ATTENTION_INVALID_CRC), "checksum faulty");
        assert_eq!(
            get_attention_name(&Obis::new(0x81, 0x81, 0xC7, 0xC7, 0xFE, 0x7F)),
            UNKNOWN_ATTENTION
        );
    }

    #[test]
    fn test_sentinel_parses() {
        assert_eq!("F.F".parse::<Obis>().unwrap(), OBIS_FF);
    }
}

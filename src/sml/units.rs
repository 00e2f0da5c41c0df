use lazy_static::lazy_static;
use std::collections::HashMap;

use super::SmlValue;

/// Rendered for every code outside the table.
pub const NOT_A_UNIT: &str = "not-a-unit";

lazy_static! {
    /// DLMS unit codes (IEC 62056-62) with the SML vendor extensions.
    static ref UNIT_NAMES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(1, "a");          // year
        map.insert(2, "mo");         // month
        map.insert(3, "wk");         // week
        map.insert(4, "d");          // day
        map.insert(5, "h");          // hour
        map.insert(6, "min");        // minute
        map.insert(7, "s");          // second
        map.insert(8, "°");          // phase angle
        map.insert(9, "°C");         // temperature
        map.insert(10, "currency");
        map.insert(11, "m");         // length
        map.insert(12, "m/s");       // speed
        map.insert(13, "m³");        // volume
        map.insert(14, "m³");        // corrected volume
        map.insert(15, "m³/h");      // volume flux
        map.insert(16, "m³/h");      // corrected volume flux
        map.insert(17, "m³/d");
        map.insert(18, "m³/d");
        map.insert(19, "l");         // litre
        map.insert(20, "kg");
        map.insert(21, "N");         // force
        map.insert(22, "Nm");        // energy
        map.insert(23, "Pa");        // pressure
        map.insert(24, "bar");
        map.insert(25, "J");
        map.insert(26, "J/h");       // thermal power
        map.insert(27, "W");         // active power
        map.insert(28, "VA");        // apparent power
        map.insert(29, "var");       // reactive power
        map.insert(30, "Wh");        // active energy
        map.insert(31, "VAh");       // apparent energy
        map.insert(32, "varh");      // reactive energy
        map.insert(33, "A");         // current
        map.insert(34, "C");         // electrical charge
        map.insert(35, "V");         // voltage
        map.insert(36, "V/m");       // electric field strength
        map.insert(37, "F");         // capacitance
        map.insert(38, "Ω");         // resistance
        map.insert(39, "Ωm²/m");     // resistivity
        map.insert(40, "Wb");        // magnetic flux
        map.insert(41, "T");         // magnetic flux density
        map.insert(42, "A/m");       // magnetic field strength
        map.insert(43, "H");         // inductance
        map.insert(44, "Hz");        // frequency
        map.insert(45, "1/(Wh)");    // meter constant active energy
        map.insert(46, "1/(varh)");
        map.insert(47, "1/(VAh)");
        map.insert(48, "V²h");
        map.insert(49, "A²h");
        map.insert(50, "kg/s");      // mass flux
        map.insert(51, "S");         // conductance
        map.insert(52, "K");         // temperature
        map.insert(53, "1/(V²h)");
        map.insert(54, "1/(A²h)");
        map.insert(55, "1/m³");
        map.insert(56, "%");
        map.insert(57, "Ah");        // ampere hours
        map.insert(60, "Wh/m³");     // energy per volume
        map.insert(61, "J/m³");      // calorific value
        map.insert(62, "Mol %");     // molar fraction
        map.insert(63, "g/m³");      // mass density
        map.insert(64, "Pa s");      // dynamic viscosity
        map.insert(65, "J/kg");      // specific energy
        map.insert(70, "dBm");       // signal strength
        map.insert(71, "dBµV");
        map.insert(72, "dB");        // logarithmic unit
        map.insert(253, "reserved");
        map.insert(254, "other");
        map.insert(255, "count");
        map
    };
}

/// Display name of a unit code, [`NOT_A_UNIT`] when unknown.
pub fn get_unit_name(code: u16) -> &'static str {
    UNIT_NAMES.get(&code).copied().unwrap_or(NOT_A_UNIT)
}

/// Exact decimal rendering of `raw * 10^scaler`.
///
/// Works on the integer digits so that no precision is lost for 64 bit
/// registers. Returns `None` when `raw` is not an integer.
pub fn scale_value(raw: &SmlValue, scaler: i8) -> Option<String> {
    let value = raw.as_integer()?;
    let negative = value < 0;
    let mut digits = value.unsigned_abs().to_string();

    if scaler >= 0 {
        if value != 0 {
            digits.push_str(&"0".repeat(scaler as usize));
        }
    } else {
        let shift = scaler.unsigned_abs() as usize;
        if digits.len() <= shift {
            digits = format!("{}{}", "0".repeat(shift - digits.len() + 1), digits);
        }
        digits.insert(digits.len() - shift, '.');
        digits = digits.trim_end_matches('0').trim_end_matches('.').to_string();
    }

    if negative {
        digits.insert(0, '-');
    }
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_names() {
        assert_eq!(get_unit_name(30), "Wh");
        assert_eq!(get_unit_name(27), "W");
        assert_eq!(get_unit_name(33), "A");
        assert_eq!(get_unit_name(35), "V");
        assert_eq!(get_unit_name(255), "count");
        assert_eq!(get_unit_name(0), NOT_A_UNIT);
        assert_eq!(get_unit_name(9999), "not-a-unit");
    }

    #[test]
    fn test_scale_value() {
        assert_eq!(scale_value(&SmlValue::UInt32(12345), -2).as_deref(), Some("123.45"));
        assert_eq!(scale_value(&SmlValue::UInt8(5), -3).as_deref(), Some("0.005"));
        assert_eq!(scale_value(&SmlValue::Int32(-12300), -2).as_deref(), Some("-123"));
        assert_eq!(scale_value(&SmlValue::Int16(-5), -1).as_deref(), Some("-0.5"));
        assert_eq!(scale_value(&SmlValue::UInt16(42), 2).as_deref(), Some("4200"));
        assert_eq!(scale_value(&SmlValue::UInt16(0), 3).as_deref(), Some("0"));
        assert_eq!(scale_value(&SmlValue::UInt16(0), -3).as_deref(), Some("0"));
        assert_eq!(
            scale_value(&SmlValue::UInt64(u64::MAX), -1).as_deref(),
            Some("1844674407370955161.5")
        );
        assert_eq!(scale_value(&SmlValue::Bool(true), 0), None);
    }
}

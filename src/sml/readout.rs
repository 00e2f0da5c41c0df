use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{MessageType, SmlValue};

pub type ParamMap = BTreeMap<String, Param>;

/// A readout entry, either a plain value or a nested OBIS sub-tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Param {
    Value(SmlValue),
    Map(ParamMap),
}

impl Param {
    pub fn as_value(&self) -> Option<&SmlValue> {
        match self {
            Param::Value(v) => Some(v),
            Param::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&ParamMap> {
        match self {
            Param::Map(m) => Some(m),
            Param::Value(_) => None,
        }
    }

    /* turn this entry into a map, dropping a plain value in the way */
    fn make_map(&mut self, key: &str) -> &mut ParamMap {
        match self {
            Param::Map(m) => m,
            Param::Value(old) => {
                warn!("Replacing value {} at {} by a nested map", old, key);
                *self = Param::Map(ParamMap::new());
                self.make_map(key)
            }
        }
    }
}

impl From<SmlValue> for Param {
    fn from(v: SmlValue) -> Self {
        Param::Value(v)
    }
}

impl From<ParamMap> for Param {
    fn from(m: ParamMap) -> Self {
        Param::Map(m)
    }
}

fn merge_into(target: &mut ParamMap, source: ParamMap) {
    for (key, value) in source {
        let value = match (target.get_mut(&key), value) {
            (Some(Param::Map(existing)), Param::Map(nested)) => {
                merge_into(existing, nested);
                continue;
            }
            (_, value) => value,
        };
        target.insert(key, value);
    }
}

/// Everything extracted from one SML message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readout {
    pub pk: Uuid,
    pub idx: usize,
    pub trx: String,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub server_id: Vec<u8>,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub client_id: Vec<u8>,
    pub message: Option<MessageType>,
    pub values: ParamMap,
}

impl Default for Readout {
    fn default() -> Self {
        Self::new()
    }
}

impl Readout {
    pub fn new() -> Self {
        Readout {
            pk: Uuid::new_v4(),
            idx: 0,
            trx: String::new(),
            server_id: Vec::new(),
            client_id: Vec::new(),
            message: None,
            values: ParamMap::new(),
        }
    }

    /// Prepare for the next message of the same session. The primary key is kept.
    pub fn reset(&mut self, idx: usize) {
        self.idx = idx;
        self.trx.clear();
        self.server_id.clear();
        self.client_id.clear();
        self.message = None;
        self.values.clear();
    }

    pub fn set_trx(&mut self, trx: &[u8]) {
        self.trx = String::from_utf8_lossy(trx).into_owned();
    }

    pub fn set_value(&mut self, key: &str, value: impl Into<SmlValue>) {
        self.values.insert(key.to_string(), Param::Value(value.into()));
    }

    /// Store `value` below `path`, creating intermediate maps as needed.
    ///
    /// Existing maps along the path are merged into, never replaced. A map
    /// stored at the leaf is merged with the one already there.
    pub fn set_nested(&mut self, path: &[String], value: Param) {
        let Some((leaf, parents)) = path.split_last() else {
            debug!("Ignoring value for empty path");
            return;
        };

        let mut map = &mut self.values;
        for key in parents {
            map = map
                .entry(key.clone())
                .or_insert_with(|| Param::Map(ParamMap::new()))
                .make_map(key);
        }

        if let Some(Param::Map(existing)) = map.get_mut(leaf) {
            if let Param::Map(nested) = value {
                merge_into(existing, nested);
                return;
            }
            warn!("Value at {} replaces a nested map", leaf);
        }
        map.insert(leaf.clone(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.values.get(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&SmlValue> {
        self.get(key).and_then(Param::as_value)
    }

    pub fn get_nested(&self, path: &[&str]) -> Option<&Param> {
        let (first, rest) = path.split_first()?;
        let mut current = self.values.get(*first)?;
        for key in rest {
            current = current.as_map()?.get(*key)?;
        }
        Some(current)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_set_nested_creates_maps() {
        let mut readout = Readout::new();
        readout.set_nested(&path(&["a", "b", "c"]), Param::Value(SmlValue::UInt8(1)));

        assert_eq!(
            readout.get_nested(&["a", "b", "c"]),
            Some(&Param::Value(SmlValue::UInt8(1)))
        );
        assert!(readout.get_nested(&["a", "b"]).unwrap().as_map().is_some());
        assert_eq!(readout.get_nested(&["a", "x"]), None);
    }

    #[test]
    fn test_set_nested_merges_siblings() {
        let mut readout = Readout::new();
        readout.set_nested(&path(&["a", "b"]), SmlValue::UInt8(1).into());
        readout.set_nested(&path(&["a", "c"]), SmlValue::UInt8(2).into());

        let a = readout.get("a").unwrap().as_map().unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a["b"], Param::Value(SmlValue::UInt8(1)));
        assert_eq!(a["c"], Param::Value(SmlValue::UInt8(2)));
    }

    #[test]
    fn test_set_nested_merges_leaf_maps() {
        let mut readout = Readout::new();
        let mut first = ParamMap::new();
        first.insert("x".into(), SmlValue::UInt8(1).into());
        let mut second = ParamMap::new();
        second.insert("y".into(), SmlValue::UInt8(2).into());

        readout.set_nested(&path(&["a"]), first.into());
        readout.set_nested(&path(&["a"]), second.into());

        assert_eq!(readout.get("a").unwrap().as_map().unwrap().len(), 2);
    }

    #[test]
    fn test_value_in_parent_position_becomes_map() {
        let mut readout = Readout::new();
        readout.set_value("a", SmlValue::UInt8(1));
        readout.set_nested(&path(&["a", "b"]), SmlValue::UInt8(2).into());
        assert_eq!(readout.get_nested(&["a", "b"]), Some(&Param::Value(SmlValue::UInt8(2))));
    }

    #[test]
    fn test_reset_keeps_pk() {
        let mut readout = Readout::new();
        let pk = readout.pk;
        readout.set_trx(b"1234");
        readout.server_id = vec![1, 2, 3];
        readout.set_value("k", SmlValue::Bool(true));

        readout.reset(3);
        assert_eq!(readout.pk, pk);
        assert_eq!(readout.idx, 3);
        assert!(readout.trx.is_empty());
        assert!(readout.server_id.is_empty());
        assert!(readout.values.is_empty());
    }

    #[test]
    fn test_to_json() {
        let mut readout = Readout::new();
        readout.set_trx(b"42");
        readout.server_id = vec![0x0a, 0x01];
        readout.set_nested(&path(&["0100010800ff", "value"]), SmlValue::UInt32(5).into());

        let json = readout.to_json();
        assert_eq!(json["trx"], "42");
        assert_eq!(json["serverId"], "0a01");
        assert_eq!(json["values"]["0100010800ff"]["value"], 5);
    }
}

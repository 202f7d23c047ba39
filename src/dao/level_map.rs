//! Serde adapter storing level-keyed maps with `level_N` keys, the layout the
//! `answers` field uses in player documents.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const LEVEL_KEY_PREFIX: &str = "level_";

/// Document key for a level number.
pub fn level_key(level: u32) -> String {
    format!("{LEVEL_KEY_PREFIX}{level}")
}

/// Parse a `level_N` key back into its level number.
pub fn parse_level_key(key: &str) -> Option<u32> {
    key.strip_prefix(LEVEL_KEY_PREFIX)?.parse().ok()
}

pub fn serialize<S, V>(value: &BTreeMap<u32, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let as_string = value
        .iter()
        .map(|(level, entry)| (level_key(*level), entry))
        .collect::<BTreeMap<_, _>>();
    as_string.serialize(serializer)
}

pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<u32, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    let raw = HashMap::<String, V>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, entry)| {
            parse_level_key(&key)
                .map(|level| (level, entry))
                .ok_or_else(|| serde::de::Error::custom(format!("invalid level key `{key}`")))
        })
        .collect()
}

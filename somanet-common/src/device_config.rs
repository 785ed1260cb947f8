//! JSON configuration carrying the PDO mapping.
//!
//! The UI configuration file holds more than the client core needs; the only
//! part read here is the `pdoMapping` object, two maps from PDO-index hex
//! strings to ordered lists of 32-bit mapping words, also as hex strings:
//!
//! ```json
//! {
//!   "pdoMapping": {
//!     "rx": { "0x1600": ["0x607A0020", "0x60400010"] },
//!     "tx": { "0x1A00": ["0x60640020", "0x60410010"] }
//!   }
//! }
//! ```
//!
//! Every other field in the file is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{de, Deserialize, Deserializer};
use snafu::{ResultExt, Snafu};

use crate::pdo::{PdoMappingEntry, PdoMappings};

/// Error returned when loading a configuration file
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// Reading the file failed
    #[snafu(display("IO error loading {path}: {source}"))]
    Io {
        /// Path of the file that could not be read
        path: String,
        /// The underlying IO error
        source: std::io::Error,
    },
    /// The file is not valid JSON or violates the schema
    #[snafu(display("error parsing JSON: {source}"))]
    JsonDeserialization {
        /// The underlying serde error
        source: serde_json::Error,
    },
}

/// The subset of the UI configuration consumed by the client core
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceConfig {
    #[serde(rename = "pdoMapping", default)]
    pdo_mapping: PdoMappingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PdoMappingConfig {
    #[serde(deserialize_with = "deserialize_hex_word_map", default)]
    rx: BTreeMap<u16, Vec<u32>>,
    #[serde(deserialize_with = "deserialize_hex_word_map", default)]
    tx: BTreeMap<u16, Vec<u32>>,
}

impl DeviceConfig {
    /// Read a configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<DeviceConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(IoSnafu {
            path: path.to_string_lossy(),
        })?;
        Self::load_from_str(&content)
    }

    /// Read a configuration from a string
    pub fn load_from_str(s: &str) -> Result<DeviceConfig, ConfigError> {
        serde_json::from_str(s).context(JsonDeserializationSnafu)
    }

    /// Flatten the configured maps into ordered Rx/Tx mapping entries
    ///
    /// PDO objects are visited in ascending index order, their words in list
    /// order, which is the layout of the process data frames.
    pub fn pdo_mappings(&self) -> PdoMappings {
        let flatten = |map: &BTreeMap<u16, Vec<u32>>| {
            map.iter()
                .flat_map(|(pdo_index, words)| {
                    words
                        .iter()
                        .map(|word| PdoMappingEntry::from_word(*pdo_index, *word))
                })
                .collect()
        };
        PdoMappings {
            rx: flatten(&self.pdo_mapping.rx),
            tx: flatten(&self.pdo_mapping.tx),
        }
    }
}

/// Parse a hex string with optional `0x` prefix into a u64
fn parse_hex(s: &str) -> Option<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).ok()
}

fn deserialize_hex_word_map<'de, D>(deserializer: D) -> Result<BTreeMap<u16, Vec<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let str_map = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
    let original_len = str_map.len();
    let mut data = BTreeMap::new();
    for (str_key, str_words) in str_map {
        let key: u16 = parse_hex(&str_key)
            .and_then(|v| v.try_into().ok())
            .ok_or_else(|| {
                de::Error::invalid_value(de::Unexpected::Str(&str_key), &"a 16-bit hex string")
            })?;
        let words = str_words
            .iter()
            .map(|word| {
                parse_hex(word).and_then(|v| v.try_into().ok()).ok_or_else(|| {
                    de::Error::invalid_value(de::Unexpected::Str(word), &"a 32-bit hex string")
                })
            })
            .collect::<Result<Vec<u32>, _>>()?;
        data.insert(key, words);
    }
    // multiple strings could parse to the same key, e.g. "0x1600" and "1600"
    if data.len() < original_len {
        return Err(de::Error::custom("detected duplicate PDO index"));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pdo_mapping() {
        let config = DeviceConfig::load_from_str(
            r#"{
                "pdoMapping": {
                    "rx": { "0x1600": ["0x607A0020", "0x60400010"] },
                    "tx": { "0x1A00": ["0x60640020"], "0x1A01": ["0x60410010"] }
                }
            }"#,
        )
        .unwrap();

        let mappings = config.pdo_mappings();
        assert_eq!(mappings.rx.len(), 2);
        assert_eq!(mappings.rx[0].pdo_index, 0x1600);
        assert_eq!(mappings.rx[0].index, 0x607A);
        assert_eq!(mappings.rx[0].bit_length, 0x20);
        assert_eq!(mappings.rx[1].index, 0x6040);

        // tx PDOs flatten in ascending index order
        assert_eq!(mappings.tx.len(), 2);
        assert_eq!(mappings.tx[0].pdo_index, 0x1A00);
        assert_eq!(mappings.tx[1].pdo_index, 0x1A01);
        assert_eq!(mappings.rx_frame_len(), 6);
    }

    #[test]
    fn ignores_unrelated_fields() {
        let config = DeviceConfig::load_from_str(
            r#"{
                "deviceName": "axis-0",
                "network": { "ip": "192.168.100.5" },
                "pdoMapping": { "rx": {}, "tx": {} }
            }"#,
        )
        .unwrap();
        assert!(config.pdo_mappings().rx.is_empty());
    }

    #[test]
    fn missing_mapping_yields_empty_config() {
        let config = DeviceConfig::load_from_str("{}").unwrap();
        assert!(config.pdo_mappings().rx.is_empty());
        assert!(config.pdo_mappings().tx.is_empty());
    }

    #[test]
    fn rejects_bad_hex_key() {
        let result = DeviceConfig::load_from_str(
            r#"{ "pdoMapping": { "rx": { "xyz": [] }, "tx": {} } }"#,
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("expected a 16-bit hex string"));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let result = DeviceConfig::load_from_str(
            r#"{ "pdoMapping": { "rx": { "0x1600": [], "1600": [] }, "tx": {} } }"#,
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("duplicate PDO index"));
    }
}

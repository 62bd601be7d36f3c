//! Known encryption schemes and keys
//!
//! A [`SchemeRegistry`] is built once and passed by reference into every
//! open call. It is never mutated afterwards, so one registry can be shared
//! between threads and archives.
//!
//! Registries load from JSON keyed by engine and then by game title:
//!
//! ```json
//! {
//!   "az": { "Title": { "index_key": 305419896, "isaac": true } },
//!   "catsystem": { "Title": "passphrase" },
//!   "cyberworks": { "Title": { "value1": 0, "value2": 255, "value3": 98,
//!                              "header_order": [0,1,2,3,4,5,6,7], "bell": false } },
//!   "jikkenshitsu": { "Title": "0123456789abcdef" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use vnarc_crypto::CryptoError;
use vnarc_crypto::sj_transform::MAX_KEY_SIZE;

const BUILTIN_SCHEMES: &str = include_str!("../data/schemes.json");

/// Registry loading failures
#[derive(Debug, Error)]
pub enum SchemeError {
    /// Malformed JSON
    #[error("Invalid scheme JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A key entry failed validation
    #[error("Invalid key for '{title}': {source}")]
    InvalidKey {
        /// Game title of the offending entry
        title: String,
        /// Underlying key error
        source: CryptoError,
    },

    /// AImage header order is not a permutation of 0..8
    #[error("Invalid AImage header order for '{0}'")]
    InvalidHeaderOrder(String),
}

/// AZ System archive keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzScheme {
    /// XOR-rotate key of the header and index
    pub index_key: u32,
    /// Entry key; derived from `sysenv.tbl` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_key: Option<u32>,
    /// Entries use the ISAAC-64 keystream instead of XOR-rotate
    #[serde(default)]
    pub isaac: bool,
    /// Key of `.asb` scripts in plain archives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_key: Option<u32>,
}

/// Cyberworks AImage parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AImageScheme {
    /// XOR mask of the color and alpha streams
    pub value1: u8,
    /// Alpha of freshly coded pixels
    pub value2: u8,
    /// Leading type byte of image entries
    pub value3: u8,
    /// Physical header slot of each logical field
    pub header_order: [u8; 8],
    /// TOC uses the inverted TinkerBell LZSS
    #[serde(default)]
    pub bell: bool,
}

impl AImageScheme {
    fn header_order_is_permutation(&self) -> bool {
        let mut seen = [false; 8];
        self.header_order.iter().all(|&slot| {
            let slot = usize::from(slot);
            slot < 8 && !std::mem::replace(&mut seen[slot], true)
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SchemeFile {
    az: BTreeMap<String, AzScheme>,
    catsystem: BTreeMap<String, String>,
    cyberworks: BTreeMap<String, AImageScheme>,
    jikkenshitsu: BTreeMap<String, String>,
}

/// Read-only table of per-title keys and schemes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemeRegistry {
    az: BTreeMap<String, AzScheme>,
    catsystem: BTreeMap<String, String>,
    cyberworks: BTreeMap<String, AImageScheme>,
    jikkenshitsu: BTreeMap<String, Vec<u8>>,
}

impl SchemeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the compiled-in schemes
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_SCHEMES).unwrap_or_default()
    }

    /// Parse a registry from JSON
    pub fn from_json(json: &str) -> Result<Self, SchemeError> {
        let file: SchemeFile = serde_json::from_str(json)?;

        for (title, scheme) in &file.cyberworks {
            if !scheme.header_order_is_permutation() {
                return Err(SchemeError::InvalidHeaderOrder(title.clone()));
            }
        }

        let mut jikkenshitsu = BTreeMap::new();
        for (title, key) in file.jikkenshitsu {
            let bytes = hex::decode(key.trim()).map_err(|e| SchemeError::InvalidKey {
                title: title.clone(),
                source: e.into(),
            })?;
            if bytes.is_empty() {
                return Err(SchemeError::InvalidKey {
                    title,
                    source: CryptoError::EmptyKey,
                });
            }
            if bytes.len() > MAX_KEY_SIZE {
                return Err(SchemeError::InvalidKey {
                    title,
                    source: CryptoError::InvalidKeySize {
                        max: MAX_KEY_SIZE,
                        actual: bytes.len(),
                    },
                });
            }
            jikkenshitsu.insert(title, bytes);
        }

        Ok(Self {
            az: file.az,
            catsystem: file.catsystem,
            cyberworks: file.cyberworks,
            jikkenshitsu,
        })
    }

    /// Add an AZ scheme
    #[must_use]
    pub fn with_az(mut self, title: impl Into<String>, scheme: AzScheme) -> Self {
        self.az.insert(title.into(), scheme);
        self
    }

    /// Add a CatSystem2 INT passphrase
    #[must_use]
    pub fn with_catsystem(mut self, title: impl Into<String>, passphrase: impl Into<String>) -> Self {
        self.catsystem.insert(title.into(), passphrase.into());
        self
    }

    /// Add a Cyberworks AImage scheme
    #[must_use]
    pub fn with_cyberworks(mut self, title: impl Into<String>, scheme: AImageScheme) -> Self {
        self.cyberworks.insert(title.into(), scheme);
        self
    }

    /// Add a Studio Jikkenshitsu key
    #[must_use]
    pub fn with_sj_key(mut self, title: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        self.jikkenshitsu.insert(title.into(), key.into());
        self
    }

    /// All AZ schemes in title order
    pub fn az_schemes(&self) -> impl Iterator<Item = (&str, &AzScheme)> {
        self.az.iter().map(|(title, scheme)| (title.as_str(), scheme))
    }

    /// AZ scheme of one title
    pub fn az_scheme(&self, title: &str) -> Option<&AzScheme> {
        self.az.get(title)
    }

    /// CatSystem2 passphrase of one title
    pub fn catsystem_passphrase(&self, title: &str) -> Option<&str> {
        self.catsystem.get(title).map(String::as_str)
    }

    /// Cyberworks scheme of one title
    pub fn cyberworks_scheme(&self, title: &str) -> Option<&AImageScheme> {
        self.cyberworks.get(title)
    }

    /// All Cyberworks schemes in title order
    pub fn cyberworks_schemes(&self) -> impl Iterator<Item = (&str, &AImageScheme)> {
        self.cyberworks
            .iter()
            .map(|(title, scheme)| (title.as_str(), scheme))
    }

    /// All Studio Jikkenshitsu keys in title order
    pub fn sj_keys(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.jikkenshitsu
            .iter()
            .map(|(title, key)| (title.as_str(), key.as_slice()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "az": {
                "B": { "index_key": 2, "isaac": true },
                "A": { "index_key": 1, "content_key": 7, "script_key": 9 }
            },
            "catsystem": { "Title": "pass" },
            "jikkenshitsu": { "SJ": "6a696b6b656e" }
        }"#;
        let registry = SchemeRegistry::from_json(json).unwrap();

        let titles: Vec<_> = registry.az_schemes().map(|(t, _)| t).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(
            registry.az_scheme("A"),
            Some(&AzScheme {
                index_key: 1,
                content_key: Some(7),
                isaac: false,
                script_key: Some(9),
            })
        );
        assert!(registry.az_scheme("B").unwrap().isaac);
        assert_eq!(registry.catsystem_passphrase("Title"), Some("pass"));
        assert_eq!(registry.catsystem_passphrase("Other"), None);
        let keys: Vec<_> = registry.sj_keys().collect();
        assert_eq!(keys, [("SJ", &b"jikken"[..])]);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(
            SchemeRegistry::from_json(r#"{ "jikkenshitsu": { "x": "zz" } }"#),
            Err(SchemeError::InvalidKey { .. })
        ));
        assert!(matches!(
            SchemeRegistry::from_json(r#"{ "jikkenshitsu": { "x": "" } }"#),
            Err(SchemeError::InvalidKey {
                source: CryptoError::EmptyKey,
                ..
            })
        ));
        let long = format!(r#"{{ "jikkenshitsu": {{ "x": "{}" }} }}"#, "00".repeat(17));
        assert!(SchemeRegistry::from_json(&long).is_err());
        assert!(matches!(
            SchemeRegistry::from_json("{"),
            Err(SchemeError::Json(_))
        ));
    }

    #[test]
    fn test_rejects_bad_header_order() {
        let json = r#"{ "cyberworks": { "x": {
            "value1": 0, "value2": 0, "value3": 0,
            "header_order": [0, 0, 2, 3, 4, 5, 6, 7]
        } } }"#;
        assert!(matches!(
            SchemeRegistry::from_json(json),
            Err(SchemeError::InvalidHeaderOrder(_))
        ));
    }

    #[test]
    fn test_builtin_parses() {
        let registry = SchemeRegistry::builtin();
        assert!(registry.az_schemes().next().is_some());
        assert!(registry.cyberworks_scheme("Cyberworks default").is_some());
        assert_eq!(SchemeRegistry::from_json(BUILTIN_SCHEMES).unwrap(), registry);
    }

    #[test]
    fn test_builders() {
        let registry = SchemeRegistry::new()
            .with_catsystem("t", "p")
            .with_sj_key("s", vec![1, 2]);
        assert_eq!(registry.catsystem_passphrase("t"), Some("p"));
        assert_eq!(registry.sj_keys().count(), 1);
    }
}

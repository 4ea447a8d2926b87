// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use ed25519_dalek::VerifyingKey;
use serde::Deserialize;

use crate::config::consts::{DEFAULT_LENIENT, DEFAULT_MAX_CONTENT_SIZE, KEY_MATERIAL_LEN};
use crate::crypto::{KeyMaterial, KeyStore};
use crate::engine::{ConverterSettings, Modification};
use crate::errors::ConfigError;
use crate::observability::messages::validation::ConfigLoaded;
use crate::observability::messages::StructuredLog;

/// Complete configuration of a converter/modifier runtime.
///
/// Every section is optional; an empty document yields a lenient converter with
/// no keys and no modifications.
///
/// # Example
/// ```yaml
/// conversion:
///   lenient: false
///   max_content_size: 1048576
///   activated_protocols: [ldap]
/// keys:
///   - name: api-hmac
///     kind: hmac
///     secret: "73656372657420"
///   - name: transport
///     kind: symmetric
///     key: "0101010101010101010101010101010101010101010101010101010101010101"
///     key_id: "0909090909090909090909090909090909090909090909090909090909090909"
/// modifications:
///   - name: swap-host
///     target: "$.header.Host"
///     replace_with: "staging.internal"
///     condition: "$.method == 'GET'"
///     remaining_executions: 5
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub keys: Vec<KeyConfig>,
    #[serde(default)]
    pub modifications: Vec<ModificationConfig>,
}

impl Config {
    /// Decode every configured key. Fails on the first malformed entry.
    pub fn key_store(&self) -> Result<KeyStore, ConfigError> {
        let mut store = KeyStore::new();
        for key in &self.keys {
            store.insert(key.name.clone(), key.material()?);
        }
        Ok(store)
    }

    pub fn modifications(&self) -> Vec<Modification> {
        self.modifications.iter().map(ModificationConfig::to_modification).collect()
    }
}

/// Converter switches.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "default_lenient")]
    pub lenient: bool,
    #[serde(default = "default_max_content_size")]
    pub max_content_size: usize,
    #[serde(default)]
    pub activated_protocols: Vec<String>,
}

fn default_lenient() -> bool {
    DEFAULT_LENIENT
}

fn default_max_content_size() -> usize {
    DEFAULT_MAX_CONTENT_SIZE
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            lenient: DEFAULT_LENIENT,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            activated_protocols: Vec::new(),
        }
    }
}

impl ConversionConfig {
    pub fn settings(&self) -> ConverterSettings {
        ConverterSettings {
            lenient: self.lenient,
            max_content_size: self.max_content_size,
            activated_protocols: self.activated_protocols.iter().cloned().collect::<HashSet<_>>(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Hmac,
    Ed25519,
    X25519,
    Symmetric,
}

/// One named key. Binary material is hex encoded; which fields are required
/// depends on `kind`:
///
/// * `hmac` - `secret`
/// * `ed25519` - `private_key`, or `public_key` for verification only
/// * `x25519` - `private_key`
/// * `symmetric` - `key`, optionally `key_id`
#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    pub name: String,
    pub kind: KeyKind,
    pub secret: Option<String>,
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub key: Option<String>,
    pub key_id: Option<String>,
}

impl KeyConfig {
    pub fn material(&self) -> Result<KeyMaterial, ConfigError> {
        match self.kind {
            KeyKind::Hmac => Ok(KeyMaterial::Hmac(self.decode("secret", &self.secret)?)),
            KeyKind::Ed25519 => match (&self.private_key, &self.public_key) {
                (Some(_), _) => Ok(KeyMaterial::ed25519_signing(
                    self.fixed("private_key", &self.private_key)?,
                )),
                (None, Some(_)) => {
                    let public = self.fixed("public_key", &self.public_key)?;
                    let verifying = VerifyingKey::from_bytes(&public)
                        .map_err(|e| self.invalid(format!("public_key: {}", e)))?;
                    Ok(KeyMaterial::Ed25519 {
                        signing: None,
                        verifying,
                    })
                }
                (None, None) => Err(self.invalid("needs private_key or public_key")),
            },
            KeyKind::X25519 => Ok(KeyMaterial::x25519(
                self.fixed("private_key", &self.private_key)?,
            )),
            KeyKind::Symmetric => Ok(KeyMaterial::Symmetric {
                key: self.fixed("key", &self.key)?,
                key_id: match &self.key_id {
                    Some(_) => Some(self.fixed("key_id", &self.key_id)?),
                    None => None,
                },
            }),
        }
    }

    fn decode(&self, field: &str, value: &Option<String>) -> Result<Vec<u8>, ConfigError> {
        let value = value
            .as_deref()
            .ok_or_else(|| self.invalid(format!("missing {}", field)))?;
        hex::decode(value.trim()).map_err(|e| self.invalid(format!("{}: {}", field, e)))
    }

    fn fixed(
        &self,
        field: &str,
        value: &Option<String>,
    ) -> Result<[u8; KEY_MATERIAL_LEN], ConfigError> {
        let bytes = self.decode(field, value)?;
        <[u8; KEY_MATERIAL_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
            self.invalid(format!(
                "{} must be {} bytes, got {}",
                field,
                KEY_MATERIAL_LEN,
                bytes.len()
            ))
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidKey {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// A modification as written in the configuration file. Without a name the
/// registry generates one.
#[derive(Debug, Clone, Deserialize)]
pub struct ModificationConfig {
    pub name: Option<String>,
    pub target: String,
    pub regex_filter: Option<String>,
    pub replace_with: String,
    pub condition: Option<String>,
    pub remaining_executions: Option<u32>,
}

impl ModificationConfig {
    pub fn to_modification(&self) -> Modification {
        let mut modification = Modification::new(self.target.clone(), self.replace_with.clone());
        if let Some(name) = &self.name {
            modification = modification.named(name.clone());
        }
        modification.regex_filter = self.regex_filter.clone();
        modification.condition = self.condition.clone();
        modification.remaining_executions = self.remaining_executions;
        modification
    }
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path.as_ref())?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    ConfigLoaded {
        path: &path.as_ref().display().to_string(),
        keys: cfg.keys.len(),
        modifications: cfg.modifications.len(),
    }
    .log();
    Ok(cfg)
}

/// Load a config from a YAML file and check that every key decodes and every
/// modification can be registered.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();

        assert!(cfg.conversion.lenient);
        assert_eq!(cfg.conversion.max_content_size, DEFAULT_MAX_CONTENT_SIZE);
        assert!(cfg.keys.is_empty());
        assert!(cfg.modifications.is_empty());
    }

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
conversion:
  lenient: false
  activated_protocols: [ldap]
keys:
  - name: hs
    kind: hmac
    secret: "736563726574"
modifications:
  - name: host
    target: "$.header.Host"
    replace_with: "example.org"
    remaining_executions: 2
  - target: "$.body"
    regex_filter: "a+"
    replace_with: "b"
"#;

        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let settings = cfg.conversion.settings();
        assert!(!settings.lenient);
        assert!(settings.activated_protocols.contains("ldap"));
        assert_eq!(cfg.keys[0].kind, KeyKind::Hmac);

        let modifications = cfg.modifications();
        assert_eq!(modifications[0].name, "host");
        assert_eq!(modifications[0].remaining_executions, Some(2));
        assert_eq!(modifications[1].regex_filter.as_deref(), Some("a+"));
        assert!(!modifications[1].name.is_empty());
    }

    #[test]
    fn test_key_material_decoding() {
        struct TestCase {
            name: &'static str,
            yaml: &'static str,
            kind: Option<&'static str>,
        }

        let test_cases = vec![
            TestCase {
                name: "hmac secret",
                yaml: "{name: k, kind: hmac, secret: '6b6579'}",
                kind: Some("hmac"),
            },
            TestCase {
                name: "ed25519 signing key",
                yaml: "{name: k, kind: ed25519, private_key: '0303030303030303030303030303030303030303030303030303030303030303'}",
                kind: Some("ed25519"),
            },
            TestCase {
                name: "x25519 secret",
                yaml: "{name: k, kind: x25519, private_key: '0707070707070707070707070707070707070707070707070707070707070707'}",
                kind: Some("x25519"),
            },
            TestCase {
                name: "symmetric without key id",
                yaml: "{name: k, kind: symmetric, key: '0101010101010101010101010101010101010101010101010101010101010101'}",
                kind: Some("symmetric"),
            },
            TestCase {
                name: "missing secret",
                yaml: "{name: k, kind: hmac}",
                kind: None,
            },
            TestCase {
                name: "short symmetric key",
                yaml: "{name: k, kind: symmetric, key: '0101'}",
                kind: None,
            },
            TestCase {
                name: "not hex",
                yaml: "{name: k, kind: x25519, private_key: 'zz'}",
                kind: None,
            },
            TestCase {
                name: "ed25519 without either half",
                yaml: "{name: k, kind: ed25519}",
                kind: None,
            },
        ];

        for test_case in test_cases {
            let key: KeyConfig = serde_yaml::from_str(test_case.yaml).unwrap();
            match (key.material(), test_case.kind) {
                (Ok(material), Some(kind)) => {
                    assert_eq!(material.kind(), kind, "{}", test_case.name)
                }
                (Err(ConfigError::InvalidKey { name, .. }), None) => {
                    assert_eq!(name, "k", "{}", test_case.name)
                }
                (other, _) => panic!("{}: unexpected {:?}", test_case.name, other.map(|m| m.kind())),
            }
        }
    }

    #[test]
    fn test_ed25519_public_key_only_cannot_sign() {
        let signing = ed25519_dalek::SigningKey::from_bytes(&[5u8; 32]);
        let yaml = format!(
            "{{name: verifier, kind: ed25519, public_key: '{}'}}",
            hex::encode(signing.verifying_key().as_bytes())
        );
        let key: KeyConfig = serde_yaml::from_str(&yaml).unwrap();

        match key.material().unwrap() {
            KeyMaterial::Ed25519 { signing, .. } => assert!(signing.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }
}

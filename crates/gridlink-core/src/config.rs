//! Process configuration.
//!
//! One read-only JSON document loaded at startup. Relative paths
//! (certificates, keys) resolve against the directory containing the
//! configuration file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CoreError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub messaging: MessagingConfig,
    pub sge: SgeConfig,
    pub db: DbConfig,
    pub streams: StreamsConfig,
    pub logs_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Base URL of the messaging gateway fronting the proxy.
    pub gateway_url: String,
    /// Bare identity under which the proxy binds.
    pub jid: String,
    pub password: String,
    /// Address the command surface listens on, e.g. `127.0.0.1:5280`.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:5280".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SgeEnvironment {
    Production,
    Homologation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SgeConfig {
    pub login: String,
    pub contract_id: String,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub environment: SgeEnvironment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecryptionKey {
    /// Hex-encoded 16-byte initialization vector.
    pub iv: String,
    /// Hex-encoded 16-byte AES-128 key.
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamsConfig {
    pub inbox_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub errors_dir: PathBuf,
    /// Ordered key pairs; decryption tries them in order to support
    /// key rotation.
    pub keys: Vec<DecryptionKey>,
    #[serde(default = "default_record_rate")]
    pub record_rate: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_record_rate() -> u32 {
    100
}

fn default_chunk_size() -> usize {
    1000
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::configuration(format!("{}: {e}", path.display())))?;
        let mut config: Config = serde_json::from_str(&raw)
            .map_err(|e| CoreError::configuration(format!("{}: {e}", path.display())))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.sge.certificate = absolutize(base, &config.sge.certificate);
        config.sge.private_key = absolutize(base, &config.sge.private_key);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.streams.keys.is_empty() {
            return Err(CoreError::configuration(
                "streams.keys must list at least one decryption key pair",
            ));
        }
        for (i, key) in self.streams.keys.iter().enumerate() {
            for (field, value) in [("iv", &key.iv), ("key", &key.key)] {
                if hex::decode_len(value).is_err() {
                    return Err(CoreError::configuration(format!(
                        "streams.keys[{i}].{field} is not valid hex"
                    )));
                }
            }
        }
        if self.streams.record_rate == 0 {
            return Err(CoreError::configuration("streams.record_rate must be > 0"));
        }
        Ok(())
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

mod hex {
    /// Cheap hex sanity check without pulling the decoder in here;
    /// the streams crate does the real decode.
    pub fn decode_len(s: &str) -> Result<usize, ()> {
        if s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(s.len() / 2)
        } else {
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "messaging": {
            "gateway_url": "http://127.0.0.1:8600",
            "jid": "proxy@gridlink.lit",
            "password": "secret"
        },
        "sge": {
            "login": "proxy@example.com",
            "contract_id": "1111111",
            "certificate": "certs/client.pem",
            "private_key": "certs/client.key",
            "environment": "homologation"
        },
        "db": { "url": "postgresql://gridlink@127.0.0.1:5433/gridlink" },
        "streams": {
            "inbox_dir": "/var/lib/gridlink/inbox",
            "archive_dir": "/var/lib/gridlink/archive",
            "errors_dir": "/var/lib/gridlink/errors",
            "keys": [ { "iv": "000102030405060708090a0b0c0d0e0f",
                        "key": "f0e0d0c0b0a090807060504030201000" } ]
        },
        "logs_dir": "/var/log/gridlink"
    }"#;

    #[test]
    fn loads_and_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridlink.conf.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sge.certificate, dir.path().join("certs/client.pem"));
        assert_eq!(config.sge.environment, SgeEnvironment::Homologation);
        assert_eq!(config.streams.record_rate, 100);
        assert_eq!(config.streams.chunk_size, 1000);
    }

    #[test]
    fn rejects_bad_key_material() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.streams.keys[0].iv = "not-hex".to_string();
        assert!(config.validate().is_err());
    }
}

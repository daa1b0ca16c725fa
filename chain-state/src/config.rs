//! Configuration for the chain state

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Chain state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the on-disk layout (`database/` lives below it)
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            service_name: "chain-state".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            storage: StorageConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// fsync the block log after every persisted block
    pub sync_on_persist: bool,

    /// Recompute each replayed block's hash and compare with the recorded key
    pub verify_block_hashes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sync_on_persist: true,
            verify_block_hashes: true,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::Error::Config(format!("{name}: expected a boolean, got {other:?}"))),
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("CHAIN_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(value) = std::env::var("CHAIN_VERIFY_HASHES") {
            config.storage.verify_block_hashes = parse_bool("CHAIN_VERIFY_HASHES", &value)?;
        }

        if let Ok(value) = std::env::var("CHAIN_SYNC_ON_PERSIST") {
            config.storage.sync_on_persist = parse_bool("CHAIN_SYNC_ON_PERSIST", &value)?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "chain-state");
        assert!(config.storage.verify_block_hashes);
        assert!(config.storage.sync_on_persist);
        assert_eq!(config.actor.mailbox_capacity, 1024);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.toml");
        std::fs::write(
            &path,
            "data_dir = \"/var/lib/tbb\"\n\n[storage]\nverify_block_hashes = false\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/tbb"));
        assert!(!config.storage.verify_block_hashes);
        assert!(config.storage.sync_on_persist);
        assert_eq!(config.actor.mailbox_capacity, 1024);
    }

    #[test]
    fn test_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.toml");
        std::fs::write(&path, "data_dir = [").unwrap();

        assert!(matches!(Config::from_file(&path), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}

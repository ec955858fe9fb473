//! Configuration system for the MeshSeal CLI.

use meshseal_crypto::NodeAddress;
use meshseal_crypto::kdf::DEFAULT_ROTATION_PERIOD_SECS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

/// MeshSeal configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Key material configuration
    #[serde(default)]
    pub keys: KeysConfig,
    /// Local node configuration
    #[serde(default)]
    pub node: NodeConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key material configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Master key file (64 hex characters or 32 raw bytes)
    #[serde(default = "default_master_key_path")]
    pub master_key_file: PathBuf,
    /// Session key lifetime in seconds
    #[serde(default = "default_rotation_period")]
    pub rotation_period_secs: u64,
}

/// Local node configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Sender address used for nonce derivation (`aa:bb:cc:dd:ee:ff`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_master_key_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("meshseal/master.key")
}

fn default_rotation_period() -> u64 {
    DEFAULT_ROTATION_PERIOD_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            master_key_file: default_master_key_path(),
            rotation_period_secs: default_rotation_period(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("meshseal/config.toml")
    }

    /// Load config from default path, or use built-in defaults if it doesn't exist
    ///
    /// Nothing is written to disk; see [`Config::save`] for that.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config cannot be read or parsed.
    pub fn load_or_default() -> anyhow::Result<Self> {
        Self::load_or_default_from(&Self::default_path())
    }

    /// Load config from `path`, or use built-in defaults if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config cannot be read or parsed.
    pub fn load_or_default_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Rotation period as a non-zero duration in seconds
    ///
    /// # Errors
    ///
    /// Returns an error if the period is zero.
    pub fn rotation_period(&self) -> anyhow::Result<NonZeroU64> {
        NonZeroU64::new(self.keys.rotation_period_secs)
            .ok_or_else(|| anyhow::anyhow!("Rotation period must be greater than zero"))
    }

    /// Parse the configured node address, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not six colon-separated hex bytes.
    pub fn node_address(&self) -> anyhow::Result<Option<NodeAddress>> {
        self.node
            .address
            .as_deref()
            .map(|addr| addr.parse::<NodeAddress>())
            .transpose()
            .map_err(Into::into)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.rotation_period()?;

        if let Some(address) = self.node_address()? {
            if address.is_broadcast() || address.is_zero() {
                anyhow::bail!("Node address {address} cannot be used as a sender address");
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.keys.rotation_period_secs, 86_400);
        assert!(config.keys.master_key_file.ends_with("meshseal/master.key"));
        assert!(config.node.address.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.keys.rotation_period_secs = 0;
        assert!(config.validate().is_err());

        config.keys.rotation_period_secs = 3600;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_node_address_validation() {
        let mut config = Config::default();

        config.node.address = Some("24:6f:28:aa:bb:cc".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.node_address().unwrap().unwrap().to_string(),
            "24:6f:28:aa:bb:cc"
        );

        config.node.address = Some("ff:ff:ff:ff:ff:ff".to_string());
        assert!(config.validate().is_err());

        config.node.address = Some("not-an-address".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[node]\naddress = \"02:00:00:00:00:01\"\n").unwrap();
        assert_eq!(config.keys.rotation_period_secs, DEFAULT_ROTATION_PERIOD_SECS);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.node.address.as_deref(), Some("02:00:00:00:00:01"));
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = Config::default();
        config.node.address = Some("02:00:00:00:00:01".to_string());

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.keys.master_key_file, deserialized.keys.master_key_file);
        assert_eq!(config.node.address, deserialized.node.address);
    }

    #[test]
    fn test_missing_config_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meshseal/config.toml");

        let config = Config::load_or_default_from(&path).unwrap();
        assert_eq!(config.keys.rotation_period_secs, DEFAULT_ROTATION_PERIOD_SECS);
        assert!(!path.exists());
        assert!(!dir.path().join("meshseal").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_config_under_read_only_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();

        let result = Config::load_or_default_from(&dir.path().join("config.toml"));

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_existing_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = Config::load_or_default_from(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.keys.rotation_period_secs = 3600;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.keys.rotation_period_secs, 3600);
    }
}

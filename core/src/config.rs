// ABOUTME: Bridge configuration loaded from defaults, an optional file and NIP55_* environment variables
// ABOUTME: Holds the wire constants (scheme, request code) and persistence keys shared by all components

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// URI scheme external signers register for
    pub scheme: String,
    /// Request code used to recognise our own interactive completions
    pub request_code: i32,
    pub prefs_namespace: String,
    pub package_key: String,
    /// Upper bound for one silent query, on top of the platform's own timeout
    pub silent_timeout_ms: u64,
    /// Dispatch non-login operations to the OS chooser when no signer is recorded
    pub unaddressed_fallback: bool,
    pub channel_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            scheme: "nostrsigner".to_string(),
            request_code: 1001,
            prefs_namespace: "amber_signer_prefs".to_string(),
            package_key: "signer_package_name".to_string(),
            silent_timeout_ms: 5_000,
            unaddressed_fallback: false,
            channel_name: "com.example.sloth/amber_signer".to_string(),
        }
    }
}

impl BridgeConfig {
    pub const ENV_PREFIX: &'static str = "NIP55";

    /// Defaults, then `path` if given and present, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config: BridgeConfig = builder
            .add_source(Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheme.is_empty() || self.scheme.contains(':') {
            return Err(ConfigError::Invalid(format!("scheme {:?}", self.scheme)));
        }
        if self.prefs_namespace.is_empty() || self.package_key.is_empty() {
            return Err(ConfigError::Invalid("empty signer directory key".into()));
        }
        if self.silent_timeout_ms == 0 {
            return Err(ConfigError::Invalid("silent_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn silent_timeout(&self) -> Duration {
        Duration::from_millis(self.silent_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_the_wire_protocol() {
        let config = BridgeConfig::default();
        assert_eq!(config.scheme, "nostrsigner");
        assert_eq!(config.request_code, 1001);
        assert_eq!(config.silent_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("nip55-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bridge.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "request_code = 77\nunaddressed_fallback = true").unwrap();

        let config = BridgeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.request_code, 77);
        assert!(config.unaddressed_fallback);
        assert_eq!(config.scheme, "nostrsigner");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = BridgeConfig::load(Some(Path::new("/nonexistent/bridge.toml"))).unwrap();
        assert_eq!(config.prefs_namespace, "amber_signer_prefs");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = BridgeConfig {
            silent_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

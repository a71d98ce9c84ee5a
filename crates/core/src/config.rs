//! Adapter configuration
//!
//! [`AdapterConfig`] is the constructor input of a filesystem adapter. It can
//! be built in code or loaded from a TOML file through [`ConfigManager`]:
//!
//! ```toml
//! schema_version = 1
//!
//! [adapter]
//! region = "us-east-1"
//! bucket = "assets"
//! prefix = "myapp"
//! endpoint = "http://localhost:9000"
//! force_path_style = true
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Retry policy handed to the backend client
///
/// The adapter never retries by itself; these values configure the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeouts handed to the backend client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// Everything needed to construct an adapter; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Backend region
    pub region: String,

    /// Bucket holding the data
    pub bucket: String,

    /// Access key ID; omit to use ambient credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Secret access key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Namespace prepended to every key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,

    /// Custom endpoint URL for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Use path-style instead of virtual-hosted addressing
    #[serde(default)]
    pub force_path_style: bool,

    /// Retry configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

impl AdapterConfig {
    /// Create a config with the two required fields
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            bucket: bucket.into(),
            access_key: None,
            secret_key: None,
            session_token: None,
            prefix: String::new(),
            endpoint: None,
            force_path_style: false,
            retry: None,
            timeout: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Static credentials, if both halves are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Get the effective retry configuration
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }

    /// Check the config for values the backend would reject
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::Config("region cannot be empty".into()));
        }
        if self.bucket.trim().is_empty() {
            return Err(Error::Config("bucket cannot be empty".into()));
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(Error::Config(
                "access_key and secret_key must be set together".into(),
            ));
        }
        if self.session_token.is_some() && self.access_key.is_none() {
            return Err(Error::Config(
                "session_token requires access_key and secret_key".into(),
            ));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)?;
        }
        Ok(())
    }
}

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Adapter settings
    pub adapter: AdapterConfig,
}

impl Config {
    pub fn new(adapter: AdapterConfig) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            adapter,
        }
    }
}

/// Loads and saves the configuration file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager for `<config dir>/bucketfs/config.toml`
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("bucketfs").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load and validate the configuration
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {}",
                self.config_path.display()
            )));
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.adapter.validate()?;
        tracing::debug!(path = %self.config_path.display(), bucket = %config.adapter.bucket, "loaded configuration");
        Ok(config)
    }

    /// Load only the adapter section
    pub fn load_adapter(&self) -> Result<AdapterConfig> {
        Ok(self.load()?.adapter)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if needed. On Unix the file is made
    /// owner-only (0600) since it may contain secrets.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    #[test]
    fn test_adapter_config_defaults() {
        let config = AdapterConfig::new("us-east-1", "assets");
        assert_eq!(config.prefix, "");
        assert!(config.endpoint.is_none());
        assert!(!config.force_path_style);
        assert!(config.static_credentials().is_none());
        assert_eq!(config.retry_config(), RetryConfig::default());
        assert_eq!(config.timeout_config().connect_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = AdapterConfig::new("eu-west-1", "assets")
            .with_prefix("myapp/")
            .with_endpoint("http://localhost:9000")
            .with_credentials("ak", "sk")
            .with_session_token("token")
            .with_path_style(true);

        assert_eq!(config.prefix, "myapp/");
        assert_eq!(config.static_credentials(), Some(("ak", "sk")));
        assert_eq!(config.session_token.as_deref(), Some("token"));
        assert!(config.force_path_style);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AdapterConfig::new("", "b").validate().is_err());
        assert!(AdapterConfig::new("r", " ").validate().is_err());

        let mut half_credentials = AdapterConfig::new("r", "b");
        half_credentials.access_key = Some("ak".into());
        assert!(matches!(half_credentials.validate(), Err(Error::Config(_))));

        let token_only = AdapterConfig::new("r", "b").with_session_token("t");
        assert!(token_only.validate().is_err());

        let bad_endpoint = AdapterConfig::new("r", "b").with_endpoint("not a url");
        assert!(matches!(bad_endpoint.validate(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let (manager, _temp_dir) = temp_config_manager();
        assert!(matches!(manager.load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let adapter = AdapterConfig::new("us-east-1", "assets")
            .with_prefix("myapp")
            .with_endpoint("http://localhost:9000")
            .with_path_style(true)
            .with_retry(RetryConfig {
                max_attempts: 5,
                ..Default::default()
            });
        manager.save(&Config::new(adapter.clone())).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
        assert_eq!(loaded.adapter, adapter);
        assert_eq!(manager.load_adapter().unwrap().retry_config().max_attempts, 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (manager, _temp_dir) = temp_config_manager();
        let adapter = AdapterConfig::new("us-east-1", "assets").with_credentials("ak", "sk");
        manager.save(&Config::new(adapter)).unwrap();

        let mode = std::fs::metadata(manager.config_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_minimal_toml() {
        let (manager, _temp_dir) = temp_config_manager();
        let content = r#"
            schema_version = 1

            [adapter]
            region = "us-east-1"
            bucket = "assets"
        "#;
        std::fs::write(manager.config_path(), content).unwrap();

        let adapter = manager.load_adapter().unwrap();
        assert_eq!(adapter, AdapterConfig::new("us-east-1", "assets"));
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!(
            r#"
            schema_version = {}

            [adapter]
            region = "us-east-1"
            bucket = "assets"
            "#,
            SCHEMA_VERSION + 1
        );
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("newer than supported"));
    }
}

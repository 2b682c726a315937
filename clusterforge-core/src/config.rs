//! Configuration management for clusterforge
//!
//! Settings are loaded from, in increasing priority:
//! 1. Default values
//! 2. Configuration file (TOML format)
//! 3. Environment variables
//!
//! Configuration is read once at startup and never reloaded.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Provider names the registry knows how to build
pub const KNOWN_PROVIDERS: &[&str] = &["aws", "azure", "gcp", "docker"];

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Control-plane connection
    pub control_plane: ControlPlaneConfig,
    /// Per-operation request ceilings
    pub timeouts: TimeoutConfig,
    /// Provider defaults
    pub providers: ProvidersConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Control-plane connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Disable to run without a backend (validation and metadata only)
    pub enabled: bool,
    /// Namespace holding every managed cluster
    pub namespace: String,
    /// Kubeconfig file; in-cluster or default discovery when unset
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to select
    pub context: Option<String>,
    /// API server URL, used together with `api_token`
    pub api_server: Option<String>,
    /// Bearer credential for `api_server`
    pub api_token: Option<String>,
}

impl std::fmt::Debug for ControlPlaneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneConfig")
            .field("enabled", &self.enabled)
            .field("namespace", &self.namespace)
            .field("kubeconfig", &self.kubeconfig)
            .field("context", &self.context)
            .field("api_server", &self.api_server)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request ceilings in seconds, applied on top of any caller deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub create_secs: u64,
    pub delete_secs: u64,
    pub scale_secs: u64,
    pub read_secs: u64,
}

/// Provider defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider used when neither the request nor the template names one
    pub default_provider: String,
    pub aws: AwsConfig,
    pub azure: AzureConfig,
    pub gcp: GcpConfig,
    pub docker: DockerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub default_region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub default_location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    pub default_region: String,
    /// Project used when a request does not name one
    pub default_project: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit console output as JSON
    pub json: bool,
    /// Enable file logging
    pub file_logging_enabled: bool,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Log file prefix
    pub file_prefix: String,
    /// File rotation: hourly, daily or never
    pub rotation: String,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "default".to_string(),
            kubeconfig: None,
            context: None,
            api_server: None,
            api_token: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            create_secs: 180,
            delete_secs: 660,
            scale_secs: 60,
            read_secs: 30,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_provider: "aws".to_string(),
            aws: AwsConfig::default(),
            azure: AzureConfig::default(),
            gcp: GcpConfig::default(),
            docker: DockerConfig::default(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            default_region: "us-east-1".to_string(),
        }
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            default_location: "eastus".to_string(),
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            default_region: "us-central1".to_string(),
            default_project: None,
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_logging_enabled: false,
            log_dir: PathBuf::from("/var/log/clusterforge"),
            file_prefix: "clusterforge".to_string(),
            rotation: "daily".to_string(),
        }
    }
}

impl TimeoutConfig {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }

    pub fn scale(&self) -> Duration {
        Duration::from_secs(self.scale_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }
}

impl ForgeConfig {
    /// Load configuration from the first config file found plus environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.clone(), e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("CLUSTERFORGE_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("/etc/clusterforge/config.toml")),
            Some(PathBuf::from("./clusterforge.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Control plane
        if let Some(enabled) = var("CLUSTERFORGE_CONTROL_PLANE_ENABLED") {
            self.control_plane.enabled = enabled.parse().unwrap_or(true);
        }
        if let Some(namespace) = var("CLUSTERFORGE_NAMESPACE") {
            self.control_plane.namespace = namespace;
        }
        if let Some(path) = var("CLUSTERFORGE_KUBECONFIG") {
            self.control_plane.kubeconfig = Some(PathBuf::from(path));
        }
        if let Some(context) = var("CLUSTERFORGE_CONTEXT") {
            self.control_plane.context = Some(context);
        }
        if let Some(server) = var("CLUSTERFORGE_API_SERVER") {
            self.control_plane.api_server = Some(server);
        }
        if let Some(token) = var("CLUSTERFORGE_API_TOKEN") {
            self.control_plane.api_token = Some(token);
        }

        // Timeouts
        let timeouts = [
            ("CLUSTERFORGE_CREATE_TIMEOUT", &mut self.timeouts.create_secs),
            ("CLUSTERFORGE_DELETE_TIMEOUT", &mut self.timeouts.delete_secs),
            ("CLUSTERFORGE_SCALE_TIMEOUT", &mut self.timeouts.scale_secs),
            ("CLUSTERFORGE_READ_TIMEOUT", &mut self.timeouts.read_secs),
        ];
        for (key, slot) in timeouts {
            if let Some(secs) = var(key).and_then(|v| v.parse().ok()) {
                *slot = secs;
            }
        }

        // Providers
        if let Some(provider) = var("CLUSTERFORGE_DEFAULT_PROVIDER") {
            self.providers.default_provider = provider;
        }
        if let Some(region) = var("CLUSTERFORGE_AWS_REGION") {
            self.providers.aws.default_region = region;
        }
        if let Some(location) = var("CLUSTERFORGE_AZURE_LOCATION") {
            self.providers.azure.default_location = location;
        }
        if let Some(region) = var("CLUSTERFORGE_GCP_REGION") {
            self.providers.gcp.default_region = region;
        }
        if let Some(project) = var("CLUSTERFORGE_GCP_PROJECT") {
            self.providers.gcp.default_project = Some(project);
        }
        if let Some(enabled) = var("CLUSTERFORGE_DOCKER_ENABLED") {
            self.providers.docker.enabled = enabled.parse().unwrap_or(true);
        }

        // Logging
        if let Some(level) = var("CLUSTERFORGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("CLUSTERFORGE_LOG_JSON") {
            self.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(path) = var("CLUSTERFORGE_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(path);
        }
        if let Some(enabled) = var("CLUSTERFORGE_FILE_LOGGING") {
            self.logging.file_logging_enabled = enabled.parse().unwrap_or(false);
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_plane.namespace.trim().is_empty() {
            return Err(ConfigError::Validation(
                "control_plane.namespace cannot be empty".to_string(),
            ));
        }

        if self.control_plane.api_token.is_some() && self.control_plane.api_server.is_none() {
            return Err(ConfigError::Validation(
                "control_plane.api_server is required when an API credential is configured"
                    .to_string(),
            ));
        }

        let timeouts = [
            ("create_secs", self.timeouts.create_secs),
            ("delete_secs", self.timeouts.delete_secs),
            ("scale_secs", self.timeouts.scale_secs),
            ("read_secs", self.timeouts.read_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "timeouts.{} must be greater than 0",
                    name
                )));
            }
        }

        if !KNOWN_PROVIDERS.contains(&self.providers.default_provider.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown default provider '{}' (expected one of: {})",
                self.providers.default_provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.providers.default_provider == "docker" && !self.providers.docker.enabled {
            return Err(ConfigError::Validation(
                "default provider 'docker' is disabled".to_string(),
            ));
        }

        if !matches!(self.logging.rotation.as_str(), "hourly" | "daily" | "never") {
            return Err(ConfigError::Validation(format!(
                "logging.rotation must be hourly, daily or never, got '{}'",
                self.logging.rotation
            )));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0:?}: {1}")]
    FileRead(PathBuf, String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Config validation failed: {0}")]
    Validation(String),
}

//! Agent configuration
//!
//! Loaded from a TOML file with `L3_SELFIP_*` environment overrides, nested
//! keys separated by `__` (e.g. `L3_SELFIP_ICONTROL__PASSWORD`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use l3_icontrol::IControlConfig;
use l3_selfip::{NamingConfig, ReconcilerConfig};

pub const ENV_PREFIX: &str = "L3_SELFIP";

/// Searched in order when no configuration file is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["/etc/l3-selfip/agent.toml", "./l3-selfip.toml"];

#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name used in self-IP names and as assurance key
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "bigip1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRegistryConfig {
    pub name: String,
    pub storage_dir: PathBuf,
}

impl Default for PortRegistryConfig {
    fn default() -> Self {
        Self {
            name: "ports".to_string(),
            storage_dir: PathBuf::from("/var/lib/l3-selfip"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub device: DeviceConfig,
    pub icontrol: IControlConfig,
    pub reconciler: ReconcilerConfig,
    pub naming: NamingConfig,
    pub port_registry: PortRegistryConfig,
}

impl AgentConfig {
    /// Load `path` plus environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AgentConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AgentConfigError::NotFound(path.to_path_buf()));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(environment())
            .build()?;

        let config: AgentConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the first existing default file, or defaults with environment
    /// overrides when there is none
    pub fn load_with_defaults() -> Result<Self, AgentConfigError> {
        for path in DEFAULT_CONFIG_PATHS {
            if Path::new(path).exists() {
                log::debug!("Using configuration {}", path);
                return Self::load_from_file(path);
            }
        }

        log::debug!("No configuration file found, using defaults");
        let settings = config::Config::builder().add_source(environment()).build()?;
        let config: AgentConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, AgentConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_with_defaults(),
        }
    }

    pub fn validate(&self) -> Result<(), AgentConfigError> {
        if self.device.name.trim().is_empty() {
            return Err(AgentConfigError::Invalid("device.name must not be empty".to_string()));
        }
        if self.icontrol.url.trim().is_empty() {
            return Err(AgentConfigError::Invalid("icontrol.url must not be empty".to_string()));
        }
        if self.icontrol.timeout_secs == 0 {
            return Err(AgentConfigError::Invalid(
                "icontrol.timeout_secs must be positive".to_string(),
            ));
        }
        if self.reconciler.common_partition.trim().is_empty() {
            return Err(AgentConfigError::Invalid(
                "reconciler.common_partition must not be empty".to_string(),
            ));
        }
        if self.naming.environment_prefix.is_empty() {
            return Err(AgentConfigError::Invalid(
                "naming.environment_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// TOML rendering with the appliance password masked
    pub fn to_toml(&self) -> Result<String, AgentConfigError> {
        let mut shown = self.clone();
        if !shown.icontrol.password.is_empty() {
            shown.icontrol.password = "********".to_string();
        }
        toml::to_string_pretty(&shown).map_err(|e| AgentConfigError::Invalid(e.to_string()))
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

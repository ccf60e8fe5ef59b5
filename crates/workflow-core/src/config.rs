//! Configuration management for the workflow service

use serde::{Deserialize, Serialize};
use crate::error::{Result, WorkflowError};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `WORKFLOW__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "WORKFLOW";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory of the file store
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ServiceConfig {
    /// Layer defaults, an optional JSON file and `WORKFLOW__*` environment
    /// variables, in that order
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&ServiceConfig::default()).map_err(config_error)?);

        if let Some(path) = path {
            let name = path
                .to_str()
                .ok_or_else(|| WorkflowError::Config(format!("Config path is not UTF-8: {}", path.display())))?;
            builder = builder.add_source(config::File::new(name, config::FileFormat::Json).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| WorkflowError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(WorkflowError::Config("Server host is required".to_string()));
        }

        if self.server.port == 0 {
            return Err(WorkflowError::Config("Server port must be non-zero".to_string()));
        }

        if self.storage.backend == StorageBackend::File && self.storage.data_dir.is_none() {
            return Err(WorkflowError::Config(
                "File storage requires storage.data_dir".to_string(),
            ));
        }

        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn config_error(e: config::ConfigError) -> WorkflowError {
    WorkflowError::Config(format!("Failed to load config: {}", e))
}

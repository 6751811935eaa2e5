//! Configuration loader for YAML files

use crate::config::types::CodeshareConfig;
use crate::errors::ConfigError;
use std::path::Path;
use tokio::fs;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<CodeshareConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        log::debug!("Loaded config file {}", path.display());
        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<CodeshareConfig, ConfigError> {
        // An empty document parses as YAML null, which serde_yaml refuses for structs.
        let config: CodeshareConfig = if content.trim().is_empty() {
            CodeshareConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a config file when it exists, defaults otherwise.
    pub async fn from_optional_file<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<CodeshareConfig, ConfigError> {
        match path {
            Some(path) if path.as_ref().exists() => Self::from_file(path).await,
            Some(path) => {
                log::info!(
                    "Config file {} not found, using defaults",
                    path.as_ref().display()
                );
                Ok(CodeshareConfig::default())
            }
            None => Ok(CodeshareConfig::default()),
        }
    }
}

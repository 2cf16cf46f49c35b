//! Load configuration from YAML files.

use std::path::Path;

use super::{Config, ConfigError};

/// Load configuration from a YAML file.
pub(super) fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;

    load_config_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_owned(),
        source,
    })
}

/// Load configuration from a YAML string.
///
/// An empty file yields the default configuration.
fn load_config_str(content: &str) -> Result<Config, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }

    serde_yaml::from_str(content)
}

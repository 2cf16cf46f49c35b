//! Load configuration from TOML files.

use std::path::Path;

use super::{Config, ConfigError};

/// Load configuration from a TOML file.
pub(super) fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;

    load_config_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_owned(),
        source,
    })
}

/// Load configuration from a TOML string.
fn load_config_str(content: &str) -> Result<Config, ::toml::de::Error> {
    ::toml::from_str(content)
}

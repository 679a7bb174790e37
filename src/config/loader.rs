//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::BrokerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<BrokerConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<BrokerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply overrides injected by the hosting environment.
///
/// `PORT` replaces the listener port; an unparseable value is ignored with a warning.
pub fn apply_env_overrides(config: &mut BrokerConfig) {
    if let Ok(port) = std::env::var("PORT") {
        apply_port_override(config, &port);
    }
}

fn apply_port_override(config: &mut BrokerConfig, raw: &str) {
    match raw.trim().parse::<u16>() {
        Ok(port) => config.listener.set_port(port),
        Err(_) => tracing::warn!(value = %raw, "Ignoring invalid PORT environment variable"),
    }
}

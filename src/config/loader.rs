//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables that override file values.
pub const ENV_FMP_API_KEY: &str = "FMP_API_KEY";
pub const ENV_ALPHA_VANTAGE_API_KEY: &str = "ALPHA_VANTAGE_API_KEY";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_BIND_ADDRESS: &str = "GATEWAY_BIND_ADDRESS";

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

/// Load a TOML file, apply environment overrides, validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finalize(config, |name| std::env::var(name).ok())
}

/// Defaults plus environment overrides, validated.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    finalize(GatewayConfig::default(), |name| std::env::var(name).ok())
}

fn finalize(
    mut config: GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay non-empty environment values onto `config`.
pub fn apply_env_overrides(config: &mut GatewayConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = get(ENV_FMP_API_KEY) {
        config.providers.fmp_api_key = Some(key);
    }
    if let Some(key) = get(ENV_ALPHA_VANTAGE_API_KEY) {
        config.providers.alpha_vantage_api_key = Some(key);
    }
    if let Some(key) = get(ENV_GOOGLE_API_KEY) {
        config.llm.api_key = Some(key);
    }
    if let Some(addr) = get(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
}

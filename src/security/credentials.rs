//! Credential format checks.
//!
//! A smoke test on configured API keys, never a call to the issuer.

use thiserror::Error;

/// Prefix used by template configuration files for unset keys.
const PLACEHOLDER_PREFIX: &str = "your_";

const MIN_KEY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Please configure a valid {service} API key")]
    Missing { service: String },

    #[error("Invalid {service} API key format")]
    Malformed { service: String },
}

impl CredentialError {
    pub fn service(&self) -> &str {
        match self {
            CredentialError::Missing { service } | CredentialError::Malformed { service } => service,
        }
    }
}

/// Check that `key` is present and superficially well formed.
pub fn validate_api_key(key: Option<&str>, service_name: &str) -> Result<(), CredentialError> {
    let key = match key {
        Some(k) if !k.is_empty() && !k.starts_with(PLACEHOLDER_PREFIX) => k,
        _ => {
            return Err(CredentialError::Missing {
                service: service_name.to_string(),
            })
        }
    };

    if key.chars().count() < MIN_KEY_LEN {
        return Err(CredentialError::Malformed {
            service: service_name.to_string(),
        });
    }

    Ok(())
}

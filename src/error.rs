//! Gateway error taxonomy and its HTTP mapping.
//!
//! Every error renders as `{"error": <message>}`. Rate-limit rejections also
//! carry `retry_after` in the body and a `Retry-After` header.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::security::CredentialError;

/// Caller errors. Not retryable without correction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Deliberately generic: the matched signature is never revealed.
    #[error("Invalid input detected")]
    Suspicious,

    #[error("Invalid symbol format")]
    BadSymbol,

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    #[error("IP blocked due to abuse")]
    Blocked,

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    /// Operator error: a provider credential is unset or malformed.
    #[error(transparent)]
    MisconfiguredCredential(#[from] CredentialError),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    pub fn rejected(message: impl Into<String>) -> Self {
        GatewayError::InvalidInput(InvalidInput::Rejected(message.into()))
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        GatewayError::UpstreamUnavailable(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        GatewayError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited { .. } | GatewayError::Blocked => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::MisconfiguredCredential(_) | GatewayError::UpstreamUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            GatewayError::RateLimited { retry_after } => {
                let body = json!({ "error": self.to_string(), "retry_after": retry_after });
                let mut response = (status, Json(body)).into_response();
                if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, v);
                }
                response
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

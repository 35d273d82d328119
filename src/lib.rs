//! Due-diligence API gateway.
//!
//! Fronts a financial-data provider, a news-sentiment provider and an LLM
//! with a per-endpoint gate: sliding-window rate limiting with permanent
//! escalation, suspicious-input detection, sanitization and ticker-symbol
//! validation.

// Core subsystems
pub mod config;
pub mod error;
pub mod gate;
pub mod http;

// Domain
pub mod analysis;
pub mod providers;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::{GatewayError, InvalidInput};
pub use gate::{FieldPolicy, GateInput, RequestGate, SymbolSource};
pub use http::HttpServer;
pub use lifecycle::Shutdown;

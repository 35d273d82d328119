//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides for API keys, bind address)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; rate-limit policies are fixed at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::EndpointLimits;
pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
pub use schema::LlmConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::ProvidersConfig;
pub use schema::RateLimitConfig;
pub use schema::SecurityConfig;
pub use schema::TimeoutConfig;

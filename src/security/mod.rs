//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client.rs (resolve client identity)
//!     → rate_limit.rs (sliding window per client, permanent block list)
//!     → patterns.rs (scan raw field values for attack signatures)
//!     → sanitize.rs (strip control/special characters, bound length)
//!     → symbol.rs (strict ticker shape)
//!     → Pass to handler
//!
//! Every rejection:
//!     → events.rs (append-only security event log)
//!
//! Every response:
//!     → headers.rs (static hardening headers)
//! ```
//!
//! # Design Decisions
//! - All checks are in-memory and synchronous; nothing here awaits
//! - Fail closed: reject on any check failure
//! - Callers never learn which signature matched

pub mod client;
pub mod credentials;
pub mod events;
pub mod headers;
pub mod patterns;
pub mod rate_limit;
pub mod sanitize;
pub mod symbol;

pub use client::{resolve_client, ClientId};
pub use credentials::{validate_api_key, CredentialError};
pub use events::{SecurityEvent, SecurityEventKind, SecurityEventLog};
pub use patterns::{scan, Scan};
pub use rate_limit::{Admission, Clock, ManualClock, RateLimitPolicy, RateLimiter, SystemClock};
pub use sanitize::{sanitize, sanitize_str};
pub use symbol::is_valid_symbol;

//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, shared layers, graceful shutdown)
//!     → request.rs (request ID, set and propagated)
//!     → gate (per-route admission and input checks)
//!     → handlers.rs (provider calls, response shaping)
//!     → security headers on the way out
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{build_router, AppState, HttpServer};

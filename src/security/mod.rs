//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers:
//!     → headers.rs (drop client Proxy-Authorization, inject ours)
//!     → headers.rs (optional Connection: Close rewrite)
//!     → upload relay
//!
//! Upstream response headers:
//!     → headers.rs (optional Connection: Close rewrite)
//!     → download relay
//! ```
//!
//! # Design Decisions
//! - Credentials come only from configuration, never from the client
//! - Passwords never appear in Debug output or logs

pub mod credentials;
pub mod headers;

pub use credentials::Credentials;

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Metrics exporter → Bind listener → Accept loop
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → In-flight requests finish on their own
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Trigger shutdown
//! ```
//!
//! # Exit codes
//! - `0`: listener closed cleanly
//! - `1`: configuration or listener error
//! - `5`: upstream rejected the credentials (HTTP 407)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::serve;

/// Process exit code for configuration and listener failures.
pub const EXIT_FAILURE: u8 = 1;

/// Process exit code after the upstream proxy rejected our credentials.
pub const EXIT_PROXY_AUTH_REJECTED: u8 = 5;

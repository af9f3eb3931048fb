//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + command line overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to listener, handlers and actions
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the core never re-validates it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    ActionKind, ListenerConfig, ObservabilityConfig, ProxyConfig, TuningConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};

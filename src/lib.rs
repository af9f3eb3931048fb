//! Authenticating forward HTTP proxy library.
//!
//! Local clients that cannot answer proxy authentication talk to this proxy
//! without credentials; it injects `Proxy-Authorization: Basic ...` and relays
//! every byte to the upstream proxy and back.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, ProxyResult};
pub use lifecycle::Shutdown;
pub use net::listener::{ListenerError, ProxyListener};

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the authenticating proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// What to do with each accepted request.
    pub action: ActionKind,

    /// Local listening socket and admission limits.
    pub listener: ListenerConfig,

    /// Upstream proxy and the credentials injected for it.
    pub upstream: UpstreamConfig,

    /// Buffers, timeouts and header rewrite policies.
    pub tuning: TuningConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Action applied to every accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Relay to the upstream proxy with injected credentials.
    #[default]
    Forward,
    /// Reply with the received headers (diagnostics only).
    Echo,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Local IP address to listen on. A loopback address keeps the proxy
    /// reachable only from this machine.
    pub address: String,

    /// TCP port to listen on (0 picks an ephemeral port).
    pub port: u16,

    /// Number of incoming connections the OS may queue.
    pub backlog: u32,

    /// Maximum number of requests handled concurrently.
    pub max_active_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.127".to_string(),
            port: 8080,
            backlog: 50,
            max_active_requests: 20,
        }
    }
}

/// Upstream proxy configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Name or IP address of the upstream proxy server.
    pub host: Option<String>,

    /// TCP port of the upstream proxy server.
    pub port: u16,

    /// Username for authenticating to the upstream proxy.
    pub username: String,

    /// Password for authenticating to the upstream proxy.
    pub password: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 8080,
            username: std::env::var("USERNAME").unwrap_or_default(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tuning knobs for the relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Size of each buffer in bytes. Also the maximum header block size.
    pub buffer_size: usize,

    /// Timeout in milliseconds for connecting, reading and writing TCP
    /// sockets. Zero disables the timeout.
    pub socket_timeout_ms: u64,

    /// Rewrite `Connection`/`Keep-Alive` so both sides close after one
    /// exchange.
    pub connection_close: bool,

    /// Stop the whole process on HTTP 407 from upstream, so a wrong password
    /// is not retried until the account locks.
    pub stop_on_proxy_auth_error: bool,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            socket_timeout_ms: 180_000,
            connection_close: true,
            stop_on_proxy_auth_error: true,
        }
    }
}

impl TuningConfig {
    /// The socket timeout, or `None` when disabled.
    pub fn socket_timeout(&self) -> Option<Duration> {
        match self.socket_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log raw header blocks and per-request summaries.
    pub debug: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

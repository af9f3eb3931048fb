//! Authenticating forward proxy (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  PROXY AUTH                      │
//!                         │                                                  │
//!     Local client        │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!     ────────────────────┼─▶│   net    │──▶│   http   │──▶│    proxy    │───┼──▶ Upstream
//!                         │  │ listener │   │ request  │   │   forward   │   │    proxy
//!     ◀───────────────────┼──│ + gate   │   │ headers  │   │  2 × pump   │◀──┼───
//!                         │  └──────────┘   └──────────┘   └─────────────┘   │
//!                         │                                                  │
//!                         │  config · security · resilience · observability  │
//!                         │  lifecycle (startup, signals, shutdown)          │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use proxy_auth::config::{
    load_config, read_config, validate_config, ActionKind, ConfigError, ProxyConfig,
};
use proxy_auth::lifecycle::{self, signals, Shutdown};
use proxy_auth::observability::logging;
use proxy_auth::ListenerError;

const DEFAULT_CONFIG_FILE: &str = "proxy-auth.toml";

#[derive(Parser)]
#[command(name = "proxy-auth")]
#[command(about = "Forward proxy that adds Proxy-Authorization for an upstream proxy", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to ./proxy-auth.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local IP address to listen on
    #[arg(long)]
    listen: Option<IpAddr>,

    /// Local port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream proxy host name or IP address
    #[arg(long)]
    upstream_host: Option<String>,

    /// Upstream proxy port
    #[arg(long)]
    upstream_port: Option<u16>,

    /// Username for the upstream proxy
    #[arg(short, long)]
    username: Option<String>,

    /// Password for the upstream proxy
    #[arg(long, env = "PROXY_AUTH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Reply with the received headers instead of forwarding
    #[arg(long)]
    echo: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "debug")]
    quiet: bool,

    /// Log raw headers and per-request summaries
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            default.exists().then(|| default.to_path_buf())
        })
    }

    fn has_overrides(&self) -> bool {
        self.listen.is_some()
            || self.port.is_some()
            || self.upstream_host.is_some()
            || self.upstream_port.is_some()
            || self.username.is_some()
            || self.password.is_some()
            || self.echo
            || self.quiet
            || self.debug
    }

    fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen) = self.listen {
            config.listener.address = listen.to_string();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(host) = self.upstream_host {
            config.upstream.host = Some(host);
        }
        if let Some(port) = self.upstream_port {
            config.upstream.port = port;
        }
        if let Some(username) = self.username {
            config.upstream.username = username;
        }
        if let Some(password) = self.password {
            config.upstream.password = password;
        }
        if self.echo {
            config.action = ActionKind::Echo;
        }
        if self.quiet {
            config.observability.debug = false;
            config.observability.log_level = "warn".to_string();
        }
        if self.debug {
            config.observability.debug = true;
        }
    }
}

fn build_config(cli: Cli) -> Result<ProxyConfig, ConfigError> {
    let path = cli.config_path();
    if let (Some(path), false) = (&path, cli.has_overrides()) {
        return load_config(path);
    }

    let mut config = match path {
        Some(path) => read_config(&path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match build_config(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("proxy-auth: {}", e);
            return ExitCode::from(lifecycle::EXIT_FAILURE);
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        action = ?config.action,
        upstream_host = ?config.upstream.host,
        upstream_port = config.upstream.port,
        username = %config.upstream.username,
        buffer_size = config.tuning.buffer_size,
        socket_timeout_ms = config.tuning.socket_timeout_ms,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    match lifecycle::serve(Arc::new(config), &shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(ListenerError::Fatal(e)) => {
            tracing::error!(error = %e, "Stopping: upstream proxy rejected the credentials");
            ExitCode::from(lifecycle::EXIT_PROXY_AUTH_REJECTED)
        }
        Err(e) => {
            tracing::error!(error = %e, "Listener stopped");
            ExitCode::from(lifecycle::EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("proxy-auth-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("proxy-auth").chain(args.iter().copied()))
    }

    #[test]
    fn file_alone_is_loaded_and_validated() {
        let path = write_config(
            "valid",
            "[upstream]\nhost = \"10.0.0.1\"\nport = 3128\nusername = \"foo\"\n",
        );
        let config = build_config(cli(&["--config", path.to_str().unwrap()])).unwrap();
        assert_eq!(config.upstream.host.as_deref(), Some("10.0.0.1"));
        assert_eq!(config.upstream.port, 3128);

        let path = write_config("invalid", "[upstream]\nusername = \"foo\"\n");
        let err = build_config(cli(&["--config", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn overrides_apply_before_validation() {
        let path = write_config("partial", "[upstream]\nusername = \"foo\"\n");
        let config = build_config(cli(&[
            "--config",
            path.to_str().unwrap(),
            "--upstream-host",
            "proxy.local",
            "--port",
            "3129",
        ]))
        .unwrap();
        assert_eq!(config.upstream.host.as_deref(), Some("proxy.local"));
        assert_eq!(config.listener.port, 3129);
    }

    #[test]
    fn flags_count_as_overrides() {
        assert!(cli(&["--echo"]).has_overrides());
        assert!(cli(&["--port", "1"]).has_overrides());
    }
}

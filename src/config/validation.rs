//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer sizes, ports, concurrency limits)
//! - Check settings required by the selected action
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::{ActionKind, ProxyConfig};

/// Smallest buffer that can still hold a realistic request line.
pub const MIN_BUFFER_SIZE: usize = 100;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{setting} is not set")]
    Missing { setting: &'static str },

    #[error("{setting} is less than minimum ({min})")]
    BelowMinimum { setting: &'static str, min: u64 },

    #[error("{setting} is not a valid {expected}: {value}")]
    Invalid {
        setting: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Check every setting, collecting all violations.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tuning.buffer_size < MIN_BUFFER_SIZE {
        errors.push(ValidationError::BelowMinimum {
            setting: "tuning.buffer_size",
            min: MIN_BUFFER_SIZE as u64,
        });
    }

    if config.listener.max_active_requests < 1 {
        errors.push(ValidationError::BelowMinimum {
            setting: "listener.max_active_requests",
            min: 1,
        });
    }

    if config.listener.address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::Invalid {
            setting: "listener.address",
            expected: "IP address",
            value: config.listener.address.clone(),
        });
    }

    match config.upstream.host.as_deref().map(str::trim) {
        None | Some("") => errors.push(ValidationError::Missing {
            setting: "upstream.host",
        }),
        Some(_) => {}
    }

    if config.upstream.port < 1 {
        errors.push(ValidationError::BelowMinimum {
            setting: "upstream.port",
            min: 1,
        });
    }

    if config.action == ActionKind::Forward && config.upstream.username.is_empty() {
        errors.push(ValidationError::Missing {
            setting: "upstream.username",
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::Invalid {
            setting: "observability.log_level",
            expected: "log level",
            value: config.observability.log_level.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Invalid {
            setting: "observability.metrics_address",
            expected: "socket address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream.host = Some("proxy.example.com".into());
        config.upstream.username = "alice".into();
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn upstream_host_is_required() {
        let mut config = valid_config();
        config.upstream.host = Some("  ".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::Missing {
                setting: "upstream.host"
            }]
        );
    }

    #[test]
    fn reports_every_violation() {
        let mut config = valid_config();
        config.tuning.buffer_size = 99;
        config.listener.max_active_requests = 0;
        config.listener.address = "not-an-ip".into();
        config.upstream.port = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::BelowMinimum {
            setting: "tuning.buffer_size",
            min: 100
        }));
    }

    #[test]
    fn echo_needs_no_credentials() {
        let mut config = valid_config();
        config.upstream.username.clear();
        assert!(validate_config(&config).is_err());

        config.action = ActionKind::Echo;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = valid_config();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Bind the listener and begin accepting traffic
//! - Run until shutdown or a fatal request outcome
//!
//! # Design Decisions
//! - Configuration arrives validated; nothing here re-checks it
//! - Fail fast: a bind error is returned before anything is accepted
//! - The listener starts last (traffic only when ready)

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::listener::{ListenerError, ProxyListener};
use crate::observability::metrics;

/// Run the proxy until `shutdown` fires or the listener stops on its own.
pub async fn serve(config: Arc<ProxyConfig>, shutdown: &Shutdown) -> Result<(), ListenerError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = ProxyListener::bind(Arc::clone(&config)).await?;
    let active = listener.active_requests();

    let result = listener.run(shutdown.subscribe()).await;

    active.close();
    let remaining = active.active_count();
    if shutdown.is_triggered() && remaining > 0 {
        tracing::info!(active_requests = remaining, "Leaving in-flight requests to finish");
    }
    result
}

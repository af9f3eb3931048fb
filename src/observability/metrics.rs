//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): finished requests by outcome
//! - `proxy_request_duration_seconds` (histogram): accept to finish
//! - `proxy_active_requests` (gauge): admitted, unfinished requests
//! - `proxy_bytes_total` (counter): relayed body bytes by direction
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::proxy::pump::Direction;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record one finished request.
pub fn record_request(outcome: &'static str, elapsed: Option<Duration>) {
    counter!("proxy_requests_total", "outcome" => outcome).increment(1);
    if let Some(elapsed) = elapsed {
        histogram!("proxy_request_duration_seconds").record(elapsed.as_secs_f64());
    }
}

pub fn set_active_requests(count: usize) {
    gauge!("proxy_active_requests").set(count as f64);
}

pub fn record_bytes(direction: Direction, bytes: u64) {
    counter!("proxy_bytes_total", "direction" => direction.as_str()).increment(bytes);
}

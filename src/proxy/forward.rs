//! Forwarding to the upstream proxy.
//!
//! # Data Flow
//! ```text
//! client ──(rewritten request headers + body)──▶ upload pump ──▶ upstream
//! client ◀──(rewritten response headers + body)── download pump ◀── upstream
//! ```
//!
//! The upload pump starts before the response headers are read, so request
//! bodies and CONNECT tunnels flow while we wait for the upstream to answer.
//! The first pump to fail stops the other one; both are always joined.

use std::time::Duration;

use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::http::headers::read_header_block;
use crate::http::request::{ClientConnection, InboundRequest};
use crate::http::response::is_proxy_auth_error;
use crate::net::connection::RequestId;
use crate::proxy::pump::{Direction, PumpReport, StreamPump};
use crate::resilience::io_timeout;
use crate::security::headers::{apply_connection_close, apply_proxy_authorization};
use crate::security::Credentials;

/// Relays requests through the upstream proxy with injected credentials.
#[derive(Debug, Clone)]
pub struct ForwardAction {
    upstream_addr: String,
    credentials: Credentials,
    buffer_size: usize,
    timeout: Option<Duration>,
    connection_close: bool,
    stop_on_proxy_auth_error: bool,
    debug: bool,
}

impl ForwardAction {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let host = config.upstream.host.as_deref().unwrap_or_default();
        Self {
            upstream_addr: format!("{}:{}", host, config.upstream.port),
            credentials: Credentials::new(&config.upstream.username, &config.upstream.password),
            buffer_size: config.tuning.buffer_size,
            timeout: config.tuning.socket_timeout(),
            connection_close: config.tuning.connection_close,
            stop_on_proxy_auth_error: config.tuning.stop_on_proxy_auth_error,
            debug: config.observability.debug,
        }
    }

    pub fn upstream_addr(&self) -> &str {
        &self.upstream_addr
    }

    /// Forward one request. Returns whether both directions completed cleanly.
    pub async fn execute(
        &self,
        request: &mut InboundRequest,
        client: ClientConnection,
    ) -> ProxyResult<bool> {
        let upstream = io_timeout(self.timeout, TcpStream::connect(&self.upstream_addr))
            .await
            .map_err(|source| ProxyError::UpstreamConnect {
                addr: self.upstream_addr.clone(),
                source,
            })?;

        if self.debug {
            tracing::debug!(
                request_id = %request.id,
                upstream_local = ?upstream.local_addr().ok(),
                upstream_peer = ?upstream.peer_addr().ok(),
                username = %self.credentials.username(),
                "Connected to upstream"
            );
        }

        let (upstream_read, upstream_write) = upstream.into_split();
        let mut upstream_reader = BufReader::with_capacity(self.buffer_size, upstream_read);

        let mut headers = request.headers.clone();
        apply_proxy_authorization(&mut headers, &self.credentials);
        if self.connection_close {
            apply_connection_close(&mut headers);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut completion = Completion::new(request.id, stop_tx);

        let ClientConnection {
            reader: client_reader,
            writer: client_writer,
        } = client;

        let mut upload = StreamPump::new(
            request.id,
            Direction::Upload,
            client_reader,
            BufWriter::with_capacity(self.buffer_size, upstream_write),
            self.timeout,
        )
        .with_preamble(headers)
        .shutdown_on_eof()
        .spawn(stop_rx.clone());

        // Wait for the response headers while the upload runs.
        let mut upload_report: Option<PumpReport> = None;
        let response = {
            let read = read_header_block(&mut upstream_reader, self.buffer_size, self.timeout);
            tokio::pin!(read);
            loop {
                tokio::select! {
                    res = &mut read => break res,
                    joined = &mut upload, if upload_report.is_none() => {
                        let report = joined_report(joined, Direction::Upload);
                        completion.finished(&report);
                        upload_report = Some(report);
                        if !report.succeeded {
                            break Err(ProxyError::Aborted);
                        }
                    }
                }
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                completion.abort();
                if upload_report.is_none() {
                    completion.finished(&joined_report((&mut upload).await, Direction::Upload));
                }
                return Err(e);
            }
        };

        if self.debug {
            tracing::debug!(
                request_id = %request.id,
                headers = ?response.lines(),
                "Upstream response headers"
            );
        }

        if self.stop_on_proxy_auth_error && is_proxy_auth_error(response.start_line()) {
            let status_line = response.start_line().to_string();
            tracing::error!(
                request_id = %request.id,
                status_line = %status_line,
                "STOPPING due to proxy auth error"
            );
            request.response_headers = Some(response);
            completion.abort();
            if upload_report.is_none() {
                completion.finished(&joined_report((&mut upload).await, Direction::Upload));
            }
            return Err(ProxyError::ProxyAuthRejected { status_line });
        }

        let mut response_headers = response.clone();
        request.response_headers = Some(response);
        if self.connection_close {
            apply_connection_close(&mut response_headers);
        }

        let mut download = StreamPump::new(
            request.id,
            Direction::Download,
            upstream_reader,
            BufWriter::with_capacity(self.buffer_size, client_writer),
            self.timeout,
        )
        .with_preamble(response_headers)
        .shutdown_on_eof()
        .spawn(stop_rx);

        // Join both directions, reacting to whichever ends first.
        let (up, down) = match upload_report {
            Some(up) => {
                let down = joined_report((&mut download).await, Direction::Download);
                completion.finished(&down);
                (up, down)
            }
            None => {
                tokio::select! {
                    joined = &mut upload => {
                        let up = joined_report(joined, Direction::Upload);
                        completion.finished(&up);
                        let down = joined_report((&mut download).await, Direction::Download);
                        completion.finished(&down);
                        (up, down)
                    }
                    joined = &mut download => {
                        let down = joined_report(joined, Direction::Download);
                        completion.finished(&down);
                        let up = joined_report((&mut upload).await, Direction::Upload);
                        completion.finished(&up);
                        (up, down)
                    }
                }
            }
        };

        if self.debug {
            tracing::debug!(
                request_id = %request.id,
                any_errors = completion.any_errors,
                request = %request.headers.start_line(),
                upload = up.bytes,
                download = down.bytes,
                elapsed_ms = request.started.elapsed().as_millis() as u64,
                "Forwarding finished"
            );
        }

        Ok(!completion.any_errors)
    }
}

/// Collects both pumps' reports for one request.
///
/// The first failure raises the stop flag, which makes every pump of the
/// request drop its socket halves: both connections end up closed and
/// nothing stays blocked on a half-open peer. Later failures are only recorded.
struct Completion {
    request_id: RequestId,
    stop: watch::Sender<bool>,
    any_errors: bool,
}

impl Completion {
    fn new(request_id: RequestId, stop: watch::Sender<bool>) -> Self {
        Self {
            request_id,
            stop,
            any_errors: false,
        }
    }

    fn finished(&mut self, report: &PumpReport) {
        if report.succeeded {
            return;
        }
        if !self.any_errors {
            tracing::debug!(
                request_id = %self.request_id,
                direction = %report.direction,
                "Relay failed, closing both connections"
            );
            self.stop.send_replace(true);
        }
        self.any_errors = true;
    }

    fn abort(&mut self) {
        self.any_errors = true;
        self.stop.send_replace(true);
    }
}

fn joined_report(joined: Result<PumpReport, JoinError>, direction: Direction) -> PumpReport {
    joined.unwrap_or_else(|e| {
        tracing::error!(direction = %direction, error = %e, "Pump task did not complete");
        PumpReport::lost(direction)
    })
}

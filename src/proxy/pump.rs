//! One direction of a byte relay.
//!
//! # Responsibilities
//! - Emit the (rewritten) header block first
//! - Copy the remaining bytes untouched until the source reaches EOF
//! - Half-close the destination on clean EOF
//! - Report exactly once, success or failure, with the byte count

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{is_disconnect, ProxyError, ProxyResult};
use crate::http::headers::HeaderBlock;
use crate::net::connection::RequestId;
use crate::observability::metrics;
use crate::resilience::io_timeout;

/// Which way a pump moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to upstream.
    Upload,
    /// Upstream to client.
    Download,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upload => "up",
            Direction::Download => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one pump, delivered to its owner when the pump ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    pub direction: Direction,
    pub succeeded: bool,
    /// Bytes copied after the header block.
    pub bytes: u64,
}

impl PumpReport {
    /// Report for a pump task that never returned normally.
    pub fn lost(direction: Direction) -> Self {
        Self {
            direction,
            succeeded: false,
            bytes: 0,
        }
    }
}

/// Copies one reader into one writer.
pub struct StreamPump<R, W> {
    request_id: RequestId,
    direction: Direction,
    source: BufReader<R>,
    destination: BufWriter<W>,
    preamble: Option<HeaderBlock>,
    shutdown_on_eof: bool,
    timeout: Option<Duration>,
    bytes: u64,
}

impl<R, W> StreamPump<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        request_id: RequestId,
        direction: Direction,
        source: BufReader<R>,
        destination: BufWriter<W>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            request_id,
            direction,
            source,
            destination,
            preamble: None,
            shutdown_on_eof: false,
            timeout,
            bytes: 0,
        }
    }

    /// Header block written before any relayed byte.
    pub fn with_preamble(mut self, headers: HeaderBlock) -> Self {
        self.preamble = Some(headers);
        self
    }

    /// Shut down the destination's write side once the source is exhausted.
    pub fn shutdown_on_eof(mut self) -> Self {
        self.shutdown_on_eof = true;
        self
    }

    /// Run the pump as its own task.
    ///
    /// The pump stops early, closing both of its ends, once `stop` turns true.
    pub fn spawn(self, stop: watch::Receiver<bool>) -> JoinHandle<PumpReport> {
        tokio::spawn(self.run(stop))
    }

    /// Relay until EOF, failure or stop. Both ends are closed before the
    /// report is returned.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> PumpReport {
        tracing::debug!(
            request_id = %self.request_id,
            direction = %self.direction,
            "Pump started"
        );

        let result = tokio::select! {
            res = self.relay() => res,
            _ = stopped(&mut stop) => Err(ProxyError::Aborted),
        };

        let report = PumpReport {
            direction: self.direction,
            succeeded: result.is_ok(),
            bytes: self.bytes,
        };

        match result {
            Ok(()) => tracing::debug!(
                request_id = %self.request_id,
                direction = %self.direction,
                bytes = self.bytes,
                "Pump finished"
            ),
            Err(ProxyError::Aborted) => tracing::debug!(
                request_id = %self.request_id,
                direction = %self.direction,
                bytes = self.bytes,
                "Pump stopped, other direction failed"
            ),
            Err(ProxyError::Io(e)) if is_disconnect(&e) => tracing::debug!(
                request_id = %self.request_id,
                direction = %self.direction,
                bytes = self.bytes,
                error = %e,
                "Pump disconnected, closing"
            ),
            Err(e) => tracing::error!(
                request_id = %self.request_id,
                direction = %self.direction,
                bytes = self.bytes,
                error = %e,
                "Pump failed"
            ),
        }

        metrics::record_bytes(self.direction, self.bytes);
        drop(self);
        report
    }

    async fn relay(&mut self) -> ProxyResult<()> {
        let timeout = self.timeout;

        if let Some(headers) = self.preamble.take() {
            io_timeout(timeout, self.destination.write_all(&headers.to_bytes())).await?;
        }

        loop {
            // Nothing more buffered: push out what we have before blocking.
            if self.source.buffer().is_empty() {
                io_timeout(timeout, self.destination.flush()).await?;
            }

            let chunk = io_timeout(timeout, self.source.fill_buf()).await?;
            if chunk.is_empty() {
                break;
            }
            let n = chunk.len();
            io_timeout(timeout, self.destination.write_all(chunk)).await?;
            self.source.consume(n);
            self.bytes += n as u64;
        }

        io_timeout(timeout, self.destination.flush()).await?;
        if self.shutdown_on_eof {
            io_timeout(timeout, self.destination.shutdown()).await?;
        }
        Ok(())
    }
}

/// Resolves once the flag is raised. A dropped sender never raises it.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|&raised| raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

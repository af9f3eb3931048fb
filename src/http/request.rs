//! Per-connection request handling.
//!
//! # Responsibilities
//! - Own one accepted connection from accept to close
//! - Read the request header block
//! - Run the configured action
//! - Report the outcome to the listener exactly once, whatever happens

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ProxyConfig;
use crate::error::{is_disconnect, ProxyError, ProxyResult};
use crate::http::headers::{read_header_block, HeaderBlock};
use crate::net::connection::{AdmissionGuard, RequestId};
use crate::observability::metrics;
use crate::proxy::Action;

/// An accepted request, as seen by actions.
///
/// For CONNECT requests the headers carry the tunnel target and little else;
/// the response headers are then the upstream proxy's, not the target's.
#[derive(Debug)]
pub struct InboundRequest {
    pub id: RequestId,
    pub peer_addr: SocketAddr,
    /// Request line first.
    pub headers: HeaderBlock,
    /// Upstream status line and headers, once received.
    pub response_headers: Option<HeaderBlock>,
    /// When the connection was accepted.
    pub started: Instant,
}

/// The client's socket, split for the two relay directions.
///
/// `reader` may already hold body bytes that arrived with the headers.
#[derive(Debug)]
pub struct ClientConnection {
    pub reader: BufReader<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
}

/// Handles a single accepted connection as its own task.
pub struct RequestHandler {
    guard: AdmissionGuard,
    stream: TcpStream,
    peer_addr: SocketAddr,
    started: Instant,
    config: Arc<ProxyConfig>,
    action: Arc<Action>,
    fatal: mpsc::UnboundedSender<ProxyError>,
}

impl RequestHandler {
    pub fn new(
        guard: AdmissionGuard,
        stream: TcpStream,
        peer_addr: SocketAddr,
        config: Arc<ProxyConfig>,
        action: Arc<Action>,
        fatal: mpsc::UnboundedSender<ProxyError>,
    ) -> Self {
        Self {
            guard,
            stream,
            peer_addr,
            started: Instant::now(),
            config,
            action,
            fatal,
        }
    }

    pub fn id(&self) -> RequestId {
        self.guard.id()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Handle the connection, then report to the listener.
    ///
    /// Fatal errors are passed on to the listener; every other failure only
    /// ends this connection.
    pub async fn run(self) {
        let RequestHandler {
            guard,
            stream,
            peer_addr,
            started,
            config,
            action,
            fatal,
        } = self;
        let id = guard.id();

        tracing::info!(request_id = %id, peer_addr = %peer_addr, "Accepted connection");

        let result = handle(id, stream, peer_addr, started, &config, &action).await;

        let success = match result {
            Ok(success) => success,
            Err(e) if e.is_fatal() => {
                tracing::error!(request_id = %id, error = %e, "Fatal error, stopping listener");
                let _ = fatal.send(e);
                false
            }
            Err(ProxyError::Io(e)) if is_disconnect(&e) => {
                tracing::debug!(request_id = %id, error = %e, "Client went away");
                false
            }
            Err(e) => {
                tracing::warn!(request_id = %id, error = %e, "Request failed");
                false
            }
        };

        let elapsed = guard.finish(success);
        metrics::record_request(if success { "success" } else { "failure" }, elapsed);
    }
}

async fn handle(
    id: RequestId,
    stream: TcpStream,
    peer_addr: SocketAddr,
    started: Instant,
    config: &ProxyConfig,
    action: &Action,
) -> ProxyResult<bool> {
    let buffer_size = config.tuning.buffer_size;
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::with_capacity(buffer_size, read_half);

    let headers = read_header_block(&mut reader, buffer_size, config.tuning.socket_timeout()).await?;

    if config.observability.debug {
        tracing::debug!(request_id = %id, headers = ?headers.lines(), "Request headers");
    }

    let mut request = InboundRequest {
        id,
        peer_addr,
        headers,
        response_headers: None,
        started,
    };
    let client = ClientConnection {
        reader,
        writer: write_half,
    };

    action.execute(&mut request, client).await
}

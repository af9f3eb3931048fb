//! TCP listener with admission control.
//!
//! # Responsibilities
//! - Bind to the configured address, port and backlog
//! - Accept incoming TCP connections
//! - Enforce max_active_requests via the admission gate
//! - Spawn one RequestHandler per connection
//! - Stop on shutdown, on accept errors, or on a fatal request outcome

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{broadcast, mpsc};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::RequestHandler;
use crate::net::connection::ActiveRequests;
use crate::proxy::Action;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),

    /// A request hit a condition that must stop the process.
    #[error("Stopped: {0}")]
    Fatal(#[source] ProxyError),
}

/// Accepts proxy clients and runs a handler task for each.
///
/// The accept loop waits for a free admission slot before accepting the next
/// connection, so at most `max_active_requests` handlers ever run; extra
/// clients queue in the OS backlog. Handlers already started are never paused.
pub struct ProxyListener {
    /// The underlying TCP listener.
    inner: TcpListener,
    config: Arc<ProxyConfig>,
    action: Arc<Action>,
    /// Admission gate and in-flight set.
    active: Arc<ActiveRequests>,
    fatal_tx: mpsc::UnboundedSender<ProxyError>,
    fatal_rx: mpsc::UnboundedReceiver<ProxyError>,
}

impl ProxyListener {
    /// Bind to the configured address with the configured backlog.
    pub async fn bind(config: Arc<ProxyConfig>) -> Result<Self, ListenerError> {
        let ip: IpAddr = config
            .listener
            .address
            .parse()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let addr = SocketAddr::new(ip, config.listener.port);

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Bind)?;
        #[cfg(unix)]
        socket.set_reuseaddr(true).map_err(ListenerError::Bind)?;
        socket.bind(addr).map_err(ListenerError::Bind)?;
        let inner = socket
            .listen(config.listener.backlog)
            .map_err(ListenerError::Bind)?;

        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;
        let action = Arc::new(Action::from_config(&config));

        tracing::info!(
            address = %local_addr,
            backlog = config.listener.backlog,
            max_active_requests = config.listener.max_active_requests,
            action = action.name(),
            "Listener bound"
        );

        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Ok(Self {
            inner,
            active: ActiveRequests::new(config.listener.max_active_requests),
            config,
            action,
            fatal_tx,
            fatal_rx,
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// The in-flight request set, shared with every handler.
    pub fn active_requests(&self) -> Arc<ActiveRequests> {
        Arc::clone(&self.active)
    }

    /// Accept connections until shutdown is signalled, accepting fails, or a
    /// handler reports a fatal error. The listening socket is closed on return;
    /// requests already running carry on.
    ///
    /// The loop reserves a slot before each `accept`, so while idle it holds
    /// one admission slot of its own.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        loop {
            let reservation = tokio::select! {
                biased;
                Some(err) = self.fatal_rx.recv() => return Err(ListenerError::Fatal(err)),
                _ = shutdown.recv() => break,
                reserved = self.active.reserve() => match reserved {
                    Ok(reservation) => reservation,
                    Err(_) => break,
                },
            };

            let (stream, peer_addr) = tokio::select! {
                biased;
                Some(err) = self.fatal_rx.recv() => return Err(ListenerError::Fatal(err)),
                _ = shutdown.recv() => break,
                accepted = self.inner.accept() => accepted.map_err(|e| {
                    tracing::error!(error = %e, "Accept failed, closing listener");
                    ListenerError::Accept(e)
                })?,
            };

            let guard = reservation.admit(Some(peer_addr));

            tracing::debug!(
                request_id = %guard.id(),
                peer_addr = %peer_addr,
                active_requests = self.active.active_count(),
                "Connection accepted"
            );
            if self.config.observability.debug {
                tracing::debug!(active = ?self.active.snapshot(), "Active requests");
            }

            RequestHandler::new(
                guard,
                stream,
                peer_addr,
                Arc::clone(&self.config),
                Arc::clone(&self.action),
                self.fatal_tx.clone(),
            )
            .spawn();
        }

        tracing::info!("Listener closed");
        Ok(())
    }
}

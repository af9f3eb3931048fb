//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use proxy_auth::config::ProxyConfig;
use proxy_auth::net::ActiveRequests;
use proxy_auth::{ListenerError, ProxyListener, Shutdown};

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Config pointing at `upstream`, listening on an ephemeral loopback port,
/// with credentials `foo`/`bar`.
pub fn proxy_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.address = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.upstream.host = Some(upstream.ip().to_string());
    config.upstream.port = upstream.port();
    config.upstream.username = "foo".to_string();
    config.upstream.password = "bar".to_string();
    config.tuning.socket_timeout_ms = 5_000;
    config.observability.debug = false;
    config
}

/// A proxy listener running on its own task.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub active: Arc<ActiveRequests>,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

pub async fn spawn_proxy(config: ProxyConfig) -> TestProxy {
    let listener = ProxyListener::bind(Arc::new(config)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let active = listener.active_requests();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(listener.run(shutdown.subscribe()));
    TestProxy {
        addr,
        shutdown,
        active,
        handle,
    }
}

/// Send `request` through the proxy and read the reply until the proxy
/// closes the connection.
pub async fn exchange(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request).await.unwrap();
    let mut reply = Vec::new();
    tokio::time::timeout(WAIT, client.read_to_end(&mut reply))
        .await
        .expect("proxy did not close the client connection")
        .unwrap();
    reply
}

/// Read up to and including the blank line ending a header block.
pub async fn read_headers(stream: &mut TcpStream) -> Vec<u8> {
    let mut headers = Vec::new();
    let mut byte = [0u8; 1];
    while !headers.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => headers.push(byte[0]),
        }
    }
    headers
}

/// When the mock upstream answers.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Answer once the request headers are in, then close.
    AfterHeaders,
    /// Read the whole request until EOF, then answer and close.
    AfterEof,
    /// Answer once the headers are in, then hold the connection open.
    Stall,
    /// Answer once the headers are in, then neither read nor close until the
    /// test ends.
    Hold,
}

/// A scripted upstream proxy.
pub struct MockUpstream {
    pub addr: SocketAddr,
    /// Bytes received per connection (headers only, or everything for `AfterEof`).
    pub requests: mpsc::UnboundedReceiver<Vec<u8>>,
    /// One message per connection once the proxy has closed it.
    pub closed: mpsc::UnboundedReceiver<()>,
    pub connections: Arc<AtomicUsize>,
}

pub async fn start_mock_upstream(reply: Reply, response: &'static [u8]) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (requests_tx, requests) = mpsc::unbounded_channel();
    let (closed_tx, closed) = mpsc::unbounded_channel();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let requests_tx = requests_tx.clone();
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let received = match reply {
                    Reply::AfterEof => {
                        let mut all = Vec::new();
                        let _ = socket.read_to_end(&mut all).await;
                        all
                    }
                    Reply::AfterHeaders | Reply::Stall | Reply::Hold => {
                        read_headers(&mut socket).await
                    }
                };
                let _ = requests_tx.send(received);

                let _ = socket.write_all(response).await;
                match reply {
                    Reply::Hold => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        return;
                    }
                    Reply::Stall => {}
                    Reply::AfterHeaders | Reply::AfterEof => {
                        let _ = socket.shutdown().await;
                    }
                }

                let mut rest = Vec::new();
                let _ = socket.read_to_end(&mut rest).await;
                let _ = closed_tx.send(());
            });
        }
    });

    MockUpstream {
        addr,
        requests,
        closed,
        connections,
    }
}

/// An upstream that hands the test a release handle for every request it
/// receives, and only answers once released.
pub async fn start_gated_upstream(
    response: &'static [u8],
) -> (SocketAddr, mpsc::UnboundedReceiver<oneshot::Sender<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (gates_tx, gates) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let gates_tx = gates_tx.clone();
            tokio::spawn(async move {
                read_headers(&mut socket).await;
                let (release_tx, release_rx) = oneshot::channel();
                if gates_tx.send(release_tx).is_err() {
                    return;
                }
                let _ = release_rx.await;
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, gates)
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

//! Failure injection tests for the forwarding proxy.

use std::sync::atomic::Ordering;
use std::time::Duration;

use proxy_auth::{ListenerError, ProxyError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{
    exchange, proxy_config, read_headers, spawn_proxy, start_mock_upstream, unused_addr, Reply,
    WAIT,
};

const REQUEST: &[u8] = b"GET http://bar/ HTTP/1.1\r\nHost: bar\r\n\r\n";
const REJECTED: &[u8] =
    b"HTTP/1.1 407 Unauthorized\r\nProxy-Authenticate: Basic realm=\"x\"\r\n\r\nnope";

/// Read until the proxy closes, tolerating a reset instead of a clean EOF.
async fn read_until_closed(client: &mut TcpStream) -> Vec<u8> {
    let mut reply = Vec::new();
    let _ = tokio::time::timeout(WAIT, client.read_to_end(&mut reply))
        .await
        .expect("proxy did not close the client connection");
    reply
}

#[tokio::test]
async fn test_proxy_auth_rejection_stops_listener() {
    let upstream = start_mock_upstream(Reply::AfterHeaders, REJECTED).await;
    let proxy = spawn_proxy(proxy_config(upstream.addr)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client.write_all(REQUEST).await.unwrap();
    let reply = read_until_closed(&mut client).await;
    assert!(reply.is_empty(), "no byte of a 407 may reach the client");

    let result = tokio::time::timeout(WAIT, proxy.handle)
        .await
        .expect("listener kept running after 407")
        .unwrap();
    match result {
        Err(ListenerError::Fatal(ProxyError::ProxyAuthRejected { status_line })) => {
            assert_eq!(status_line, "HTTP/1.1 407 Unauthorized");
        }
        other => panic!("expected fatal proxy auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_proxy_auth_rejection_relayed_when_policy_off() {
    let upstream = start_mock_upstream(Reply::AfterHeaders, REJECTED).await;
    let mut config = proxy_config(upstream.addr);
    config.tuning.stop_on_proxy_auth_error = false;
    let proxy = spawn_proxy(config).await;

    let reply = exchange(proxy.addr, REQUEST).await;
    assert!(reply.starts_with(b"HTTP/1.1 407 Unauthorized\r\n"));
    assert!(reply.ends_with(b"Connection: Close\r\n\r\nnope"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!proxy.handle.is_finished());
}

#[tokio::test]
async fn test_bare_407_status_is_relayed() {
    let upstream = start_mock_upstream(Reply::AfterHeaders, b"HTTP/1.1 407\r\n\r\n").await;
    let proxy = spawn_proxy(proxy_config(upstream.addr)).await;

    let reply = exchange(proxy.addr, REQUEST).await;
    assert_eq!(reply, b"HTTP/1.1 407\r\nConnection: Close\r\n\r\n");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!proxy.handle.is_finished());
}

#[tokio::test]
async fn test_client_reset_stops_download_without_timeout() {
    // Upstream answers with headers, then goes quiet without reading or
    // closing. With no socket timeout only the client's failure can end the
    // download side.
    let upstream = start_mock_upstream(Reply::Hold, b"HTTP/1.1 200 OK\r\n\r\npartial").await;
    let mut config = proxy_config(upstream.addr);
    config.tuning.socket_timeout_ms = 0;
    let proxy = spawn_proxy(config).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client.write_all(REQUEST).await.unwrap();
    let headers = tokio::time::timeout(WAIT, read_headers(&mut client))
        .await
        .unwrap();
    assert!(headers.starts_with(b"HTTP/1.1 200 OK\r\n"));

    #[allow(deprecated)]
    client.set_linger(Some(Duration::ZERO)).unwrap();
    drop(client);

    tokio::time::timeout(WAIT, async {
        while proxy.active.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("download kept waiting on the quiet upstream");
    assert!(!proxy.handle.is_finished());
}

#[tokio::test]
async fn test_stalled_upstream_closes_both_sockets() {
    let mut upstream = start_mock_upstream(Reply::Stall, b"HTTP/1.1 200 OK\r\n\r\npartial").await;
    let mut config = proxy_config(upstream.addr);
    config.tuning.socket_timeout_ms = 300;
    let proxy = spawn_proxy(config).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client.write_all(REQUEST).await.unwrap();
    read_until_closed(&mut client).await;

    tokio::time::timeout(WAIT, upstream.closed.recv())
        .await
        .expect("upstream connection left open")
        .unwrap();

    tokio::time::timeout(WAIT, async {
        while proxy.active.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("request never finished");
}

#[tokio::test]
async fn test_upstream_unreachable_drops_client() {
    let proxy = spawn_proxy(proxy_config(unused_addr().await)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client.write_all(REQUEST).await.unwrap();
    let reply = read_until_closed(&mut client).await;
    assert!(reply.is_empty());

    // One failed dial is not fatal: the next client is still served.
    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client.write_all(REQUEST).await.unwrap();
    read_until_closed(&mut client).await;
    assert!(!proxy.handle.is_finished());
}

#[tokio::test]
async fn test_truncated_headers_never_reach_upstream() {
    let upstream = start_mock_upstream(Reply::AfterHeaders, b"HTTP/1.1 200 OK\r\n\r\n").await;
    let proxy = spawn_proxy(proxy_config(upstream.addr)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client.write_all(b"GET http://bar/ HTTP/1.1\r\nHost: bar\r\n").await.unwrap();
    client.shutdown().await.unwrap();
    let reply = read_until_closed(&mut client).await;

    assert!(reply.is_empty());
    assert_eq!(upstream.connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_headers_rejected() {
    let upstream = start_mock_upstream(Reply::AfterHeaders, b"HTTP/1.1 200 OK\r\n\r\n").await;
    let mut config = proxy_config(upstream.addr);
    config.tuning.buffer_size = 100;
    let proxy = spawn_proxy(config).await;

    let mut request = b"GET http://bar/ HTTP/1.1\r\nX-Filler: ".to_vec();
    request.extend(std::iter::repeat(b'a').take(200));
    request.extend_from_slice(b"\r\n\r\n");

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let _ = client.write_all(&request).await;
    let reply = read_until_closed(&mut client).await;

    assert!(reply.is_empty());
    assert_eq!(upstream.connections.load(Ordering::SeqCst), 0);
    assert!(!proxy.handle.is_finished());
}

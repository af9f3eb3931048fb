//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap socket reads, writes and the upstream connect with the configured
//!   per-socket timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Expiry surfaces as `io::ErrorKind::TimedOut`, handled like any other
//!   socket fault

use std::future::Future;
use std::io;
use std::time::Duration;

/// Run an I/O future, failing with `TimedOut` once `limit` elapses.
///
/// `None` means wait forever.
pub async fn io_timeout<F, T>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("socket timed out after {}ms", limit.as_millis()),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_result() {
        let res = io_timeout(Some(Duration::from_secs(1)), async { Ok::<_, io::Error>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[tokio::test]
    async fn expiry_is_timed_out_error() {
        let res = io_timeout(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, io::Error>(())
        })
        .await;
        assert_eq!(res.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn no_limit_waits() {
        let res = io_timeout(None, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, io::Error>("done")
        })
        .await;
        assert_eq!(res.unwrap(), "done");
    }
}

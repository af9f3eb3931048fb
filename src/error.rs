//! Request-level error types.

use std::io;

use thiserror::Error;

/// Header block could not be framed.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Stream ended before the blank line that terminates the headers.
    #[error("end of stream reached after {read} bytes, before headers were complete")]
    Truncated { read: usize },

    /// Headers did not fit in the configured buffer.
    #[error("buffer of {capacity} bytes full before headers were complete")]
    TooLarge { capacity: usize },
}

/// Errors that can occur while handling one proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed or oversized header block; fatal to this connection only.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Could not reach the upstream proxy.
    #[error("failed to connect to upstream {addr}: {source}")]
    UpstreamConnect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The other direction of the relay failed and the sockets were closed.
    #[error("relay aborted")]
    Aborted,

    /// Upstream rejected our credentials and the stop policy is on.
    #[error("upstream proxy rejected credentials: {status_line}")]
    ProxyAuthRejected { status_line: String },

    /// Socket fault: reset, timeout, broken pipe and the like.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Whether this error must stop the whole process rather than just the
    /// request that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProxyError::ProxyAuthRejected { .. })
    }
}

/// Result type for request handling.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Whether an I/O error is the ordinary way a peer goes away mid-relay.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
    )
}

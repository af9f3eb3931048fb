//! Diagnostic action: reply with the headers we received.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::ProxyConfig;
use crate::error::ProxyResult;
use crate::http::headers::HeaderBlock;
use crate::http::request::{ClientConnection, InboundRequest};
use crate::resilience::io_timeout;

/// Treats the request as a plain `GET` and echoes its headers back.
#[derive(Debug, Clone)]
pub struct EchoAction {
    timeout: Option<Duration>,
}

impl EchoAction {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            timeout: config.tuning.socket_timeout(),
        }
    }

    /// Succeeds only for `GET` requests; anything else gets a 501.
    pub async fn execute(
        &self,
        request: &mut InboundRequest,
        client: ClientConnection,
    ) -> ProxyResult<bool> {
        let success = request.headers.start_line().starts_with("GET ");
        let response = echo_response(&request.headers, success);

        let mut writer = BufWriter::new(client.writer);
        io_timeout(self.timeout, writer.write_all(&response)).await?;
        io_timeout(self.timeout, writer.shutdown()).await?;
        Ok(success)
    }
}

fn echo_response(request: &HeaderBlock, success: bool) -> Vec<u8> {
    let head = if success {
        HeaderBlock::from_lines([
            "HTTP/1.1 200 Echoing your request",
            "Content-Type: text/plain",
            "Connection: close",
        ])
    } else {
        HeaderBlock::from_lines([
            "HTTP/1.1 501 Not Implemented",
            "Content-Type: text/plain",
            "Connection: close",
        ])
    };

    let mut out = head.to_bytes();
    if success {
        out.extend_from_slice(b"Received request + headers:\r\n");
    }
    out.extend_from_slice(&request.to_bytes());
    out
}

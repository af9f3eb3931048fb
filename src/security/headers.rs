//! Header rewriting applied to relayed messages.
//!
//! # Responsibilities
//! - Replace any client-supplied `Proxy-Authorization` with our credentials
//! - Strip `Connection`/`Keep-Alive` and force `Connection: Close`
//!
//! # Design Decisions
//! - Client credentials are never trusted or forwarded
//! - Rewritten headers are appended after the untouched ones, in a fixed order

use crate::http::headers::HeaderBlock;
use crate::security::credentials::Credentials;

pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
pub const CONNECTION: &str = "Connection";
pub const KEEP_ALIVE: &str = "Keep-Alive";

/// Replace `Proxy-Authorization` with the configured credentials.
pub fn apply_proxy_authorization(headers: &mut HeaderBlock, credentials: &Credentials) {
    headers.remove(PROXY_AUTHORIZATION);
    headers.push(format!("{}: {}", PROXY_AUTHORIZATION, credentials.basic()));
}

/// Disable keep-alive so the exchange ends when either side closes.
pub fn apply_connection_close(headers: &mut HeaderBlock) {
    headers.remove(CONNECTION);
    headers.remove(KEEP_ALIVE);
    headers.push(format!("{}: Close", CONNECTION));
}

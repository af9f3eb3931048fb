//! Minimal HTTP layer.
//!
//! # Data Flow
//! ```text
//! Accepted TcpStream
//!     → request.rs (RequestHandler task per connection)
//!     → headers.rs (frame the header block, keep the body in the stream)
//!     → proxy::Action (forward or echo)
//!     → response.rs (status line checks on the upstream reply)
//! ```
//!
//! # Design Decisions
//! - Only the header block boundary is parsed; bodies are opaque
//! - No HTTP version, method or header validation

pub mod headers;
pub mod request;
pub mod response;

pub use headers::{read_header_block, HeaderBlock};
pub use request::{ClientConnection, InboundRequest, RequestHandler};

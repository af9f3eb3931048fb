//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, admission gate)
//!     → connection.rs (request ID, in-flight set, completion reporting)
//!     → Hand off to http::RequestHandler
//!
//! Request lifecycle:
//!     Reserved slot → Accepted → Running → Finished (slot released)
//! ```
//!
//! # Design Decisions
//! - Admission bounds running handlers, not accepted sockets
//! - Each request reports completion exactly once, even on panic

pub mod connection;
pub mod listener;

pub use connection::{ActiveRequests, AdmissionGuard, RequestId};
pub use listener::{ListenerError, ProxyListener};

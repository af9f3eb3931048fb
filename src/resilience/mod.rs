//! Resilience subsystem.
//!
//! # Design Decisions
//! - One per-socket timeout, applied to every read, write and connect
//! - No retries: a failed request is dropped, never replayed against the
//!   upstream (repeated bad credentials can lock the account)

pub mod timeouts;

pub use timeouts::io_timeout;

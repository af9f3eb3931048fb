//! Request actions and the byte relay.
//!
//! # Data Flow
//! ```text
//! InboundRequest (headers read)
//!     → action.rs (Forward or Echo)
//!     → forward.rs (dial upstream, rewrite headers, run two pumps, join)
//!     → pump.rs (one direction each: upload, download)
//! ```
//!
//! # Design Decisions
//! - Bodies are never buffered or reframed, only copied
//! - Pumps are independent tasks, always started and joined as a pair
//! - Failure of one direction closes both connections

pub mod action;
pub mod echo;
pub mod forward;
pub mod pump;

pub use action::Action;
pub use pump::{Direction, PumpReport, StreamPump};

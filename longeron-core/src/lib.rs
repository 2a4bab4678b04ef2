//! Transport-agnostic primitives shared by the longeron protocol crates.
//!
//! This crate carries no ZMTP knowledge. It provides:
//! - the library-wide error taxonomy ([`error`]),
//! - endpoint-string parsing ([`endpoint`]),
//! - the socket-type enumeration with its wire values ([`socket_type`]),
//! - the per-peer subscription store ([`subscription`]),
//! - byte-queue and owned-buffer helpers for completion-based I/O
//!   ([`buffer`]),
//! - TCP socket tuning ([`tcp`]).

pub mod buffer;
pub mod endpoint;
pub mod error;
pub mod socket_type;
pub mod subscription;
pub mod tcp;

pub use buffer::{IoBytes, ReadQueue};
pub use endpoint::Endpoint;
pub use error::{LongeronError, Result};
pub use socket_type::SocketType;
pub use subscription::SubscriptionSet;

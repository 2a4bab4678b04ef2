//! # longeron
//!
//! A ZMTP 3.1 message transport over TCP with the NULL security
//! mechanism, speaking the REQ/REP and PUB/SUB patterns and
//! interoperating with other ZMTP 3.1 implementations.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use longeron::{Context, SendFlags, SocketType};
//!
//! #[compio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = Context::new();
//!     let req = ctx.socket(SocketType::Req);
//!     req.connect("tcp://127.0.0.1:5555").await?;
//!
//!     req.send(b"Hello ZeroMQ", SendFlags::empty()).await?;
//!     let mut reply = [0u8; 256];
//!     let n = req.recv(&mut reply).await?;
//!     println!("{}", String::from_utf8_lossy(&reply[..n]));
//!     Ok(())
//! }
//! ```
//!
//! ## Layering
//!
//! - [`codec`] — frame encoding and the streaming frame parser
//! - [`greeting`] — the fixed 64-byte connection greeting
//! - [`command`] — READY and the other ZMTP command forms
//! - [`handshake`] — the greeting + READY exchange, either role
//! - [`socket`] / [`context`] — the pattern layer on top
//!
//! Durable queuing, reconnection, high-water marks and flow control are
//! out of scope; a send that cannot complete blocks on the stream or
//! fails with a transport error.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod codec;
pub mod command;
pub mod context;
pub mod greeting;
pub mod handshake;
pub mod socket;

mod connection;

pub use context::Context;
pub use socket::{SendFlags, Socket};

// Core types surfaced at the crate root.
pub use longeron_core::endpoint::Endpoint;
pub use longeron_core::error::{LongeronError, Result};
pub use longeron_core::socket_type::SocketType;
pub use longeron_core::subscription::SubscriptionSet;

/// Convenient imports for applications.
pub mod prelude {
    pub use crate::{Context, LongeronError, Result, SendFlags, Socket, SocketType};
    pub use bytes::Bytes;
}

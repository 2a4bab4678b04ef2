//! Library context: the factory every socket is created through.
//!
//! The context is cheap to clone; clones share the handle counter so
//! every socket in a process gets a distinct handle for log correlation.
//! Dropping the last clone is the whole teardown story — sockets own
//! their resources and close with their own `close`/drop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::socket::Socket;
use longeron_core::socket_type::SocketType;

#[derive(Debug)]
struct ContextInner {
    next_handle: AtomicU64,
}

/// Shared entry point for creating sockets.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    /// Create a socket of the given pattern.
    ///
    /// Every type tag is accepted here — any of them can complete a
    /// handshake — but data-plane operations exist only for REQ, REP,
    /// PUB and SUB.
    #[must_use]
    pub fn socket(&self, socket_type: SocketType) -> Socket {
        let handle = self.inner.next_handle.fetch_add(1, Ordering::Relaxed);
        debug!("[CTX] created {} socket {}", socket_type, handle);
        Socket::new(handle, socket_type)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_distinct_across_clones() {
        let ctx = Context::new();
        let ctx2 = ctx.clone();
        let a = ctx.socket(SocketType::Req);
        let b = ctx2.socket(SocketType::Rep);
        assert_ne!(format!("{a:?}"), format!("{b:?}"));
    }
}

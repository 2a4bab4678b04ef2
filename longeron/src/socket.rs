//! The user-facing socket object.
//!
//! A [`Socket`] is created through a [`Context`](crate::context::Context)
//! with a fixed pattern and owns either one connection (client side, after
//! `connect`) or a listener plus a set of accepted connections (server
//! side, after `bind` and `accept`). Pattern behaviour:
//!
//! - **REQ / REP** — `send` writes the empty delimiter frame (MORE set)
//!   followed by the payload frame; `recv` concatenates a whole multi-frame
//!   envelope, skipping delimiters.
//! - **PUB** — `send` fans out to every accepted connection whose
//!   subscription set matches, harvesting pending SUBSCRIBE/CANCEL traffic
//!   first.
//! - **SUB** — `subscribe`/`unsubscribe` write `0x01 topic` / `0x00 topic`
//!   messages; `recv` yields one message payload; `send` is illegal.
//!
//! A socket is not a free-for-all concurrency primitive, but two usages
//! are supported and correct: a background task looping on `accept` while
//! another task calls `send`/`recv`, and a sender working a PUB socket
//! whose connection set that accept loop is growing. One async mutex over
//! the connection set (and id counter) serialises them; harvest and write
//! for a given connection happen inside the same critical section, so no
//! task ever observes a partially framed stream.

use bytes::{BufMut, Bytes, BytesMut};
use compio::net::{TcpListener, TcpStream};
use futures::lock::Mutex;
use longeron_core::endpoint::Endpoint;
use longeron_core::error::{LongeronError, Result};
use longeron_core::socket_type::SocketType;
use longeron_core::tcp;
use smallvec::SmallVec;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::handshake::{perform_handshake, HandshakeRole};

bitflags::bitflags! {
    /// Options accepted by [`Socket::send`].
    ///
    /// Both flags are recognized syntactically; `DONTWAIT` is best-effort
    /// (writes on a slow peer may still block) and `SNDMORE` is accepted
    /// but multi-part continuation is not implemented.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SendFlags: u32 {
        /// Prefer non-blocking write semantics.
        const DONTWAIT = 0b01;
        /// More frames of the same logical message follow.
        const SNDMORE = 0b10;
    }
}

/// How long a freshly accepted PUB-side connection is given to deliver
/// its initial subscriptions before the first harvest.
const SUBSCRIPTION_GRACE: Duration = Duration::from_millis(100);

struct ConnSet {
    connections: Vec<Connection>,
    next_id: u64,
}

impl ConnSet {
    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// A messaging socket of a fixed pattern.
pub struct Socket {
    handle: u64,
    socket_type: SocketType,
    listener: parking_lot::Mutex<Option<Arc<TcpListener>>>,
    conns: Mutex<ConnSet>,
}

impl Socket {
    pub(crate) fn new(handle: u64, socket_type: SocketType) -> Self {
        Self {
            handle,
            socket_type,
            listener: parking_lot::Mutex::new(None),
            conns: Mutex::new(ConnSet {
                connections: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// The pattern this socket was created with.
    #[inline]
    #[must_use]
    pub const fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    /// Start listening on `endpoint` (`tcp://host:port`, host may be `*`).
    pub async fn bind(&self, endpoint: &str) -> Result<()> {
        let ep = Endpoint::parse(endpoint)?;
        if self.listener.lock().is_some() {
            return Err(LongeronError::InvalidOperation("socket is already bound"));
        }

        let listener = TcpListener::bind((ep.bind_host(), ep.port())).await?;
        let local = listener.local_addr()?;
        debug!("[{}] socket {} bound {}", self.socket_type, self.handle, local);
        *self.listener.lock() = Some(Arc::new(listener));
        Ok(())
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let guard = self.listener.lock();
        let listener = guard.as_ref().ok_or(LongeronError::NotBound)?;
        Ok(listener.local_addr()?)
    }

    /// Accept one connection, run the handshake as acceptor, and add it
    /// to the connection set. Returns the new connection's id.
    ///
    /// A handshake failure drops that connection only; the socket and its
    /// other connections stay usable.
    pub async fn accept(&self) -> Result<u64> {
        let listener = self
            .listener
            .lock()
            .clone()
            .ok_or(LongeronError::NotBound)?;

        let (mut stream, peer_addr) = listener.accept().await?;
        trace!("[{}] inbound connection from {}", self.socket_type, peer_addr);
        tcp::enable_nodelay(&stream)?;

        let info = match perform_handshake(&mut stream, HandshakeRole::Acceptor, self.socket_type)
            .await
        {
            Ok(info) => info,
            Err(e) => {
                debug!(
                    "[{}] handshake with {} failed: {}",
                    self.socket_type, peer_addr, e
                );
                return Err(e);
            }
        };
        self.log_peer_type(&info);

        // Give a new subscriber a moment to deliver its initial
        // subscriptions, then drain them before the first fan-out.
        if self.socket_type == SocketType::Pub {
            compio::time::sleep(SUBSCRIPTION_GRACE).await;
        }

        let mut set = self.conns.lock().await;
        let id = set.alloc_id();
        let mut conn = Connection::established(id, stream);
        if self.socket_type == SocketType::Pub {
            if let Err(e) = conn.harvest_subscriptions().await {
                debug!("[PUB] subscriber {} died during harvest: {}", id, e);
                return Err(e);
            }
        }
        set.connections.push(conn);
        debug!(
            "[{}] connection {} from {} added ({} total)",
            self.socket_type,
            id,
            peer_addr,
            set.connections.len()
        );
        Ok(id)
    }

    /// Dial `endpoint` and run the handshake as initiator. A client
    /// socket holds exactly one connection.
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        let ep = Endpoint::parse(endpoint)?;
        if ep.is_wildcard() {
            return Err(LongeronError::InvalidEndpoint(endpoint.to_string()));
        }
        if !self.conns.lock().await.connections.is_empty() {
            return Err(LongeronError::InvalidOperation(
                "socket is already connected",
            ));
        }

        let mut stream = TcpStream::connect((ep.host(), ep.port())).await?;
        tcp::enable_nodelay(&stream)?;
        let info =
            perform_handshake(&mut stream, HandshakeRole::Initiator, self.socket_type).await?;
        self.log_peer_type(&info);

        let mut set = self.conns.lock().await;
        let id = set.alloc_id();
        set.connections.push(Connection::established(id, stream));
        debug!(
            "[{}] socket {} connected to {} (connection {})",
            self.socket_type, self.handle, ep, id
        );
        Ok(())
    }

    /// Send `data` according to the socket's pattern.
    pub async fn send(&self, data: &[u8], flags: SendFlags) -> Result<()> {
        if flags.bits() & !SendFlags::all().bits() != 0 {
            return Err(LongeronError::InvalidOperation("unknown send flag"));
        }
        if flags.contains(SendFlags::SNDMORE) {
            trace!("[{}] SNDMORE accepted (continuation not implemented)", self.socket_type);
        }
        if flags.contains(SendFlags::DONTWAIT) {
            trace!("[{}] DONTWAIT accepted (best-effort)", self.socket_type);
        }

        match self.socket_type {
            SocketType::Req | SocketType::Rep => self.send_envelope(data).await,
            SocketType::Pub => self.send_broadcast(data).await,
            SocketType::Sub => Err(LongeronError::InvalidOperation(
                "SUB sockets cannot send",
            )),
            _ => Err(LongeronError::InvalidSocketType(self.socket_type.as_str())),
        }
    }

    /// Receive one logical message into `buf`, returning its length.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        match self.socket_type {
            SocketType::Req | SocketType::Rep => self.recv_envelope(buf).await,
            SocketType::Sub => self.recv_single(buf).await,
            SocketType::Pub => Err(LongeronError::InvalidOperation(
                "PUB sockets cannot receive",
            )),
            _ => Err(LongeronError::InvalidSocketType(self.socket_type.as_str())),
        }
    }

    /// Ask the connected publisher for messages starting with `topic`.
    /// The empty topic subscribes to everything.
    pub async fn subscribe(&self, topic: &[u8]) -> Result<()> {
        self.send_subscription(0x01, topic).await
    }

    /// Retract a subscription previously made with [`Socket::subscribe`].
    pub async fn unsubscribe(&self, topic: &[u8]) -> Result<()> {
        self.send_subscription(0x00, topic).await
    }

    /// Number of live connections owned by this socket.
    pub async fn connection_count(&self) -> usize {
        self.conns.lock().await.connections.len()
    }

    /// Drop every connection and stop listening.
    pub async fn close(&self) {
        let mut set = self.conns.lock().await;
        let dropped = set.connections.len();
        set.connections.clear();
        *self.listener.lock() = None;
        debug!(
            "[{}] socket {} closed ({} connections dropped)",
            self.socket_type, self.handle, dropped
        );
    }

    // --- REQ / REP ---

    async fn send_envelope(&self, data: &[u8]) -> Result<()> {
        use crate::codec::Frame;

        let mut set = self.conns.lock().await;
        let conn = set
            .connections
            .first_mut()
            .ok_or(LongeronError::NotConnected)?;
        let id = conn.id();

        // Delimiter and payload leave in one write so the pair is
        // observable atomically.
        let mut wire = BytesMut::with_capacity(data.len() + 11);
        wire.extend_from_slice(&Frame::message(Bytes::new(), true).encode());
        wire.extend_from_slice(&Frame::message(Bytes::copy_from_slice(data), false).encode());

        trace!("[{}] sending {}-byte envelope", self.socket_type, data.len());
        let result = conn.write_bytes(wire.freeze()).await;
        self.reap_on_error(&mut set, id, result)
    }

    async fn recv_envelope(&self, buf: &mut [u8]) -> Result<usize> {
        let mut set = self.conns.lock().await;
        let conn = set
            .connections
            .first_mut()
            .ok_or(LongeronError::NotConnected)?;
        let id = conn.id();

        let mut parts: SmallVec<[Bytes; 4]> = SmallVec::new();
        let outcome = loop {
            match conn.read_frame().await {
                Err(e) => break Err(e),
                Ok(frame) => {
                    if frame.is_command() {
                        trace!("[{}] skipping inbound command frame", self.socket_type);
                        continue;
                    }
                    let more = frame.more();
                    if !frame.payload.is_empty() {
                        parts.push(frame.payload);
                    }
                    if !more {
                        break Ok(());
                    }
                }
            }
        };
        self.reap_on_error(&mut set, id, outcome)?;
        drop(set);

        let needed: usize = parts.iter().map(Bytes::len).sum();
        if needed > buf.len() {
            return Err(LongeronError::BufferTooSmall {
                needed,
                capacity: buf.len(),
            });
        }
        let mut at = 0;
        for part in &parts {
            buf[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        trace!("[{}] received {}-byte envelope", self.socket_type, needed);
        Ok(needed)
    }

    // --- PUB ---

    async fn send_broadcast(&self, data: &[u8]) -> Result<()> {
        let payload = Bytes::copy_from_slice(data);
        let mut set = self.conns.lock().await;
        let mut dead: SmallVec<[u64; 4]> = SmallVec::new();
        let mut delivered = 0usize;

        for conn in &mut set.connections {
            if let Err(e) = conn.harvest_subscriptions().await {
                debug!("[PUB] dropping subscriber {}: {}", conn.id(), e);
                dead.push(conn.id());
                continue;
            }
            if !conn.subscriptions.matches(&payload) {
                continue;
            }
            match conn.send_message(payload.clone(), false).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!("[PUB] write to subscriber {} failed: {}", conn.id(), e);
                    dead.push(conn.id());
                }
            }
        }

        if !dead.is_empty() {
            set.connections.retain(|c| !dead.contains(&c.id()));
        }
        trace!(
            "[PUB] {} bytes to {}/{} subscribers",
            payload.len(),
            delivered,
            set.connections.len()
        );
        Ok(())
    }

    // --- SUB ---

    async fn recv_single(&self, buf: &mut [u8]) -> Result<usize> {
        let mut set = self.conns.lock().await;
        let conn = set
            .connections
            .first_mut()
            .ok_or(LongeronError::NotConnected)?;
        let id = conn.id();

        let outcome = loop {
            match conn.read_frame().await {
                Err(e) => break Err(e),
                Ok(frame) => {
                    if frame.is_command() {
                        trace!("[SUB] skipping inbound command frame");
                        continue;
                    }
                    break Ok(frame.payload);
                }
            }
        };
        let payload = self.reap_on_error(&mut set, id, outcome)?;
        drop(set);

        if payload.len() > buf.len() {
            return Err(LongeronError::BufferTooSmall {
                needed: payload.len(),
                capacity: buf.len(),
            });
        }
        buf[..payload.len()].copy_from_slice(&payload);
        Ok(payload.len())
    }

    async fn send_subscription(&self, lead: u8, topic: &[u8]) -> Result<()> {
        if self.socket_type != SocketType::Sub {
            return Err(LongeronError::InvalidSocketType(self.socket_type.as_str()));
        }

        let mut set = self.conns.lock().await;
        let conn = set
            .connections
            .first_mut()
            .ok_or(LongeronError::NotConnected)?;
        let id = conn.id();

        let mut msg = BytesMut::with_capacity(topic.len() + 1);
        msg.put_u8(lead);
        msg.extend_from_slice(topic);
        trace!(
            "[SUB] {} {:?}",
            if lead == 0x01 { "subscribe" } else { "unsubscribe" },
            topic
        );
        let result = conn.send_message(msg.freeze(), false).await;
        self.reap_on_error(&mut set, id, result)
    }

    // --- shared plumbing ---

    /// Pass `result` through, removing connection `id` first when the
    /// error means that stream is dead.
    fn reap_on_error<T>(&self, set: &mut ConnSet, id: u64, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_connection_fatal() {
                set.connections.retain(|c| c.id() != id);
                debug!("[{}] connection {} removed: {}", self.socket_type, id, e);
            }
        }
        result
    }

    fn log_peer_type(&self, info: &crate::handshake::PeerInfo) {
        if let Some(peer) = info.socket_type {
            if !self.socket_type.is_compatible(peer) {
                debug!(
                    "[{}] peer announced {}, an unconventional counterpart",
                    self.socket_type, peer
                );
            }
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("handle", &self.handle)
            .field("type", &self.socket_type)
            .field("bound", &self.listener.lock().is_some())
            .finish()
    }
}

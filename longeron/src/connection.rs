//! One TCP endpoint's worth of connection state.
//!
//! A `Connection` owns the stream, its inbound byte queue, and (on the
//! PUB side) the peer's subscription set. It is created by `accept` or
//! `connect` after a successful handshake, is exclusively owned by its
//! parent socket, and is dropped when the socket closes it or a peer
//! error marks it dead.

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use compio::net::TcpStream;
use longeron_core::buffer::{IoBytes, ReadQueue};
use longeron_core::error::{LongeronError, Result};
use longeron_core::subscription::SubscriptionSet;
use std::time::Duration;
use tracing::trace;

use crate::codec::{decode_frame, Frame};
use crate::command::Command;

/// Read size for blocking data-plane reads.
const READ_CHUNK: usize = 8 * 1024;

/// Read size for harvester polls; subscription frames are tiny.
const POLL_CHUNK: usize = 1024;

/// How long a harvester poll waits before declaring "nothing available".
/// This is the completion-I/O stand-in for a non-blocking read.
const POLL_TIMEOUT: Duration = Duration::from_millis(1);

pub(crate) struct Connection {
    id: u64,
    stream: TcpStream,
    rx: ReadQueue,
    pub(crate) subscriptions: SubscriptionSet,
}

impl Connection {
    /// Wrap a stream whose handshake already completed.
    pub(crate) fn established(id: u64, stream: TcpStream) -> Self {
        Self {
            id,
            stream,
            rx: ReadQueue::new(),
            subscriptions: SubscriptionSet::new(),
        }
    }

    #[inline]
    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    /// Read one frame, blocking until it is complete.
    pub(crate) async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.rx)? {
                return Ok(frame);
            }
            let buf = vec![0u8; READ_CHUNK];
            let BufResult(res, buf) = AsyncRead::read(&mut self.stream, buf).await;
            let n = res?;
            if n == 0 {
                return Err(LongeronError::StreamEnded);
            }
            self.rx.push(&buf[..n]);
        }
    }

    /// Read one frame if one is immediately available.
    ///
    /// Returns `Ok(None)` when the stream has nothing for us right now
    /// (the would-block case). A frame whose tail has not arrived yet
    /// stays queued untouched and is finished on a later call.
    pub(crate) async fn poll_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.rx)? {
                return Ok(Some(frame));
            }
            let buf = vec![0u8; POLL_CHUNK];
            match compio::time::timeout(POLL_TIMEOUT, AsyncRead::read(&mut self.stream, buf)).await
            {
                Err(_) => return Ok(None),
                Ok(BufResult(Ok(0), _)) => return Err(LongeronError::StreamEnded),
                Ok(BufResult(Ok(n), buf)) => self.rx.push(&buf[..n]),
                Ok(BufResult(Err(e), _)) => return Err(e.into()),
            }
        }
    }

    /// Write pre-encoded wire bytes in full.
    pub(crate) async fn write_bytes(&mut self, bytes: Bytes) -> Result<()> {
        let BufResult(res, _) = self.stream.write_all(IoBytes::new(bytes)).await;
        res?;
        Ok(())
    }

    /// Encode and write a single message frame.
    pub(crate) async fn send_message(&mut self, payload: Bytes, more: bool) -> Result<()> {
        self.write_bytes(Frame::message(payload, more).encode()).await
    }

    /// Drain whatever subscription traffic is immediately available.
    ///
    /// Both wire forms are honoured: `0x01`/`0x00`-prefixed messages
    /// (what libzmq SUB sockets send) and ZMTP 3.1 SUBSCRIBE/CANCEL
    /// commands. Messages with any other first byte, empty messages and
    /// unrelated commands are ignored. A transport or framing error means
    /// the connection is dead and the caller must remove it.
    pub(crate) async fn harvest_subscriptions(&mut self) -> Result<()> {
        loop {
            let Some(frame) = self.poll_frame().await? else {
                return Ok(());
            };

            if frame.is_command() {
                match Command::parse(&frame.payload)? {
                    Command::Subscribe(topic) => {
                        trace!("[PUB] subscriber {} subscribed {:?}", self.id, topic);
                        self.subscriptions.add(topic);
                    }
                    Command::Cancel(topic) => {
                        trace!("[PUB] subscriber {} cancelled {:?}", self.id, topic);
                        self.subscriptions.remove(&topic);
                    }
                    other => {
                        trace!("[PUB] ignoring {} from subscriber {}", other.name(), self.id);
                    }
                }
                continue;
            }

            if frame.payload.is_empty() {
                continue;
            }
            let topic = frame.payload.slice(1..);
            match frame.payload[0] {
                0x01 => {
                    trace!("[PUB] subscriber {} subscribed {:?}", self.id, topic);
                    self.subscriptions.add(topic);
                }
                0x00 => {
                    trace!("[PUB] subscriber {} cancelled {:?}", self.id, topic);
                    self.subscriptions.remove(&topic);
                }
                other => {
                    trace!(
                        "[PUB] ignoring frame with lead byte {:#04x} from subscriber {}",
                        other,
                        self.id
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("subscriptions", &self.subscriptions.len())
            .field("match_all", &self.subscriptions.match_all())
            .finish()
    }
}

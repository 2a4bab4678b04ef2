//! ZMTP connection handshake.
//!
//! Both peers run the same sequence regardless of which side dialed:
//! send the local greeting unconditionally, read the peer greeting, send
//! READY carrying `Socket-Type`, read the peer's READY. Only the
//! `as_server` greeting byte differs between the two roles, and it is read
//! but never enforced.
//!
//! The greeting read is deliberately lenient: a peer greeting that cannot
//! be fully parsed but yields at least ten readable bytes does not abort
//! the handshake; the connection proceeds on the assumption of ZMTP 3.1
//! with the NULL mechanism. Real clients (PyZMQ among them) stage their
//! greeting bytes, and strict-mode rejection breaks them. A READY frame
//! with properties we never asked for is likewise accepted.

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use longeron_core::buffer::IoBytes;
use longeron_core::error::{LongeronError, Result};
use longeron_core::socket_type::SocketType;
use std::io;
use tracing::{debug, trace};

use crate::codec::{Frame, FLAG_COMMAND, FLAG_LONG};
use crate::command::{self, Command};
use crate::greeting::{Greeting, Mechanism, GREETING_SIZE, PROTOCOL_VERSION};

/// Which side of the TCP association we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    /// We dialed (`connect`).
    Initiator,
    /// We answered (`accept`).
    Acceptor,
}

/// What the peer told us during the handshake.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub greeting: Greeting,
    /// The peer's announced `Socket-Type`, when present and recognizable.
    pub socket_type: Option<SocketType>,
}

/// Commands larger than this during the handshake are treated as a
/// protocol violation rather than buffered.
const MAX_HANDSHAKE_COMMAND: usize = 4096;

/// The minimum usable prefix of a peer greeting.
const MIN_GREETING: usize = 10;

/// Run the full greeting + READY exchange on `stream`.
///
/// On success the stream is positioned at the first data-plane byte.
pub async fn perform_handshake(
    stream: &mut TcpStream,
    role: HandshakeRole,
    socket_type: SocketType,
) -> Result<PeerInfo> {
    let as_server = matches!(role, HandshakeRole::Acceptor);
    trace!("[HANDSHAKE] {} starting as {:?}", socket_type, role);

    let local = Greeting::local(as_server).encode();
    write_all(stream, Bytes::copy_from_slice(&local)).await?;

    let peer_greeting = read_peer_greeting(stream).await?;
    if !peer_greeting.mechanism.is_null() {
        return Err(LongeronError::MechanismUnsupported(
            peer_greeting.mechanism.as_str().to_string(),
        ));
    }

    let ready = Frame::command(command::ready_body(socket_type)).encode();
    write_all(stream, ready).await?;

    let payload = read_command_payload(stream).await?;
    match Command::parse(&payload)? {
        Command::Ready(props) => {
            let peer_type = command::ready_socket_type(&props);
            debug!(
                "[HANDSHAKE] {} open, peer {} as_server={}",
                socket_type,
                peer_type.map_or("unknown", |t| t.as_str()),
                peer_greeting.as_server,
            );
            Ok(PeerInfo {
                greeting: peer_greeting,
                socket_type: peer_type,
            })
        }
        Command::Error(reason) => Err(LongeronError::BadCommand(format!(
            "peer aborted handshake: {reason}"
        ))),
        other => Err(LongeronError::BadCommand(format!(
            "expected READY, got {}",
            other.name()
        ))),
    }
}

/// Read the peer greeting, tolerating a truncated or malformed record as
/// long as at least [`MIN_GREETING`] bytes arrived.
async fn read_peer_greeting(stream: &mut TcpStream) -> Result<Greeting> {
    let mut raw = [0u8; GREETING_SIZE];
    let mut filled = 0usize;

    while filled < GREETING_SIZE {
        let chunk = vec![0u8; GREETING_SIZE - filled];
        let BufResult(res, chunk) = AsyncRead::read(stream, chunk).await;
        let n = res?;
        if n == 0 {
            break;
        }
        raw[filled..filled + n].copy_from_slice(&chunk[..n]);
        filled += n;
    }

    if filled < MIN_GREETING {
        return Err(LongeronError::StreamEnded);
    }

    if filled == GREETING_SIZE {
        if let Ok(greeting) = Greeting::decode(&raw) {
            return Ok(greeting);
        }
    }

    // Unparseable but long enough: assume 3.1 / NULL and move on.
    trace!(
        "[HANDSHAKE] tolerating unparseable {}-byte greeting",
        filled
    );
    Ok(Greeting {
        version: PROTOCOL_VERSION,
        mechanism: Mechanism::Null,
        as_server: filled > 32 && (raw[32] & 0x01) != 0,
    })
}

/// Read exactly one command frame and return its payload.
async fn read_command_payload(stream: &mut TcpStream) -> Result<Bytes> {
    let flags = read_exact(stream, 1).await?[0];
    match flags {
        _ if (flags & FLAG_COMMAND) != 0 && crate::codec::is_legal_flags(flags) => {}
        0x00..=0x03 => {
            return Err(LongeronError::BadCommand(
                "expected a command frame".into(),
            ))
        }
        _ => return Err(LongeronError::BadFrame("illegal flags byte")),
    }

    let body_len = if (flags & FLAG_LONG) != 0 {
        let raw = read_exact(stream, 8).await?;
        u64::from_be_bytes(raw[..8].try_into().expect("8 bytes")) as usize
    } else {
        read_exact(stream, 1).await?[0] as usize
    };

    if body_len > MAX_HANDSHAKE_COMMAND {
        return Err(LongeronError::BadCommand(format!(
            "oversized handshake command ({body_len} bytes)"
        )));
    }

    Ok(Bytes::from(read_exact(stream, body_len).await?))
}

async fn read_exact(stream: &mut TcpStream, n: usize) -> Result<Vec<u8>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let buf = vec![0u8; n];
    let BufResult(res, buf) = stream.read_exact(buf).await;
    res.map_err(eof_to_stream_ended)?;
    Ok(buf)
}

async fn write_all(stream: &mut TcpStream, bytes: Bytes) -> Result<()> {
    let BufResult(res, _) = AsyncWriteExt::write_all(stream, IoBytes::new(bytes)).await;
    res?;
    Ok(())
}

fn eof_to_stream_ended(e: io::Error) -> LongeronError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        LongeronError::StreamEnded
    } else {
        LongeronError::Io(e)
    }
}

//! ZMTP command codec.
//!
//! A command travels inside a COMMAND frame. Its payload starts with a
//! length-prefixed ASCII name followed by a name-specific body; READY
//! carries metadata properties with no count prefix:
//!
//! ```text
//! name_len:u8 || name || repeated( prop_name_len:u8 || prop_name
//!                                  || prop_value_len:u32-be || prop_value )
//! ```
//!
//! This library emits only READY; all six wire names are parsed and
//! anything else is rejected as a bad command.

use bytes::{BufMut, Bytes, BytesMut};
use longeron_core::error::{LongeronError, Result};
use longeron_core::socket_type::SocketType;

/// READY property carrying the local socket type.
pub const PROP_SOCKET_TYPE: &[u8] = b"Socket-Type";

/// A parsed ZMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Handshake completion; properties are kept verbatim, unknown ones
    /// included.
    Ready(Vec<(Bytes, Bytes)>),
    /// Peer is closing the connection with a reason string.
    Error(String),
    /// Heartbeat probe: time-to-live plus opaque context.
    Ping { ttl: u16, context: Bytes },
    /// Heartbeat answer echoing the probe context.
    Pong { context: Bytes },
    /// ZMTP 3.1 subscription command (topic body).
    Subscribe(Bytes),
    /// ZMTP 3.1 unsubscription command (topic body).
    Cancel(Bytes),
}

impl Command {
    /// Parse a COMMAND frame payload.
    pub fn parse(payload: &Bytes) -> Result<Self> {
        if payload.is_empty() {
            return Err(LongeronError::BadCommand("empty command payload".into()));
        }
        let name_len = payload[0] as usize;
        if payload.len() < 1 + name_len {
            return Err(LongeronError::BadCommand("truncated command name".into()));
        }
        let name = &payload[1..1 + name_len];
        let body = payload.slice(1 + name_len..);

        match name {
            b"READY" => Ok(Self::Ready(parse_properties(&body)?)),
            b"ERROR" => {
                if body.is_empty() {
                    return Ok(Self::Error(String::new()));
                }
                let reason_len = body[0] as usize;
                if body.len() < 1 + reason_len {
                    return Err(LongeronError::BadCommand("truncated ERROR reason".into()));
                }
                let reason = String::from_utf8_lossy(&body[1..1 + reason_len]).into_owned();
                Ok(Self::Error(reason))
            }
            b"PING" => {
                if body.len() < 2 {
                    return Err(LongeronError::BadCommand("short PING body".into()));
                }
                let ttl = u16::from_be_bytes([body[0], body[1]]);
                Ok(Self::Ping {
                    ttl,
                    context: body.slice(2..),
                })
            }
            b"PONG" => Ok(Self::Pong { context: body }),
            b"SUBSCRIBE" => Ok(Self::Subscribe(body)),
            b"CANCEL" => Ok(Self::Cancel(body)),
            other => Err(LongeronError::BadCommand(format!(
                "unknown command {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    /// Wire name of this command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "READY",
            Self::Error(_) => "ERROR",
            Self::Ping { .. } => "PING",
            Self::Pong { .. } => "PONG",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::Cancel(_) => "CANCEL",
        }
    }
}

/// Build the READY payload this library sends: exactly one property,
/// `Socket-Type`, and no property-count prefix.
#[must_use]
pub fn ready_body(socket_type: SocketType) -> Bytes {
    let mut body = BytesMut::new();
    body.put_u8(5);
    body.extend_from_slice(b"READY");
    put_property(&mut body, PROP_SOCKET_TYPE, socket_type.as_str().as_bytes());
    body.freeze()
}

/// Look up a READY property by exact name.
#[must_use]
pub fn property<'a>(props: &'a [(Bytes, Bytes)], name: &[u8]) -> Option<&'a Bytes> {
    props.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// The peer socket type announced in a READY command, if present and
/// recognizable.
#[must_use]
pub fn ready_socket_type(props: &[(Bytes, Bytes)]) -> Option<SocketType> {
    property(props, PROP_SOCKET_TYPE).and_then(|v| SocketType::from_name(v))
}

fn put_property(dst: &mut BytesMut, name: &[u8], value: &[u8]) {
    dst.put_u8(name.len() as u8);
    dst.extend_from_slice(name);
    dst.put_u32(value.len() as u32);
    dst.extend_from_slice(value);
}

fn parse_properties(body: &Bytes) -> Result<Vec<(Bytes, Bytes)>> {
    let mut props = Vec::new();
    let mut i = 0;
    let b = body.as_ref();

    while i < b.len() {
        let name_len = b[i] as usize;
        i += 1;
        if b.len() < i + name_len {
            return Err(LongeronError::BadCommand("truncated property name".into()));
        }
        let name = body.slice(i..i + name_len);
        i += name_len;

        if b.len() < i + 4 {
            return Err(LongeronError::BadCommand("truncated property length".into()));
        }
        let value_len =
            u32::from_be_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]) as usize;
        i += 4;
        if b.len() < i + value_len {
            return Err(LongeronError::BadCommand("truncated property value".into()));
        }
        let value = body.slice(i..i + value_len);
        i += value_len;

        props.push((name, value));
    }

    Ok(props)
}

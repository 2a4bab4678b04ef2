//! ZMTP frame codec.
//!
//! A frame is a flags byte, a 1- or 8-byte length, and exactly `length`
//! payload bytes. Three flag bits are defined: MORE (0x01), LONG (0x02)
//! and COMMAND (0x04). This implementation emits, and accepts, exactly the
//! six byte values those bits legally combine into; any other flags byte
//! is a protocol violation.

use bytes::{BufMut, Bytes, BytesMut};
use longeron_core::buffer::ReadQueue;
use longeron_core::error::{LongeronError, Result};

/// Next frame continues the same logical message.
pub const FLAG_MORE: u8 = 0x01;
/// Length field is 8 bytes big-endian instead of 1 byte.
pub const FLAG_LONG: u8 = 0x02;
/// Frame carries a command, not a message.
pub const FLAG_COMMAND: u8 = 0x04;

/// True if `flags` is one of the six byte values the defined bits can
/// legally combine into. Anything else is rejected outright rather than
/// interpreted bit by bit.
#[inline]
#[must_use]
pub const fn is_legal_flags(flags: u8) -> bool {
    matches!(flags, 0x00 | 0x01 | 0x02 | 0x03 | 0x04 | 0x06)
}

/// A decoded or to-be-encoded ZMTP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Build a message frame; the short form is chosen iff the payload is
    /// at most 255 bytes.
    #[must_use]
    pub fn message(payload: Bytes, more: bool) -> Self {
        let mut flags = 0;
        if more {
            flags |= FLAG_MORE;
        }
        if payload.len() > 255 {
            flags |= FLAG_LONG;
        }
        Self { flags, payload }
    }

    /// Build a command frame.
    #[must_use]
    pub fn command(payload: Bytes) -> Self {
        let mut flags = FLAG_COMMAND;
        if payload.len() > 255 {
            flags |= FLAG_LONG;
        }
        Self { flags, payload }
    }

    #[inline]
    #[must_use]
    pub const fn more(&self) -> bool {
        (self.flags & FLAG_MORE) != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_command(&self) -> bool {
        (self.flags & FLAG_COMMAND) != 0
    }

    /// Serialize header + payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let len = self.payload.len();
        let is_long = (self.flags & FLAG_LONG) != 0;
        let mut out = BytesMut::with_capacity(if is_long { 9 } else { 2 } + len);

        out.put_u8(self.flags);
        if is_long {
            out.put_u64(len as u64);
        } else {
            out.put_u8(len as u8);
        }
        out.extend_from_slice(&self.payload);
        out.freeze()
    }
}

/// Decode one frame from the front of `queue`.
///
/// The parser is stateless: it consumes nothing until the queue holds
/// the entire frame, so `Ok(None)` always means "read more and call
/// again" and a caller can never observe a half-eaten frame. On success
/// the queue is left positioned at the first byte after the frame.
///
/// The flags byte is checked against the closed legal set before the
/// length is even looked at, so one garbage byte fails fast as
/// `BadFrame` instead of being misread as a huge length.
pub fn decode_frame(queue: &mut ReadQueue) -> Result<Option<Frame>> {
    let Some(&flags) = queue.peek(1).and_then(|h| h.first()) else {
        return Ok(None);
    };
    if !is_legal_flags(flags) {
        return Err(LongeronError::BadFrame("illegal flags byte"));
    }

    let header_len = if (flags & FLAG_LONG) != 0 { 9 } else { 2 };
    let Some(header) = queue.peek(header_len) else {
        return Ok(None);
    };

    let body_len = if header_len == 2 {
        header[1] as usize
    } else {
        let wire_len = u64::from_be_bytes(header[1..9].try_into().expect("peeked 9 bytes"));
        // ZMTP 3.x: the top bit of a long length must be clear.
        if wire_len > i64::MAX as u64 {
            return Err(LongeronError::BadFrame("length field out of range"));
        }
        wire_len as usize
    };

    if queue.len() < header_len + body_len {
        return Ok(None);
    }

    queue.skip(header_len);
    let payload = queue.take(body_len);
    Ok(Some(Frame { flags, payload }))
}

//! ZMTP greeting codec.
//!
//! The greeting is a fixed 64-byte record exchanged once per connection:
//!
//! ```text
//! [0]      0xFF          signature start
//! [1..9]   reserved      zero on send, ignored on receive
//! [9]      0x7F          signature end
//! [10]     major version (we emit 3)
//! [11]     minor version (we emit 1)
//! [12..32] mechanism     ASCII, zero-padded (we emit "NULL")
//! [32]     as-server     0x01 on the acceptor, 0x00 on the initiator
//! [33..64] reserved      zero on send, ignored on receive
//! ```

use longeron_core::error::{LongeronError, Result};

/// Greeting size on the wire.
pub const GREETING_SIZE: usize = 64;

/// Width of the zero-padded mechanism field.
pub const MECHANISM_SIZE: usize = 20;

/// Protocol version this library emits.
pub const PROTOCOL_VERSION: (u8, u8) = (3, 1);

const SIGNATURE_HEAD: u8 = 0xff;
const SIGNATURE_TAIL: u8 = 0x7f;

/// Security mechanism advertised in a greeting.
///
/// Only NULL is implemented; PLAIN and CURVE are recognized so a peer
/// advertising them gets a precise rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    Null,
    Plain,
    Curve,
    Other(String),
}

impl Mechanism {
    /// Parse the 20-byte mechanism field: zero padding trimmed, ASCII
    /// case ignored, empty treated as NULL.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let trimmed: &[u8] = match raw.iter().position(|&b| b == 0) {
            Some(end) => &raw[..end],
            None => raw,
        };
        let name = std::str::from_utf8(trimmed)
            .map_err(|_| LongeronError::BadFrame("non-ASCII mechanism name"))?;

        if name.is_empty() || name.eq_ignore_ascii_case("NULL") {
            Ok(Self::Null)
        } else if name.eq_ignore_ascii_case("PLAIN") {
            Ok(Self::Plain)
        } else if name.eq_ignore_ascii_case("CURVE") {
            Ok(Self::Curve)
        } else {
            Ok(Self::Other(name.to_ascii_uppercase()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Null => "NULL",
            Self::Plain => "PLAIN",
            Self::Curve => "CURVE",
            Self::Other(name) => name,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A parsed or to-be-sent greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub version: (u8, u8),
    pub mechanism: Mechanism,
    pub as_server: bool,
}

impl Greeting {
    /// The greeting this library sends: version 3.1, mechanism NULL.
    #[must_use]
    pub const fn local(as_server: bool) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            mechanism: Mechanism::Null,
            as_server,
        }
    }

    /// Serialize to the fixed 64-byte layout.
    #[must_use]
    pub fn encode(&self) -> [u8; GREETING_SIZE] {
        let mut out = [0u8; GREETING_SIZE];
        out[0] = SIGNATURE_HEAD;
        out[9] = SIGNATURE_TAIL;
        out[10] = self.version.0;
        out[11] = self.version.1;
        let name = self.mechanism.as_str().as_bytes();
        let len = name.len().min(MECHANISM_SIZE);
        out[12..12 + len].copy_from_slice(&name[..len]);
        out[32] = u8::from(self.as_server);
        out
    }

    /// Parse a full 64-byte greeting.
    ///
    /// The reserved ranges are ignored; the signature bytes and the
    /// mechanism field must be well formed. Version bytes are recorded,
    /// not validated.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < GREETING_SIZE {
            return Err(LongeronError::BadFrame("short greeting"));
        }
        if raw[0] != SIGNATURE_HEAD || raw[9] != SIGNATURE_TAIL {
            return Err(LongeronError::BadFrame("bad greeting signature"));
        }
        Ok(Self {
            version: (raw[10], raw[11]),
            mechanism: Mechanism::parse(&raw[12..32])?,
            as_server: (raw[32] & 0x01) != 0,
        })
    }
}

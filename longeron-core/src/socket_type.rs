//! ZeroMQ socket-type enumeration with ZMTP 3.1 wire values.

use std::fmt;

/// ZeroMQ socket types.
///
/// The discriminants are the classic `ZMQ_TYPE` integer values; the ASCII
/// names are what travels in the `Socket-Type` property of the READY
/// command. All twelve tags are representable for the handshake; only
/// REQ/REP/PUB/SUB carry data-plane behaviour in this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SocketType {
    Pair = 0,
    Pub = 1,
    Sub = 2,
    Req = 3,
    Rep = 4,
    Dealer = 5,
    Router = 6,
    Pull = 7,
    Push = 8,
    XPub = 9,
    XSub = 10,
    Stream = 11,
}

impl SocketType {
    /// The uppercase ASCII tag used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::Pull => "PULL",
            Self::Push => "PUSH",
            Self::XPub => "XPUB",
            Self::XSub => "XSUB",
            Self::Stream => "STREAM",
        }
    }

    /// Parse a peer's `Socket-Type` property value.
    #[must_use]
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"PAIR" => Some(Self::Pair),
            b"PUB" => Some(Self::Pub),
            b"SUB" => Some(Self::Sub),
            b"REQ" => Some(Self::Req),
            b"REP" => Some(Self::Rep),
            b"DEALER" => Some(Self::Dealer),
            b"ROUTER" => Some(Self::Router),
            b"PULL" => Some(Self::Pull),
            b"PUSH" => Some(Self::Push),
            b"XPUB" => Some(Self::XPub),
            b"XSUB" => Some(Self::XSub),
            b"STREAM" => Some(Self::Stream),
            _ => None,
        }
    }

    /// True if `peer` is a conventional counterpart for this type.
    ///
    /// Peer type is recorded during the handshake but never enforced; this
    /// check only feeds diagnostics.
    #[must_use]
    pub fn is_compatible(&self, peer: SocketType) -> bool {
        matches!(
            (self, peer),
            (Self::Pair, Self::Pair)
                | (Self::Pub, Self::Sub | Self::XSub)
                | (Self::Sub, Self::Pub | Self::XPub)
                | (Self::Req, Self::Rep | Self::Router)
                | (Self::Rep, Self::Req | Self::Dealer)
                | (Self::Dealer, Self::Rep | Self::Dealer | Self::Router)
                | (Self::Router, Self::Req | Self::Dealer | Self::Router)
                | (Self::Pull, Self::Push)
                | (Self::Push, Self::Pull)
                | (Self::XPub, Self::Sub | Self::XSub)
                | (Self::XSub, Self::Pub | Self::XPub)
        )
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values() {
        assert_eq!(SocketType::Pair as u8, 0);
        assert_eq!(SocketType::Pub as u8, 1);
        assert_eq!(SocketType::Sub as u8, 2);
        assert_eq!(SocketType::Req as u8, 3);
        assert_eq!(SocketType::Rep as u8, 4);
        assert_eq!(SocketType::Stream as u8, 11);
    }

    #[test]
    fn name_round_trip() {
        for st in [
            SocketType::Pair,
            SocketType::Pub,
            SocketType::Sub,
            SocketType::Req,
            SocketType::Rep,
            SocketType::Dealer,
            SocketType::Router,
            SocketType::Pull,
            SocketType::Push,
            SocketType::XPub,
            SocketType::XSub,
            SocketType::Stream,
        ] {
            assert_eq!(SocketType::from_name(st.as_str().as_bytes()), Some(st));
        }
        assert_eq!(SocketType::from_name(b"BOGUS"), None);
    }

    #[test]
    fn compatibility() {
        assert!(SocketType::Req.is_compatible(SocketType::Rep));
        assert!(SocketType::Pub.is_compatible(SocketType::Sub));
        assert!(SocketType::Sub.is_compatible(SocketType::XPub));
        assert!(!SocketType::Req.is_compatible(SocketType::Pub));
    }
}

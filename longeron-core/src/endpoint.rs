//! Endpoint-string parsing for `bind` and `connect`.
//!
//! Only the TCP transport is supported: `tcp://host:port`, where `host` is
//! an IPv4 literal, a resolvable name, or `*` (bind-only wildcard for
//! 0.0.0.0) and `port` is decimal 0–65535.

use std::fmt;
use std::str::FromStr;

use crate::error::{LongeronError, Result};

/// A parsed TCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse an endpoint string.
    ///
    /// Any scheme other than `tcp://`, a missing colon, or a non-decimal
    /// port yields [`LongeronError::InvalidEndpoint`].
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("tcp://")
            .ok_or_else(|| LongeronError::InvalidEndpoint(s.to_string()))?;

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| LongeronError::InvalidEndpoint(s.to_string()))?;

        if host.is_empty()
            || port.is_empty()
            || !port.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(LongeronError::InvalidEndpoint(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| LongeronError::InvalidEndpoint(s.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// The host part as written (`*` is preserved).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The decimal port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// True if the host is the bind-only wildcard `*`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.host == "*"
    }

    /// Host to hand to a listener: the wildcard maps to `0.0.0.0`.
    #[must_use]
    pub fn bind_host(&self) -> &str {
        if self.is_wildcard() {
            "0.0.0.0"
        } else {
            &self.host
        }
    }
}

impl FromStr for Endpoint {
    type Err = LongeronError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_literal() {
        let ep = Endpoint::parse("tcp://127.0.0.1:5555").unwrap();
        assert_eq!(ep.host(), "127.0.0.1");
        assert_eq!(ep.port(), 5555);
        assert_eq!(ep.to_string(), "tcp://127.0.0.1:5555");
    }

    #[test]
    fn parses_hostname() {
        let ep = Endpoint::parse("tcp://localhost:0").unwrap();
        assert_eq!(ep.host(), "localhost");
        assert_eq!(ep.port(), 0);
    }

    #[test]
    fn wildcard_maps_to_any() {
        let ep = Endpoint::parse("tcp://*:6000").unwrap();
        assert!(ep.is_wildcard());
        assert_eq!(ep.bind_host(), "0.0.0.0");
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(matches!(
            Endpoint::parse("udp://localhost:5555"),
            Err(LongeronError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Endpoint::parse("ipc:///tmp/x.sock"),
            Err(LongeronError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn rejects_missing_port() {
        assert!(matches!(
            Endpoint::parse("tcp://localhost"),
            Err(LongeronError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Endpoint::parse("tcp://localhost:").is_err());
        assert!(Endpoint::parse("tcp://localhost:66000").is_err());
        assert!(Endpoint::parse("tcp://localhost:+5").is_err());
        assert!(Endpoint::parse("tcp://:5555").is_err());
    }
}

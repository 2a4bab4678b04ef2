//! Per-peer subscription store for the PUB side.
//!
//! Each accepted subscriber connection owns one [`SubscriptionSet`]: a set
//! of unique byte-string topic prefixes plus a `match_all` flag toggled by
//! the empty topic. Matching is prefix-based, so a plain vector with a
//! linear scan is correct; uniqueness is the only invariant.

use bytes::Bytes;

/// Topic-prefix set with a separate catch-all flag.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    topics: Vec<Bytes>,
    match_all: bool,
}

impl SubscriptionSet {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            topics: Vec::new(),
            match_all: false,
        }
    }

    /// Record a subscription.
    ///
    /// The empty topic sets `match_all`; any other topic is inserted iff
    /// not already present.
    pub fn add(&mut self, topic: Bytes) {
        if topic.is_empty() {
            self.match_all = true;
        } else if !self.topics.contains(&topic) {
            self.topics.push(topic);
        }
    }

    /// Drop a subscription.
    ///
    /// The empty topic clears `match_all`; otherwise the first equal entry
    /// is removed, if any.
    pub fn remove(&mut self, topic: &[u8]) {
        if topic.is_empty() {
            self.match_all = false;
        } else if let Some(pos) = self.topics.iter().position(|t| t == topic) {
            self.topics.remove(pos);
        }
    }

    /// True if `message` should be delivered to this peer: either the
    /// catch-all flag is set or some stored prefix starts the message.
    #[must_use]
    pub fn matches(&self, message: &[u8]) -> bool {
        self.match_all || self.topics.iter().any(|t| message.starts_with(t))
    }

    #[must_use]
    pub const fn match_all(&self) -> bool {
        self.match_all
    }

    /// Number of stored prefixes (the catch-all flag is not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && !self.match_all
    }
}

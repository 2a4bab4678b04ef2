//! Byte-queue and owned-buffer helpers for completion-based I/O.

use bytes::{Buf, Bytes, BytesMut};

/// Inbound byte queue between stream reads and the frame parser.
///
/// Bytes are copied once on ingest into a single contiguous buffer, so
/// the parser can inspect headers as plain slices without any
/// gather/scatter bookkeeping. Extraction hands out `Bytes` views that
/// share the buffer's allocation, so a decoded payload costs no second
/// copy. The buffer's capacity is recycled as its front is consumed.
#[derive(Debug, Default)]
pub struct ReadQueue {
    buf: BytesMut,
}

impl ReadQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append freshly read bytes.
    #[inline]
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Borrow the first `n` queued bytes without consuming them, or
    /// `None` if fewer are buffered.
    #[inline]
    #[must_use]
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.buf.get(..n)
    }

    /// Discard the first `n` queued bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n > self.len()`.
    #[inline]
    pub fn skip(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Remove the first `n` queued bytes as an owned `Bytes` sharing
    /// this queue's allocation.
    ///
    /// # Panics
    ///
    /// Panics if `n > self.len()`.
    #[inline]
    pub fn take(&mut self, n: usize) -> Bytes {
        self.buf.split_to(n).freeze()
    }
}

/// Zero-copy `IoBuf` wrapper so `Bytes` can be handed to compio write
/// operations without an intermediate `to_vec` copy.
///
/// `Bytes` is immutable, refcounted, and contiguous, which is exactly what
/// an owned I/O buffer must guarantee.
pub struct IoBytes(Bytes);

impl IoBytes {
    #[must_use]
    pub const fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Bytes> for IoBytes {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

// SAFETY: the wrapped Bytes is immutable and refcounted; its pointer and
// length stay valid and stable for the whole I/O operation.
unsafe impl compio::buf::IoBuf for IoBytes {
    #[inline]
    fn as_buf_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    #[inline]
    fn buf_len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    fn buf_capacity(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_take() {
        let mut q = ReadQueue::new();
        q.push(b"hello world");
        assert_eq!(q.take(5), Bytes::from_static(b"hello"));
        assert_eq!(q.len(), 6);
        assert_eq!(q.take(6), Bytes::from_static(b" world"));
        assert!(q.is_empty());
    }

    #[test]
    fn pushes_coalesce() {
        let mut q = ReadQueue::new();
        q.push(b"he");
        q.push(b"l");
        q.push(b"lo!");
        // Arrival boundaries are invisible to the consumer.
        assert_eq!(q.peek(5), Some(&b"hello"[..]));
        assert_eq!(q.take(6), Bytes::from_static(b"hello!"));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut q = ReadQueue::new();
        q.push(b"abcd");
        assert_eq!(q.peek(2), Some(&b"ab"[..]));
        assert_eq!(q.peek(4), Some(&b"abcd"[..]));
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn peek_past_end_is_none() {
        let mut q = ReadQueue::new();
        q.push(b"ab");
        assert_eq!(q.peek(3), None);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn skip_then_take() {
        let mut q = ReadQueue::new();
        q.push(b"ab");
        q.push(b"cd");
        q.skip(3);
        assert_eq!(q.take(1), Bytes::from_static(b"d"));
        assert!(q.is_empty());
    }

    #[test]
    fn zero_length_operations() {
        let mut q = ReadQueue::new();
        assert_eq!(q.peek(0), Some(&b""[..]));
        assert_eq!(q.take(0), Bytes::new());
        q.push(b"");
        assert!(q.is_empty());
    }

    #[test]
    #[should_panic(expected = "advance")]
    fn skip_past_end_panics() {
        let mut q = ReadQueue::new();
        q.push(b"ab");
        q.skip(3);
    }
}

//! Record and connection identity types

use bytes::Bytes;

/// Unique identifier for a subscriber connection
///
/// Allocated from a counter owned by the engine and never reused.
pub type ConnectionId = u64;

/// One log line to be broadcast
///
/// Cheap to clone due to `Bytes` reference counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    data: Bytes,
}

impl Record {
    /// Copy the producer's buffer into a new record
    ///
    /// The caller may reuse `data` as soon as this returns.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Record payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload as text, if it is valid UTF-8
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Consume the record, returning its payload
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Bytes> for Record {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<&'static str> for Record {
    fn from(s: &'static str) -> Self {
        Self {
            data: Bytes::from_static(s.as_bytes()),
        }
    }
}

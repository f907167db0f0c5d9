//! Subscriber failure types
//!
//! These never reach the producer. They describe why a subscriber left the
//! registry and feed logging and stats.

/// Why a non-blocking enqueue onto a subscriber queue did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// Queue is at capacity: the subscriber is not keeping up
    Full,
    /// The outbound drain is gone
    Closed,
}

impl std::fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueError::Full => write!(f, "Outbound queue full"),
            EnqueueError::Closed => write!(f, "Outbound queue closed"),
        }
    }
}

impl std::error::Error for EnqueueError {}

/// Why a subscriber was removed from the registry
///
/// [`Overflow`](Self::Overflow) is the subscriber-overflow condition: the
/// broadcaster found the queue full and dropped the subscriber.
/// [`ReadClosed`](Self::ReadClosed) and [`WriteFailed`](Self::WriteFailed)
/// are the subscriber I/O errors, split by the drain that hit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Subscriber overflow: outbound queue was full at fan-out time
    Overflow,
    /// Subscriber I/O error on the inbound drain, or the peer closed the connection
    ReadClosed,
    /// Subscriber I/O error on the outbound drain: a frame could not be written
    WriteFailed,
    /// The outbound side was closed before the broadcaster reached it
    OutboundClosed,
    /// The engine shut down
    Shutdown,
}

impl DropReason {
    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            DropReason::Overflow => "overflow",
            DropReason::ReadClosed => "read_closed",
            DropReason::WriteFailed => "write_failed",
            DropReason::OutboundClosed => "outbound_closed",
            DropReason::Shutdown => "shutdown",
        }
    }
}

impl From<EnqueueError> for DropReason {
    fn from(e: EnqueueError) -> Self {
        match e {
            EnqueueError::Full => DropReason::Overflow,
            EnqueueError::Closed => DropReason::OutboundClosed,
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

//! Subscriber connection
//!
//! A connection is split in two halves at construction:
//!
//! - [`Connection`] is the enqueue side. It lives in the registry and only
//!   the broadcaster enqueues onto it.
//! - [`Outbound`] is the dequeue side, owned by the outbound drain that writes
//!   records to the socket.
//!
//! The halves share nothing but the queue and a close signal.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Notify};

use super::error::EnqueueError;
use super::record::{ConnectionId, Record};

/// Close signal shared by both halves
#[derive(Debug, Default)]
struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

/// Enqueue side of a subscriber connection
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Record>,
    signal: Arc<CloseSignal>,
    connected_at: Instant,
    enqueued: AtomicU64,
}

impl Connection {
    /// Create a connection with an empty outbound queue of `capacity` records
    ///
    /// A capacity of zero is treated as one.
    pub fn new(id: ConnectionId, capacity: usize) -> (Arc<Self>, Outbound) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let signal = Arc::new(CloseSignal::default());

        let connection = Arc::new(Self {
            id,
            tx,
            signal: Arc::clone(&signal),
            connected_at: Instant::now(),
            enqueued: AtomicU64::new(0),
        });

        (connection, Outbound { id, rx, signal })
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Try to queue a record without waiting
    pub fn try_enqueue(&self, record: Record) -> Result<(), EnqueueError> {
        if self.is_closed() {
            return Err(EnqueueError::Closed);
        }

        match self.tx.try_send(record) {
            Ok(()) => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(EnqueueError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Stop the outbound side
    ///
    /// Records still queued are discarded. Returns `true` only for the call
    /// that actually closed the connection.
    pub fn close(&self) -> bool {
        if self.signal.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // notify_one stores a permit, so a drain that is not parked yet still wakes
        self.signal.notify.notify_one();
        true
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.signal.closed.load(Ordering::Acquire)
    }

    /// Number of records currently waiting in the queue
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Total records enqueued over the connection's life
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Time since the connection was created
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Dequeue side of a subscriber connection
#[derive(Debug)]
pub struct Outbound {
    id: ConnectionId,
    rx: mpsc::Receiver<Record>,
    signal: Arc<CloseSignal>,
}

impl Outbound {
    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next record
    ///
    /// Returns `None` once the connection is closed or its enqueue side has
    /// been dropped.
    pub async fn next(&mut self) -> Option<Record> {
        if self.signal.closed.load(Ordering::Acquire) {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.signal.notify.notified() => None,
            record = self.rx.recv() => record,
        }
    }

    /// Whether the connection has been closed
    pub fn is_closed(&self) -> bool {
        self.signal.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_enqueue_and_drain_in_order() {
        let (conn, mut outbound) = Connection::new(1, 4);

        conn.try_enqueue(Record::from("a")).unwrap();
        conn.try_enqueue(Record::from("b")).unwrap();
        assert_eq!(conn.queued(), 2);

        assert_eq!(outbound.next().await, Some(Record::from("a")));
        assert_eq!(outbound.next().await, Some(Record::from("b")));
        assert_eq!(conn.enqueued(), 2);
        assert_eq!(conn.queued(), 0);
    }

    #[tokio::test]
    async fn test_full_queue() {
        let (conn, _outbound) = Connection::new(1, 2);

        conn.try_enqueue(Record::from("1")).unwrap();
        conn.try_enqueue(Record::from("2")).unwrap();

        assert_eq!(conn.try_enqueue(Record::from("3")), Err(EnqueueError::Full));
        assert_eq!(conn.queued(), conn.capacity());
    }

    #[tokio::test]
    async fn test_close_discards_queued_records() {
        let (conn, mut outbound) = Connection::new(7, 4);
        conn.try_enqueue(Record::from("pending")).unwrap();

        assert!(conn.close());
        assert!(!conn.close());
        assert!(outbound.is_closed());

        assert_eq!(outbound.next().await, None);
        assert_eq!(conn.try_enqueue(Record::from("late")), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn test_close_wakes_parked_drain() {
        let (conn, mut outbound) = Connection::new(3, 4);

        let drain = tokio::spawn(async move { outbound.next().await });
        tokio::task::yield_now().await;
        conn.close();

        let result = timeout(Duration::from_secs(1), drain).await.unwrap().unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_dropped_outbound_reports_closed() {
        let (conn, outbound) = Connection::new(1, 4);
        drop(outbound);

        assert_eq!(conn.try_enqueue(Record::from("x")), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn test_dropped_enqueue_side_ends_drain() {
        let (conn, mut outbound) = Connection::new(1, 4);
        drop(conn);

        assert_eq!(outbound.next().await, None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (conn, _outbound) = Connection::new(1, 0);
        assert_eq!(conn.capacity(), 1);
    }
}

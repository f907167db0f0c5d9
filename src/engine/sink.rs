//! Producer-facing sink
//!
//! [`LogSink`] is the write endpoint a logging facility plugs into. Each
//! sink has its own open/closed state; all sinks from one engine feed the
//! same broadcast channel.

use std::io;
use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use crate::error::{Error, Result};
use crate::registry::Record;
use crate::stats::RelayStats;

/// Write endpoint feeding the engine's broadcast channel
///
/// `write` and `close` take the same lock, so no write can succeed once a
/// close has taken effect.
pub struct LogSink {
    tx: mpsc::Sender<Record>,
    closed: Mutex<bool>,
    stats: Arc<RelayStats>,
}

impl LogSink {
    pub(crate) fn new(tx: mpsc::Sender<Record>, stats: Arc<RelayStats>) -> Self {
        Self {
            tx,
            closed: Mutex::new(false),
            stats,
        }
    }

    /// Copy `buf` into a record and queue it for broadcast
    ///
    /// Waits only while the broadcast channel is full. Returns the number of
    /// bytes accepted, which is always `buf.len()`.
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        let closed = self.closed.lock().await;
        if *closed {
            return Err(Error::AdapterClosed);
        }

        self.tx
            .send(Record::copy_from_slice(buf))
            .await
            .map_err(|_| Error::EngineStopped)?;
        self.stats.record_written();

        Ok(buf.len())
    }

    /// Close the sink; later writes fail with [`Error::AdapterClosed`]
    pub async fn close(&self) -> Result<()> {
        let mut closed = self.closed.lock().await;
        if *closed {
            return Err(Error::AdapterClosed);
        }
        *closed = true;
        Ok(())
    }

    /// Whether the sink has been closed
    pub async fn is_closed(&self) -> bool {
        *self.closed.lock().await
    }

    /// Non-blocking variant of [`write`](Self::write)
    ///
    /// Fails with [`Error::SinkFull`] instead of waiting when the broadcast
    /// channel is full or another write on this sink is in progress. The
    /// record is not queued in that case.
    pub fn try_write(&self, buf: &[u8]) -> Result<usize> {
        let closed = self.closed.try_lock().map_err(|_| Error::SinkFull)?;
        if *closed {
            return Err(Error::AdapterClosed);
        }

        match self.tx.try_send(Record::copy_from_slice(buf)) {
            Ok(()) => {
                self.stats.record_written();
                Ok(buf.len())
            }
            Err(TrySendError::Full(_)) => Err(Error::SinkFull),
            Err(TrySendError::Closed(_)) => Err(Error::EngineStopped),
        }
    }

    /// Blocking variant of [`write`](Self::write)
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_write(&self, buf: &[u8]) -> Result<usize> {
        let closed = self.closed.blocking_lock();
        if *closed {
            return Err(Error::AdapterClosed);
        }

        self.tx
            .blocking_send(Record::copy_from_slice(buf))
            .map_err(|_| Error::EngineStopped)?;
        self.stats.record_written();

        Ok(buf.len())
    }

    /// Blocking variant of [`close`](Self::close)
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_close(&self) -> Result<()> {
        let mut closed = self.closed.blocking_lock();
        if *closed {
            return Err(Error::AdapterClosed);
        }
        *closed = true;
        Ok(())
    }

    /// Wrap the sink in a cloneable [`std::io::Write`] adapter
    pub fn into_writer(self) -> SinkWriter {
        SinkWriter {
            sink: Arc::new(self),
        }
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("channel_capacity", &self.tx.max_capacity())
            .finish_non_exhaustive()
    }
}

/// [`std::io::Write`] adapter over a shared [`LogSink`]
///
/// Every `write` call becomes one record. Clones share the sink, and so
/// share its closed state. Suitable as a `tracing_subscriber` writer next
/// to the usual stdout layer:
///
/// ```no_run
/// use tracing_subscriber::filter::filter_fn;
/// use tracing_subscriber::prelude::*;
///
/// # fn example(engine: &ws_log_relay::Engine) {
/// let writer = engine.sink().into_writer();
/// tracing_subscriber::registry()
///     .with(tracing_subscriber::fmt::layer())
///     .with(
///         tracing_subscriber::fmt::layer()
///             .json()
///             .with_writer(move || writer.clone())
///             .with_filter(filter_fn(|meta| !meta.target().starts_with("ws_log_relay"))),
///     )
///     .init();
/// # }
/// ```
///
/// The relay's own events must not be routed back into the sink: the
/// broadcaster would end up waiting on the channel it drains.
///
/// How a write waits depends on the calling thread:
///
/// - outside any runtime it blocks while the broadcast channel is full;
/// - on a multi-threaded runtime it blocks in place, so other tasks keep
///   running on the remaining workers;
/// - on a current-thread runtime it cannot block, so a record that does not
///   fit is dropped, counted in [`StatsSnapshot::records_dropped`], and the
///   write fails with [`io::ErrorKind::WouldBlock`].
///
/// [`StatsSnapshot::records_dropped`]: crate::StatsSnapshot::records_dropped
#[derive(Debug, Clone)]
pub struct SinkWriter {
    sink: Arc<LogSink>,
}

impl SinkWriter {
    /// The underlying sink
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }
}

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = match Handle::try_current() {
            Err(_) => self.sink.blocking_write(buf),
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| handle.block_on(self.sink.write(buf)))
                }
                _ => self.sink.try_write(buf),
            },
        };

        if let Err(Error::SinkFull) = result {
            self.sink.stats.record_dropped();
        }
        result.map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

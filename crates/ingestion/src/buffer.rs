//! Ingestion Buffer
//!
//! Bounded FIFO shared by every source runner (producers) and the Stream
//! Processor (consumer). Enqueue never blocks: a full buffer evicts its
//! oldest record and counts a drop. Dequeue is size- or time-bounded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{Batch, DropOldestRing, Record};
use observability::{metrics::record_buffer_depth, MetricsCollector};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::error::{IngestionError, Result};

struct BufferInner {
    ring: DropOldestRing<Record>,
    closed: bool,
}

/// Bounded drop-oldest queue of `Record`s
pub struct IngestionBuffer {
    inner: Mutex<BufferInner>,
    notify: Notify,
    next_batch_id: AtomicU64,
    collector: Arc<MetricsCollector>,
}

impl std::fmt::Debug for IngestionBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("IngestionBuffer")
            .field("len", &inner.ring.len())
            .field("capacity", &inner.ring.capacity())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl IngestionBuffer {
    pub fn new(capacity: usize, collector: Arc<MetricsCollector>) -> Self {
        Self {
            inner: Mutex::new(BufferInner {
                ring: DropOldestRing::new(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            next_batch_id: AtomicU64::new(1),
            collector,
        }
    }

    /// Enqueue one record
    ///
    /// Returns the evicted oldest record if the buffer was full.
    pub fn push(&self, record: Record) -> Result<Option<Record>> {
        let source = record.source().clone();
        let (evicted, depth) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(IngestionError::BufferClosed);
            }
            let evicted = inner.ring.push(record);
            (evicted, inner.ring.len())
        };

        self.collector.record_ingested(&source, 1);
        if let Some(old) = &evicted {
            trace!(source = %old.source(), sequence = old.sequence(), "buffer full, oldest record evicted");
            self.collector.record_dropped(1);
        }
        record_buffer_depth(depth);
        self.notify.notify_one();
        Ok(evicted)
    }

    /// Enqueue a source's records in order under one lock
    ///
    /// Returns how many older records were evicted.
    pub fn push_all(&self, records: Vec<Record>) -> Result<u64> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        let source = first.source().clone();
        let accepted = records.len() as u64;

        let (evicted, depth) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(IngestionError::BufferClosed);
            }
            let evicted = records
                .into_iter()
                .filter_map(|r| inner.ring.push(r))
                .count() as u64;
            (evicted, inner.ring.len())
        };

        self.collector.record_ingested(&source, accepted);
        if evicted > 0 {
            debug!(source = %source, evicted, "buffer overflow, oldest records evicted");
            self.collector.record_dropped(evicted);
        }
        record_buffer_depth(depth);
        self.notify.notify_one();
        Ok(evicted)
    }

    /// Dequeue the next batch
    ///
    /// Returns as soon as `max` records are buffered; otherwise waits up to
    /// `wait` and returns whatever is available. An empty wait restarts the
    /// timer. Returns `None` once the buffer is closed and drained.
    pub async fn next_batch(&self, max: usize, wait: Duration) -> Option<Batch> {
        let max = max.max(1);
        let mut deadline = Instant::now() + wait;

        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                let len = inner.ring.len();
                if len >= max || (inner.closed && len > 0) {
                    return Some(self.take(&mut inner, max));
                }
                if inner.closed {
                    return None;
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                let mut inner = self.inner.lock();
                if !inner.ring.is_empty() {
                    return Some(self.take(&mut inner, max));
                }
                if inner.closed {
                    return None;
                }
                deadline = Instant::now() + wait;
            }
        }
    }

    fn take(&self, inner: &mut BufferInner, max: usize) -> Batch {
        let records = inner.ring.drain_up_to(max);
        record_buffer_depth(inner.ring.len());
        let id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
        Batch::new(id, records)
    }

    /// Refuse further enqueues; the consumer drains what is left
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().ring.capacity()
    }
}

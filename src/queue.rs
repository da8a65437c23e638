// Fieldgate - Wireless field-bus sensor gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bounded reading queue
//!
//! The hand-off between the poller (producer) and the reporter
//! (consumer). A classic bounded FIFO: fixed capacity, drop-new on
//! overflow, insertion order preserved. Handles are cheap clones over
//! shared state; the queue serializes all access internally.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::record::SensorRecord;

#[derive(Debug)]
struct QueueInner {
    items: VecDeque<SensorRecord>,
    closed: bool,
}

#[derive(Debug)]
struct QueueShared {
    inner: Mutex<QueueInner>,
    ready: Condvar,
    capacity: usize,
}

/// Fixed-capacity FIFO of sensor readings
///
/// - `try_enqueue` never blocks and never evicts: at capacity the new
///   record is refused and the queue is left unchanged.
/// - `dequeue` blocks until a record is available, or until the queue is
///   closed and drained.
#[derive(Debug, Clone)]
pub struct SensorQueue {
    shared: Arc<QueueShared>,
}

impl SensorQueue {
    /// Create a queue with the given fixed capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                inner: Mutex::new(QueueInner {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                ready: Condvar::new(),
                capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Offer a record without blocking
    ///
    /// Returns false when the queue is at capacity or closed; the record
    /// is dropped by the caller, existing entries are never evicted.
    pub fn try_enqueue(&self, record: SensorRecord) -> bool {
        let mut inner = self.lock();
        if inner.closed || inner.items.len() >= self.shared.capacity {
            return false;
        }
        inner.items.push_back(record);
        drop(inner);
        self.shared.ready.notify_one();
        true
    }

    /// Take the oldest record, blocking until one is available
    ///
    /// Returns None only after [`close`](Self::close) once the queue has
    /// drained.
    pub fn dequeue(&self) -> Option<SensorRecord> {
        let mut inner = self.lock();
        loop {
            if let Some(record) = inner.items.pop_front() {
                return Some(record);
            }
            if inner.closed {
                return None;
            }
            inner = self
                .shared
                .ready
                .wait(inner)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Take the oldest record, waiting at most `timeout`
    ///
    /// Returns None on timeout or after close-and-drain.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<SensorRecord> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if let Some(record) = inner.items.pop_front() {
                return Some(record);
            }
            if inner.closed {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, result) = self
                .shared
                .ready
                .wait_timeout(inner, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            inner = guard;
            if result.timed_out() && inner.items.is_empty() {
                return None;
            }
        }
    }

    /// Close the queue
    ///
    /// Refuses further enqueues and releases blocked consumers once the
    /// remaining records drain.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        drop(inner);
        self.shared.ready.notify_all();
    }

    /// Current number of queued records
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether the queue holds no records
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Fixed capacity set at construction
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

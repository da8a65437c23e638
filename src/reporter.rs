// Fieldgate - Wireless field-bus sensor gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reading drain and emission
//!
//! The reporter consumes the queue forever and hands each reading to a
//! [`ReadingSink`]. Emission failures are logged and the reading is not
//! requeued; the queue sees no back-pressure from the sink.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::error::ReportError;
use crate::queue::SensorQueue;
use crate::record::SensorRecord;

/// Destination for completed readings
pub trait ReadingSink: Send {
    /// Emit one reading
    fn emit(&mut self, record: &SensorRecord) -> Result<(), ReportError>;
}

/// Sink that writes readings to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReadingSink for LogSink {
    fn emit(&mut self, record: &SensorRecord) -> Result<(), ReportError> {
        let stamp = match record.timestamp {
            Some(timestamp) => timestamp.to_string(),
            None => "unknown time".to_string(),
        };
        info!(
            "unit {} [{}]: status {:#06x}, humidity {:.1}%, temperature {:.1}C",
            record.device, stamp, record.status, record.humidity, record.temperature
        );
        Ok(())
    }
}

/// Sink that collects readings in memory, for tests
///
/// Clones share the same backing store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SensorRecord>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn records(&self) -> Vec<SensorRecord> {
        self.lock().clone()
    }

    /// Number of readings emitted so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was emitted yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SensorRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReadingSink for MemorySink {
    fn emit(&mut self, record: &SensorRecord) -> Result<(), ReportError> {
        self.lock().push(record.clone());
        Ok(())
    }
}

/// Drains the queue into a sink until the queue closes
pub struct Reporter<S: ReadingSink> {
    queue: SensorQueue,
    sink: S,
    emitted: u64,
    failed: u64,
}

impl<S: ReadingSink> Reporter<S> {
    /// Create a reporter over the given queue and sink
    pub fn new(queue: SensorQueue, sink: S) -> Self {
        Self {
            queue,
            sink,
            emitted: 0,
            failed: 0,
        }
    }

    /// Consume readings until the queue is closed and drained
    pub fn run(&mut self) {
        while let Some(record) = self.queue.dequeue() {
            match self.sink.emit(&record) {
                Ok(()) => self.emitted += 1,
                Err(error) => {
                    self.failed += 1;
                    warn!("unit {}: emit failed: {}", record.device, error);
                }
            }
        }
    }

    /// Readings emitted successfully
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Readings the sink rejected
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

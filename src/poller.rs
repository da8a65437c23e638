// Fieldgate - Wireless field-bus sensor gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Round-robin device polling
//!
//! One cycle visits every configured device in configuration order: read
//! the wall clock, issue a single contiguous register-block read, decode,
//! and offer the reading to the queue without blocking. A failing device
//! is logged and skipped for the rest of the cycle; it is never retried
//! within the cycle and never stops the other devices from being read.
//!
//! Polling is fully decoupled from connectivity: the poller neither
//! checks nor waits on the link.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::clock::TimeSource;
use crate::config::{DeviceDescriptor, PollingConfig};
use crate::gpio::DigitalOutput;
use crate::queue::SensorQueue;
use crate::transport::RegisterTransport;

/// Counters accumulated by the polling loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Completed cycles
    pub cycles: u64,
    /// Readings accepted by the queue
    pub readings: u64,
    /// Device reads that failed on the bus
    pub transport_errors: u64,
    /// Wall-clock reads that failed
    pub clock_errors: u64,
    /// Readings dropped because the queue was full
    pub dropped: u64,
}

/// Drives the per-cycle read, timestamp, decode, enqueue sequence
pub struct DevicePoller<T: RegisterTransport, C: TimeSource> {
    devices: Vec<DeviceDescriptor>,
    transport: T,
    clock: C,
    queue: SensorQueue,
    device_gap: Duration,
    cycle_interval: Duration,
    status_pin: Option<Box<dyn DigitalOutput>>,
    stats: PollerStats,
}

impl<T: RegisterTransport, C: TimeSource> DevicePoller<T, C> {
    /// Create a poller over the given device set
    pub fn new(
        polling: &PollingConfig,
        devices: Vec<DeviceDescriptor>,
        transport: T,
        clock: C,
        queue: SensorQueue,
    ) -> Self {
        Self {
            devices,
            transport,
            clock,
            queue,
            device_gap: polling.device_gap,
            cycle_interval: polling.cycle_interval,
            status_pin: None,
            stats: PollerStats::default(),
        }
    }

    /// Attach a status pin, toggled once per completed cycle
    pub fn with_status_pin(mut self, pin: Box<dyn DigitalOutput>) -> Self {
        self.status_pin = Some(pin);
        self
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> PollerStats {
        self.stats
    }

    /// Execute one polling cycle over all configured devices
    pub fn poll_cycle(&mut self) {
        for (index, device) in self.devices.iter().enumerate() {
            if index > 0 && !self.device_gap.is_zero() {
                thread::sleep(self.device_gap);
            }

            // A clock failure never aborts the device read; the reading
            // goes out with an unknown timestamp instead.
            let timestamp = match self.clock.now() {
                Ok(now) => Some(now),
                Err(error) => {
                    self.stats.clock_errors += 1;
                    warn!("unit {}: clock read failed: {}", device.unit_id, error);
                    None
                }
            };

            let words = match self.transport.read_register_block(
                device.unit_id,
                device.block_start,
                device.block_words(),
            ) {
                Ok(words) => words,
                Err(error) => {
                    self.stats.transport_errors += 1;
                    warn!("unit {}: block read failed: {}", device.unit_id, error);
                    continue;
                }
            };

            let record = match device.decode(timestamp, &words) {
                Ok(record) => record,
                Err(error) => {
                    self.stats.transport_errors += 1;
                    warn!("unit {}: {}", device.unit_id, error);
                    continue;
                }
            };

            if self.queue.try_enqueue(record) {
                self.stats.readings += 1;
                debug!("unit {}: reading queued", device.unit_id);
            } else {
                self.stats.dropped += 1;
                warn!("unit {}: queue full, reading dropped", device.unit_id);
            }
        }
        self.stats.cycles += 1;
    }

    /// Poll forever, pausing `cycle_interval` between cycles
    ///
    /// Returns once the shutdown flag is raised; the inter-cycle pause
    /// observes the flag so shutdown stays prompt.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Acquire) {
            self.poll_cycle();
            if let Some(pin) = self.status_pin.as_mut() {
                pin.toggle();
            }
            if !sleep_observing(self.cycle_interval, shutdown) {
                break;
            }
        }
    }
}

/// Sleep for `duration`, returning false early if the flag is raised
fn sleep_observing(duration: Duration, shutdown: &AtomicBool) -> bool {
    const STEP: Duration = Duration::from_millis(25);

    let deadline = Instant::now() + duration;
    loop {
        if shutdown.load(Ordering::Acquire) {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(STEP));
    }
}

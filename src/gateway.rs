// Fieldgate - Wireless field-bus sensor gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Gateway assembly and task lifecycle
//!
//! [`Gateway::start`] wires the components together and spawns the three
//! cooperating tasks: the connectivity event pump, the polling loop and
//! the reporter drain. The tasks share nothing but the reading queue and
//! the link-state view; polling never waits on connectivity.
//!
//! Startup-time infrastructure failures (invalid configuration, a dead
//! wireless interface, thread spawn errors) abort `start`. After a
//! successful start nothing is fatal: device, clock and sink failures
//! are all absorbed by the owning task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::info;

use crate::clock::TimeSource;
use crate::config::GatewayConfig;
use crate::connectivity::{ConnectivityManager, LinkState, LinkStatus, WirelessLink};
use crate::error::{GatewayError, Result};
use crate::gpio::DigitalOutput;
use crate::poller::DevicePoller;
use crate::queue::SensorQueue;
use crate::reporter::{ReadingSink, Reporter};
use crate::transport::RegisterTransport;

/// Running gateway handle
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown)
/// detaches the tasks; they keep running for the life of the process.
pub struct Gateway {
    shutdown: Arc<AtomicBool>,
    queue: SensorQueue,
    status: LinkStatus,
    tasks: Vec<JoinHandle<()>>,
}

impl Gateway {
    /// Validate the configuration, connect the link and spawn all tasks
    pub fn start<T, C, L, S>(
        config: GatewayConfig,
        transport: T,
        clock: C,
        link: L,
        sink: S,
        status_pin: Option<Box<dyn DigitalOutput>>,
    ) -> Result<Self>
    where
        T: RegisterTransport + 'static,
        C: TimeSource + 'static,
        L: WirelessLink + 'static,
        S: ReadingSink + 'static,
    {
        config.validate()?;

        let queue = SensorQueue::with_capacity(config.queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut manager = ConnectivityManager::new(link, config.network.max_retries);
        let status = manager.status();
        manager.start(&config.network.ssid, &config.network.credential)?;

        let mut tasks = Vec::with_capacity(3);

        let pump_shutdown = Arc::clone(&shutdown);
        tasks.push(spawn_task("fieldgate-link", move || {
            manager.run(&pump_shutdown);
        })?);

        let mut poller = DevicePoller::new(
            &config.polling,
            config.devices,
            transport,
            clock,
            queue.clone(),
        );
        if let Some(pin) = status_pin {
            poller = poller.with_status_pin(pin);
        }
        let poll_shutdown = Arc::clone(&shutdown);
        tasks.push(spawn_task("fieldgate-poll", move || {
            poller.run(&poll_shutdown);
        })?);

        let mut reporter = Reporter::new(queue.clone(), sink);
        tasks.push(spawn_task("fieldgate-report", move || {
            reporter.run();
        })?);

        info!("gateway up");
        Ok(Self {
            shutdown,
            queue,
            status,
            tasks,
        })
    }

    /// Cloneable view of the link state
    pub fn link_status(&self) -> LinkStatus {
        self.status.clone()
    }

    /// Non-blocking connected check
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Block until the link settles or the timeout passes
    pub fn await_link(&self, timeout: Option<Duration>) -> LinkState {
        self.status.await_outcome(timeout)
    }

    /// Handle on the reading queue
    pub fn queue(&self) -> SensorQueue {
        self.queue.clone()
    }

    /// Stop all tasks and wait for them to finish
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.queue.close();
        for task in self.tasks.drain(..) {
            let _ = task.join();
        }
        info!("gateway down");
    }
}

fn spawn_task<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|error| GatewayError::Startup(format!("spawning {}: {}", name, error)))
}

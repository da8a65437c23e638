// Fieldgate - Wireless field-bus sensor gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Wireless connectivity lifecycle
//!
//! [`ConnectivityManager`] owns the link state machine and its bounded
//! retry budget. Transitions are driven only by [`LinkEvent`]s from the
//! network stack:
//!
//! - station started: issue a connect request immediately
//! - disconnected: retry while budget remains, else enter `Failed`
//! - address acquired: enter `Connected`, reset the budget
//!
//! `Failed` is terminal until a fresh [`start`](ConnectivityManager::start).
//! The manager is the single writer of the shared state; any task may
//! read it through a cloned [`LinkStatus`] without further coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::ConnectivityError;

/// Link lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Never started
    #[default]
    Idle,
    /// Attempting to associate and acquire an address
    Connecting,
    /// Link is up
    Connected,
    /// Retry budget exhausted; terminal until a fresh start
    Failed,
}

impl LinkState {
    /// Whether the state is a final connection outcome
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Connected | Self::Failed)
    }
}

/// Events delivered by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Station interface came up
    StationStarted,
    /// Association lost or attempt failed
    Disconnected,
    /// Address acquired, link usable
    AddressAcquired,
}

/// Command surface of the wireless driver
pub trait WirelessLink: Send {
    /// Bring the station interface up for the given network
    fn begin(&mut self, ssid: &str, credential: &str) -> Result<(), ConnectivityError>;

    /// Issue one association attempt
    fn request_connect(&mut self) -> Result<(), ConnectivityError>;

    /// Wait up to `timeout` for the next event from the stack
    fn poll_event(&mut self, timeout: Duration) -> Option<LinkEvent>;
}

#[derive(Debug)]
struct LinkInner {
    state: LinkState,
    retries: u32,
}

#[derive(Debug)]
struct LinkShared {
    inner: Mutex<LinkInner>,
    settled: Condvar,
    connected: AtomicBool,
}

impl LinkShared {
    fn lock(&self) -> MutexGuard<'_, LinkInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read-only view of the link state, cloneable across tasks
#[derive(Debug, Clone)]
pub struct LinkStatus {
    shared: Arc<LinkShared>,
}

impl LinkStatus {
    /// Current state snapshot
    pub fn state(&self) -> LinkState {
        self.shared.lock().state
    }

    /// Non-blocking connected check
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Consecutive disconnects seen since the last successful connect
    pub fn retries(&self) -> u32 {
        self.shared.lock().retries
    }

    /// Block until the link reaches `Connected` or `Failed`
    ///
    /// With a timeout, returns the current (possibly unsettled) state
    /// when the deadline passes.
    pub fn await_outcome(&self, timeout: Option<Duration>) -> LinkState {
        let mut inner = self.shared.lock();
        match timeout {
            None => {
                while !inner.state.is_settled() {
                    inner = self
                        .shared
                        .settled
                        .wait(inner)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                inner.state
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !inner.state.is_settled() {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    let (guard, _) = self
                        .shared
                        .settled
                        .wait_timeout(inner, remaining)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    inner = guard;
                }
                inner.state
            }
        }
    }
}

/// Owner of the wireless connection lifecycle
pub struct ConnectivityManager<L: WirelessLink> {
    link: L,
    max_retries: u32,
    shared: Arc<LinkShared>,
}

impl<L: WirelessLink> ConnectivityManager<L> {
    /// Create a manager over the given driver with a retry budget
    pub fn new(link: L, max_retries: u32) -> Self {
        Self {
            link,
            max_retries,
            shared: Arc::new(LinkShared {
                inner: Mutex::new(LinkInner {
                    state: LinkState::Idle,
                    retries: 0,
                }),
                settled: Condvar::new(),
                connected: AtomicBool::new(false),
            }),
        }
    }

    /// Get a cloneable read-only view of the link state
    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Begin a connection attempt
    ///
    /// Idempotent while already `Connecting` or `Connected`. From `Idle`
    /// or `Failed`, resets the retry budget and brings the interface up;
    /// a driver failure here aborts the start and leaves the manager
    /// `Idle`.
    pub fn start(&mut self, ssid: &str, credential: &str) -> Result<(), ConnectivityError> {
        {
            let mut inner = self.shared.lock();
            match inner.state {
                LinkState::Connecting | LinkState::Connected => return Ok(()),
                LinkState::Idle | LinkState::Failed => {
                    inner.state = LinkState::Connecting;
                    inner.retries = 0;
                }
            }
        }
        self.shared.connected.store(false, Ordering::Release);

        if let Err(error) = self.link.begin(ssid, credential) {
            self.shared.lock().state = LinkState::Idle;
            return Err(error);
        }
        info!("link: connecting to '{}'", ssid);
        Ok(())
    }

    /// Apply one event from the network stack
    ///
    /// Events arriving in `Failed` are ignored; recovery requires a
    /// fresh `start`.
    pub fn handle_event(&mut self, event: LinkEvent) -> Result<(), ConnectivityError> {
        if self.shared.lock().state == LinkState::Failed {
            return Ok(());
        }

        match event {
            LinkEvent::StationStarted => self.link.request_connect(),
            LinkEvent::Disconnected => {
                self.shared.connected.store(false, Ordering::Release);
                let retry = {
                    let mut inner = self.shared.lock();
                    inner.retries += 1;
                    if inner.retries < self.max_retries {
                        inner.state = LinkState::Connecting;
                        true
                    } else {
                        inner.state = LinkState::Failed;
                        false
                    }
                };
                if retry {
                    debug!("link: disconnected, retrying");
                    self.link.request_connect()
                } else {
                    self.shared.settled.notify_all();
                    warn!("link: retry budget exhausted, giving up");
                    Ok(())
                }
            }
            LinkEvent::AddressAcquired => {
                {
                    let mut inner = self.shared.lock();
                    inner.state = LinkState::Connected;
                    inner.retries = 0;
                }
                self.shared.connected.store(true, Ordering::Release);
                self.shared.settled.notify_all();
                info!("link: connected");
                Ok(())
            }
        }
    }

    /// Block until the link settles, like [`LinkStatus::await_outcome`]
    pub fn await_outcome(&self, timeout: Option<Duration>) -> LinkState {
        self.status().await_outcome(timeout)
    }

    /// Non-blocking connected check
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Pump driver events until shutdown
    ///
    /// A driver error on a connect request marks the link `Failed`
    /// rather than tearing the task down.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        const TICK: Duration = Duration::from_millis(50);

        while !shutdown.load(Ordering::Acquire) {
            let Some(event) = self.link.poll_event(TICK) else {
                continue;
            };
            if let Err(error) = self.handle_event(event) {
                warn!("link: driver request failed: {}", error);
                self.shared.lock().state = LinkState::Failed;
                self.shared.connected.store(false, Ordering::Release);
                self.shared.settled.notify_all();
            }
        }
    }
}

/// Scripted in-memory driver for testing
///
/// `begin` queues a station-started event; each connect request is
/// counted, and optionally answered with an address-acquired event when
/// auto-acquire is on. Tests push disconnects to exercise the retry
/// path.
#[derive(Debug, Default)]
pub struct MemoryLink {
    events: std::collections::VecDeque<LinkEvent>,
    connect_attempts: u32,
    begin_calls: u32,
    auto_acquire: bool,
    fail_begin: bool,
}

impl MemoryLink {
    /// Create an idle scripted driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every connect request with an address-acquired event
    pub fn set_auto_acquire(&mut self, auto_acquire: bool) {
        self.auto_acquire = auto_acquire;
    }

    /// Make `begin` fail, simulating a dead interface
    pub fn set_fail_begin(&mut self, fail_begin: bool) {
        self.fail_begin = fail_begin;
    }

    /// Queue an event for the pump to pick up
    pub fn push_event(&mut self, event: LinkEvent) {
        self.events.push_back(event);
    }

    /// Association attempts issued so far
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Times the interface was brought up
    pub fn begin_calls(&self) -> u32 {
        self.begin_calls
    }
}

impl WirelessLink for MemoryLink {
    fn begin(&mut self, _ssid: &str, _credential: &str) -> Result<(), ConnectivityError> {
        if self.fail_begin {
            return Err(ConnectivityError::Interface {
                reason: "interface did not come up".to_string(),
            });
        }
        self.begin_calls += 1;
        self.events.push_back(LinkEvent::StationStarted);
        Ok(())
    }

    fn request_connect(&mut self) -> Result<(), ConnectivityError> {
        self.connect_attempts += 1;
        if self.auto_acquire {
            self.events.push_back(LinkEvent::AddressAcquired);
        }
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Option<LinkEvent> {
        match self.events.pop_front() {
            Some(event) => Some(event),
            None => {
                std::thread::sleep(timeout);
                None
            }
        }
    }
}

//! # Fieldgate - Wireless field-bus sensor gateway
//!
//! A gateway core for constrained devices: keep a wireless link up with a
//! bounded retry budget, round-robin a fixed fleet of register-mapped
//! field devices, stamp each reading with wall-clock time, and hand the
//! readings to a bounded queue for asynchronous reporting.
//!
//! ## Key Features
//!
//! - **Bounded-retry connectivity**: event-driven link state machine,
//!   terminal `Failed` after the budget runs out
//! - **Deterministic polling**: devices are visited in configuration
//!   order; one failing device never stops the cycle
//! - **Bounded hand-off**: fixed-capacity FIFO with drop-new overflow,
//!   no back-pressure on the sensing path
//! - **Swappable hardware**: register bus, wall clock, wireless driver
//!   and status pin all sit behind traits with in-memory fakes
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldgate::{
//!     DeviceDescriptor, DevicePoller, MemoryTransport, PollingConfig, SensorQueue, SystemClock,
//! };
//!
//! // Image one device: a status word plus two big-endian float pairs
//! let mut bus = MemoryTransport::new();
//! bus.set_block(1, 0, &[0x0001, 0x4120, 0x0000, 0x41A0, 0x0000]);
//!
//! let queue = SensorQueue::with_capacity(50);
//! let mut poller = DevicePoller::new(
//!     &PollingConfig::immediate(),
//!     vec![DeviceDescriptor::new(1)],
//!     bus,
//!     SystemClock,
//!     queue.clone(),
//! );
//!
//! poller.poll_cycle();
//!
//! let reading = queue.dequeue().unwrap();
//! assert_eq!(reading.humidity, 10.0);
//! assert_eq!(reading.temperature, 20.0);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Gateway                                            │
//! │                                                     │
//! │  ConnectivityManager ── LinkStatus (shared view)    │
//! │                                                     │
//! │  DevicePoller ──→ SensorQueue ──→ Reporter ──→ Sink │
//! │   │        │                                        │
//! │   ▼        ▼                                        │
//! │  RegisterTransport   TimeSource                     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The three tasks are scheduled independently and cooperate only
//! through the queue and the link-state view; sensing is decoupled from
//! reporting and from connectivity.
//!
//! ## Modules
//!
//! - [`connectivity`]: link state machine and retry budget
//! - [`poller`]: round-robin polling cycle
//! - [`queue`]: bounded reading FIFO
//! - [`reporter`]: queue drain and emission
//! - [`transport`]: register bus abstraction
//! - [`clock`]: wall-clock sources, including a BCD RTC codec
//! - [`config`]: startup configuration and device descriptors
//! - [`gpio`]: status indicator abstraction

// Modules
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod gateway;
pub mod gpio;
pub mod poller;
pub mod queue;
pub mod record;
pub mod reporter;
pub mod transport;

// Re-exports for convenient access
pub use clock::{BcdRtc, FailingClock, FixedClock, RtcBus, SystemClock, TimeSource};
pub use config::{BlockLayout, DeviceDescriptor, GatewayConfig, NetworkConfig, PollingConfig};
pub use connectivity::{
    ConnectivityManager, LinkEvent, LinkState, LinkStatus, MemoryLink, WirelessLink,
};
pub use error::{
    ClockError, ConnectivityError, GatewayError, ReportError, Result, TransportError,
};
pub use gateway::Gateway;
pub use gpio::{DigitalOutput, MemoryPin};
pub use poller::{DevicePoller, PollerStats};
pub use queue::SensorQueue;
pub use record::{float_from_words, SensorRecord};
pub use reporter::{LogSink, MemorySink, ReadingSink, Reporter};
pub use transport::{MemoryTransport, RegisterTransport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default reading queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Default consecutive-disconnect budget before the link fails
pub const DEFAULT_MAX_RETRIES: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_defaults_flow_into_config() {
        let config = GatewayConfig::new(
            NetworkConfig::new("net", "pw"),
            vec![DeviceDescriptor::new(1)],
        );
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.network.max_retries, DEFAULT_MAX_RETRIES);
    }
}

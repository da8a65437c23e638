// Fieldgate - Wireless field-bus sensor gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for the gateway
//!
//! Everything here is supplied at startup and immutable thereafter. The
//! device table is data-driven: the set of polled devices and their
//! register layout come in through [`GatewayConfig`], not from tables
//! baked into the source.

use std::time::Duration;

use crate::error::{GatewayError, Result, TransportError};
use crate::record::{float_from_words, SensorRecord};
use crate::{DEFAULT_MAX_RETRIES, DEFAULT_QUEUE_CAPACITY};

use chrono::NaiveDateTime;

/// Wireless network credentials and retry policy
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name
    pub ssid: String,
    /// Network credential
    pub credential: String,
    /// Consecutive disconnects tolerated before the link is marked failed
    pub max_retries: u32,
}

impl NetworkConfig {
    /// Create a configuration for the given network
    pub fn new(ssid: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            credential: credential.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Pacing of the polling loop
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Pause between consecutive devices within one cycle
    pub device_gap: Duration,
    /// Pause after a full pass before the next cycle starts
    pub cycle_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            device_gap: Duration::from_millis(100),
            cycle_interval: Duration::from_secs(10),
        }
    }
}

impl PollingConfig {
    /// A configuration with no pauses, for deterministic tests
    pub fn immediate() -> Self {
        Self {
            device_gap: Duration::ZERO,
            cycle_interval: Duration::ZERO,
        }
    }
}

/// Word indices of the decoded fields inside a device's register block
///
/// The decode plan for one device: which word is the status register and
/// where the two big-endian float pairs start. The default matches the
/// fleet's sensor map: status at 0, humidity at 1-2, temperature at 3-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Index of the status word
    pub status_word: usize,
    /// Index of the humidity high word (low word follows)
    pub humidity_pair: usize,
    /// Index of the temperature high word (low word follows)
    pub temperature_pair: usize,
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            status_word: 0,
            humidity_pair: 1,
            temperature_pair: 3,
        }
    }
}

impl BlockLayout {
    /// Number of contiguous words one read request must cover
    pub fn words(&self) -> u16 {
        let end = (self.status_word + 1)
            .max(self.humidity_pair + 2)
            .max(self.temperature_pair + 2);
        end as u16
    }
}

/// Immutable description of one polled field device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Bus unit identifier (small positive integer, unique per fleet)
    pub unit_id: u8,
    /// First register of the device's block
    pub block_start: u16,
    /// Decode plan for the block
    pub layout: BlockLayout,
}

impl DeviceDescriptor {
    /// Describe a device with the default block layout at offset 0
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            block_start: 0,
            layout: BlockLayout::default(),
        }
    }

    /// Override the register block start offset
    pub fn with_block_start(mut self, block_start: u16) -> Self {
        self.block_start = block_start;
        self
    }

    /// Override the decode plan
    pub fn with_layout(mut self, layout: BlockLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Number of words one block read must request
    pub fn block_words(&self) -> u16 {
        self.layout.words()
    }

    /// Decode a register block into a reading
    ///
    /// Rejects blocks shorter than the decode plan requires; a short
    /// block counts as a transport failure for this device this cycle.
    pub fn decode(
        &self,
        timestamp: Option<NaiveDateTime>,
        words: &[u16],
    ) -> std::result::Result<SensorRecord, TransportError> {
        let needed = self.layout.words() as usize;
        if words.len() < needed {
            return Err(TransportError::ShortResponse {
                expected: needed,
                got: words.len(),
            });
        }

        let status = words[self.layout.status_word];
        let humidity = float_from_words(
            words[self.layout.humidity_pair],
            words[self.layout.humidity_pair + 1],
        );
        let temperature = float_from_words(
            words[self.layout.temperature_pair],
            words[self.layout.temperature_pair + 1],
        );

        Ok(SensorRecord::new(
            timestamp,
            self.unit_id,
            status,
            humidity,
            temperature,
        ))
    }
}

/// Top-level gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Wireless network parameters
    pub network: NetworkConfig,
    /// Devices polled each cycle, in polling order
    pub devices: Vec<DeviceDescriptor>,
    /// Capacity of the reading queue
    pub queue_capacity: usize,
    /// Polling loop pacing
    pub polling: PollingConfig,
}

impl GatewayConfig {
    /// Create a configuration for the given network and device set
    pub fn new(network: NetworkConfig, devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            network,
            devices,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            polling: PollingConfig::default(),
        }
    }

    /// Override the queue capacity
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Override the polling pacing
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Check the configuration for startup
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the ssid is empty, no devices
    /// are configured, the queue capacity is zero, or a unit id is zero
    /// or duplicated.
    pub fn validate(&self) -> Result<()> {
        if self.network.ssid.is_empty() {
            return Err(GatewayError::Config("ssid must not be empty".to_string()));
        }
        if self.devices.is_empty() {
            return Err(GatewayError::Config(
                "at least one device must be configured".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(GatewayError::Config(
                "queue capacity must be positive".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for device in &self.devices {
            if device.unit_id == 0 {
                return Err(GatewayError::Config("unit id 0 is reserved".to_string()));
            }
            if !seen.insert(device.unit_id) {
                return Err(GatewayError::Config(format!(
                    "duplicate unit id {}",
                    device.unit_id
                )));
            }
        }
        Ok(())
    }
}

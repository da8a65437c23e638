//! Error types for the gateway
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for gateway operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Wireless link error
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    /// Register bus error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Wall-clock error
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// Reading sink error
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Invalid startup configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Startup-time infrastructure failure
    #[error("Startup failed: {0}")]
    Startup(String),
}

/// Errors from the wireless link layer
///
/// Recoverable up to the retry budget, after which the link is
/// terminally `Failed` until a fresh `start()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectivityError {
    /// Interface bring-up failed
    #[error("Interface init failed: {reason}")]
    Interface { reason: String },

    /// Association attempt was rejected by the driver
    #[error("Connect request rejected: {reason}")]
    ConnectRejected { reason: String },
}

/// Errors from the register bus
///
/// Scoped to one device for one cycle; never retried within the cycle.
/// The poller treats every variant uniformly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// No response within the per-request timeout
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Framing, checksum or electrical fault
    #[error("Bus fault: {reason}")]
    Bus { reason: String },

    /// Response carried fewer registers than requested
    #[error("Short response: expected {expected} words, got {got}")]
    ShortResponse { expected: usize, got: usize },

    /// Unit did not answer at all
    #[error("No response from unit {unit_id}")]
    NoResponse { unit_id: u8 },
}

/// Errors from the wall-clock source
///
/// Recoverable; a failed read surfaces on the record as an unknown
/// timestamp, never as an aborted reading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClockError {
    /// Clock register read/write failed
    #[error("Clock access failed: {reason}")]
    Read { reason: String },

    /// A decoded calendar field was out of range
    #[error("Invalid {field} field: {value:#04x}")]
    InvalidField { field: &'static str, value: u8 },

    /// Timestamp cannot be represented by the clock device
    #[error("Year {year} out of clock range")]
    YearOutOfRange { year: i32 },
}

/// Errors from the reading sink
///
/// Non-fatal; a rejected reading is logged and never requeued.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    /// Sink rejected the reading
    #[error("Sink rejected reading: {reason}")]
    Rejected { reason: String },

    /// Sink is not reachable
    #[error("Sink unavailable")]
    Unavailable,
}

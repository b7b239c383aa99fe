//! Bus transport
//!
//! The session talks to modules through [`BusTransport`]: addressed writes,
//! addressed fixed-length reads, and a few adapter settings. Hardware adapters
//! implement it outside this crate; [`SimulatedTransport`] stands in for a
//! module stack in tests and offline runs.

mod simulated;

pub use simulated::SimulatedTransport;

use std::time::Duration;

use crate::command::Pullups;

/// Transport-level failures. These abort the current command; the reply
/// decoder never sees them.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No adapter is attached
    #[error("*** No adapter is present ***")]
    NotPresent,

    /// The adapter is held by another program
    #[error("*** Adapter is being used, disconnect other application or adapter ***")]
    Busy,

    /// The adapter reported a failed transfer
    #[error("*** Transfer to address {address:#04x} failed: {reason} ***")]
    TransferFailed {
        /// Target address
        address: u8,
        /// Adapter status text
        reason: String,
    },

    /// Host I/O failure
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Addressed I2C access
pub trait BusTransport {
    /// Write `data` to the module at `address`
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), TransportError>;

    /// Read exactly `count` bytes from the module at `address`
    fn read(&mut self, address: u8, count: usize) -> Result<Vec<u8>, TransportError>;

    /// Change the bus bitrate, returning the rate actually applied (kHz)
    fn set_bitrate(&mut self, khz: u32) -> Result<u32, TransportError> {
        Ok(khz)
    }

    /// Switch the adapter's pull-up resistors
    fn set_pullups(&mut self, _pullups: Pullups) -> Result<(), TransportError> {
        Ok(())
    }

    /// Block for `ms` milliseconds
    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}


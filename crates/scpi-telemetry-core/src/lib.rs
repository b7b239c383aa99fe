//! # SCPI Telemetry Core Library
//!
//! Command registry and reply decoder for SupMCU modules queried over I2C.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A registry of telemetry commands and their reply byte layouts
//! - Decoding of binary telemetry replies into typed values
//! - Text reports and tab-delimited log rows for decoded replies
//! - Script command classification and a transport-agnostic session runner
//!
//! ## Example
//!
//! ```rust
//! use scpi_telemetry_core::prelude::*;
//!
//! let registry = RegistryBuilder::with_defaults().build();
//! assert_eq!(registry.expected_length("SUP:TEL? 8,data"), 13);
//!
//! let mut raw = vec![0x01, 0x64, 0x00, 0x00, 0x00];
//! raw.extend_from_slice(&0.5f64.to_le_bytes());
//! let decoded = Decoder::new(&registry).decode("SUP:TEL? 8,data", &raw).unwrap();
//! let report = render_report(&decoded, &DisplayOptions::default());
//! assert!(report.contains("Data:\t\t0.5000"));
//! ```

pub mod command;
pub mod config;
pub mod datalog;
pub mod decode;
pub mod layout;
pub mod registry;
pub mod report;
pub mod session;
pub mod transport;
pub mod xml;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::command::{ConfigDirective, RawCommand, ScriptCommand};
    pub use crate::config::ToolDefaults;
    pub use crate::datalog::{header_row, LogRow, TelemetryLog};
    pub use crate::decode::{Decoded, DecodedResult, DecodedValue, Decoder, FailureReason, SentinelSet, Ticks};
    pub use crate::layout::{HeaderField, HeaderSizes};
    pub use crate::registry::{CommandRegistry, RegistryBuilder, ResponseFormat};
    pub use crate::report::{render_report, DisplayOptions};
    pub use crate::session::{CommandOutput, Session, SessionSettings};
    pub use crate::transport::{BusTransport, SimulatedTransport};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

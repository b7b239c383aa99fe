//! Response Decoder
//!
//! Turns a raw telemetry reply into typed values using the registry's layout
//! for the command. Protocol failures (write flag clear, nothing on the bus)
//! are returned as values, never as errors.

mod timestamp;

pub use timestamp::{format_ascii_time, Ticks, ASCII_TIME_PLACEHOLDER, TICKS_PER_SECOND};

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use std::fmt;

use crate::registry::{CommandRegistry, FieldFormat, ResponseFormat};
use crate::report::hex_dump;

/// Text shown for a field that could not be decoded
pub const INVALID_FIELD: &str = "invalid format";

/// Errors returned by [`Decoder::decode`]
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No registry entry for the key
    #[error("Command '{0}' is not in the registry")]
    UnknownCommand(String),
}

/// Why a reply could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    /// The module had not finished writing its reply buffer
    WriteFlagZero,
    /// Nothing overwrote the read buffer: no device at the address
    DeviceAbsent,
}

impl FailureReason {
    /// Message shown in the text report
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::WriteFlagZero => {
                "*** Read failed, Write flag = 0, try increasing the message delay ***"
            }
            FailureReason::DeviceAbsent => {
                "*** Read failed, ensure the slave device is connected and powered ***"
            }
        }
    }

    /// Marker written into every log cell of a failed read
    pub fn log_marker(&self) -> &'static str {
        match self {
            FailureReason::WriteFlagZero => "WF = 0",
            FailureReason::DeviceAbsent => "No Device",
        }
    }
}

/// Byte values that mean "nothing answered" when a whole reply consists of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelSet(Vec<u8>);

impl Default for SentinelSet {
    fn default() -> Self {
        SentinelSet(vec![0x01])
    }
}

impl SentinelSet {
    /// Custom sentinel values
    pub fn new(values: impl Into<Vec<u8>>) -> Self {
        SentinelSet(values.into())
    }

    /// Treat both all-`0x00` and all-`0x01` replies as device absent
    pub fn dual() -> Self {
        SentinelSet(vec![0x00, 0x01])
    }

    /// True when every byte of a non-empty buffer is the same sentinel value
    pub fn matches(&self, raw: &[u8]) -> bool {
        match raw.first() {
            Some(first) => self.0.contains(first) && raw.iter().all(|b| b == first),
            None => false,
        }
    }
}

/// One decoded field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DecodedValue {
    /// Null-truncated text
    Text(String),
    /// Raw payload bytes of a `hex` reply
    Hex(Vec<u8>),
    /// `int`
    Int16(i16),
    /// `uint`
    UInt16(u16),
    /// `long`
    Int32(i32),
    /// `long long`
    Int64(i64),
    /// `float`
    Float32(f32),
    /// `double`
    Float64(f64),
    /// `char`, and the `,length` reply
    Byte(u8),
    /// The field could not be decoded (payload too short)
    Invalid,
}

/// Natural representation. Floats honour a requested precision
/// (`{:.4}`) and print every significant digit otherwise.
impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Text(text) => f.write_str(text),
            DecodedValue::Hex(bytes) => f.write_str(&hex_dump(bytes)),
            DecodedValue::Int16(v) => write!(f, "{}", v),
            DecodedValue::UInt16(v) => write!(f, "{}", v),
            DecodedValue::Int32(v) => write!(f, "{}", v),
            DecodedValue::Int64(v) => write!(f, "{}", v),
            DecodedValue::Float32(v) => fmt::Display::fmt(v, f),
            DecodedValue::Float64(v) => fmt::Display::fmt(v, f),
            DecodedValue::Byte(v) => write!(f, "{}", v),
            DecodedValue::Invalid => f.write_str(INVALID_FIELD),
        }
    }
}

impl DecodedValue {
    /// Numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Int16(v) => Some(*v as f64),
            DecodedValue::UInt16(v) => Some(*v as f64),
            DecodedValue::Int32(v) => Some(*v as f64),
            DecodedValue::Int64(v) => Some(*v as f64),
            DecodedValue::Float32(v) => Some(*v as f64),
            DecodedValue::Float64(v) => Some(*v),
            DecodedValue::Byte(v) => Some(*v as f64),
            DecodedValue::Text(_) | DecodedValue::Hex(_) | DecodedValue::Invalid => None,
        }
    }

    /// True for `float` and `double` values
    pub fn is_float(&self) -> bool {
        matches!(self, DecodedValue::Float32(_) | DecodedValue::Float64(_))
    }
}

/// Outcome of decoding one reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DecodedResult {
    /// The reply could not be trusted
    Failure(FailureReason),
    /// The reply decoded; one value per format field
    Success {
        /// Preamble timestamp (absent for replies without a preamble)
        timestamp: Option<Ticks>,
        /// One value per format field
        values: Vec<DecodedValue>,
    },
}

impl DecodedResult {
    /// Preamble timestamp in seconds
    pub fn timestamp_seconds(&self) -> Option<f64> {
        match self {
            DecodedResult::Success {
                timestamp: Some(ticks),
                ..
            } => Some(ticks.as_secs_f64()),
            _ => None,
        }
    }

    /// Decoded values (empty on failure)
    pub fn values(&self) -> &[DecodedValue] {
        match self {
            DecodedResult::Success { values, .. } => values,
            DecodedResult::Failure(_) => &[],
        }
    }

    /// Failure reason, if the reply failed
    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            DecodedResult::Failure(reason) => Some(*reason),
            DecodedResult::Success { .. } => None,
        }
    }
}

/// A decoded reply together with the framing details needed to display it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    /// Registry key the reply was decoded with
    pub command: String,
    /// Payload format from the registry
    pub format: ResponseFormat,
    /// Whether the reply carries a write flag and timestamp
    pub has_preamble: bool,
    /// Decode outcome
    pub result: DecodedResult,
    /// Trailing checksum bytes (unvalidated)
    pub checksum: Vec<u8>,
    /// Timestamp embedded in the text of a reply without a preamble
    pub embedded_timestamp: Option<Ticks>,
    /// Number of raw bytes worth showing in a hex dump
    pub stop_index: usize,
    /// The raw reply
    pub raw: Vec<u8>,
}

impl Decoded {
    /// True when the reply decoded successfully
    pub fn is_success(&self) -> bool {
        matches!(self.result, DecodedResult::Success { .. })
    }

    /// Raw bytes up to the display stop index
    pub fn consumed(&self) -> &[u8] {
        &self.raw[..self.stop_index.min(self.raw.len())]
    }
}

/// Decodes replies using a frozen [`CommandRegistry`]
#[derive(Debug, Clone)]
pub struct Decoder<'r> {
    registry: &'r CommandRegistry,
    sentinels: SentinelSet,
}

impl<'r> Decoder<'r> {
    /// Create a decoder with the default `{0x01}` sentinel set
    pub fn new(registry: &'r CommandRegistry) -> Self {
        Self {
            registry,
            sentinels: SentinelSet::default(),
        }
    }

    /// Use a different set of device-absent sentinel values
    pub fn with_sentinels(mut self, sentinels: SentinelSet) -> Self {
        self.sentinels = sentinels;
        self
    }

    /// The registry this decoder reads layouts from
    pub fn registry(&self) -> &'r CommandRegistry {
        self.registry
    }

    /// Decode a raw reply for `command_key`
    pub fn decode(&self, command_key: &str, raw: &[u8]) -> Result<Decoded, DecodeError> {
        let entry = self
            .registry
            .lookup(command_key)
            .ok_or_else(|| DecodeError::UnknownCommand(command_key.to_string()))?;

        let sizes = self.registry.header_sizes();
        let has_preamble = self.registry.has_preamble(command_key);

        let checksum_start = raw.len().saturating_sub(sizes.checksum_size);
        let checksum = raw[checksum_start..].to_vec();

        let (payload_offset, payload) = if has_preamble {
            let start = sizes.preamble_len().min(checksum_start);
            (start, &raw[start..checksum_start])
        } else {
            (0, &raw[..raw.len().saturating_sub(sizes.header_total())])
        };

        let mut decoded = Decoded {
            command: command_key.to_string(),
            format: entry.format.clone(),
            has_preamble,
            result: DecodedResult::Failure(FailureReason::DeviceAbsent),
            checksum,
            embedded_timestamp: None,
            stop_index: raw.len(),
            raw: raw.to_vec(),
        };

        if let Some(reason) = self.classify(has_preamble, raw) {
            tracing::debug!("{command_key}: read failed ({reason:?})");
            decoded.result = DecodedResult::Failure(reason);
            return Ok(decoded);
        }

        let timestamp = if has_preamble {
            let end = sizes.preamble_len().min(raw.len());
            let start = sizes.writeflag_size.min(end);
            Ticks::from_le_bytes(&raw[start..end])
        } else {
            None
        };

        let values = match &entry.format {
            ResponseFormat::Single(FieldFormat::Ascii) => {
                let (text, terminator) = null_terminated(payload);
                if let Some(position) = terminator {
                    decoded.stop_index = (payload_offset + position + 1).min(raw.len());
                }
                if !has_preamble {
                    decoded.embedded_timestamp = Ticks::from_ascii_reply(payload);
                }
                vec![DecodedValue::Text(text)]
            }
            ResponseFormat::Single(FieldFormat::Hex) => vec![DecodedValue::Hex(payload.to_vec())],
            ResponseFormat::Single(field) => vec![read_field(*field, payload, 0)],
            ResponseFormat::Sequence(fields) => {
                let mut offset = 0;
                fields
                    .iter()
                    .map(|field| {
                        let value = read_field(*field, payload, offset);
                        offset += field.size_bytes();
                        value
                    })
                    .collect()
            }
        };

        decoded.result = DecodedResult::Success { timestamp, values };
        Ok(decoded)
    }

    /// Failure checks, first match wins
    fn classify(&self, has_preamble: bool, raw: &[u8]) -> Option<FailureReason> {
        let sizes = self.registry.header_sizes();
        if has_preamble && sizes.writeflag_size > 0 {
            let flag_set = raw.first().is_some_and(|flag| flag & 1 == 1);
            if !flag_set {
                return Some(FailureReason::WriteFlagZero);
            }
        }
        if self.sentinels.matches(raw) {
            return Some(FailureReason::DeviceAbsent);
        }
        None
    }
}

/// Text up to the first null byte, and the position of that null
fn null_terminated(payload: &[u8]) -> (String, Option<usize>) {
    let terminator = payload.iter().position(|&b| b == 0);
    let text = payload[..terminator.unwrap_or(payload.len())]
        .iter()
        .map(|&b| b as char)
        .collect();
    (text, terminator)
}

/// Read one little-endian numeric field at `offset`
fn read_field(field: FieldFormat, payload: &[u8], offset: usize) -> DecodedValue {
    let width = field.size_bytes();
    let Some(bytes) = payload.get(offset..offset + width) else {
        return DecodedValue::Invalid;
    };

    match field {
        FieldFormat::Byte => DecodedValue::Byte(bytes[0]),
        FieldFormat::Int16 => DecodedValue::Int16(LittleEndian::read_i16(bytes)),
        FieldFormat::UInt16 => DecodedValue::UInt16(LittleEndian::read_u16(bytes)),
        FieldFormat::Int32 => DecodedValue::Int32(LittleEndian::read_i32(bytes)),
        FieldFormat::Int64 => DecodedValue::Int64(LittleEndian::read_i64(bytes)),
        FieldFormat::Float32 => DecodedValue::Float32(LittleEndian::read_f32(bytes)),
        FieldFormat::Float64 => DecodedValue::Float64(LittleEndian::read_f64(bytes)),
        // text formats never reach a numeric read
        FieldFormat::Ascii | FieldFormat::Hex => DecodedValue::Invalid,
    }
}

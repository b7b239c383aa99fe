//! Telemetry reply byte layout
//!
//! Every SupMCU telemetry reply starts with a write flag and a timestamp and
//! ends with an (optional) checksum. The payload in between is sized either by
//! the command's data format or by one of the fixed `,name` / `,length` /
//! `,ascii` payload sizes held here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::registry::RegistryError;

/// Read length used for commands that are not in the registry
pub const DEFAULT_LENGTH: usize = 16;

/// Default number of decimal places used to display floating point values
pub const DEFAULT_DECIMAL_PLACES: u8 = 4;

/// Fixed-width header and payload sizes shared by every telemetry reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSizes {
    /// Payload size of a `,name` reply
    pub name_size: usize,
    /// Trailing checksum size (0 when the modules send no checksum)
    pub checksum_size: usize,
    /// Leading write flag size
    pub writeflag_size: usize,
    /// Timestamp size following the write flag
    pub timestamp_size: usize,
    /// Payload size of a `,length` reply
    pub length_size: usize,
    /// Payload size of a `,ascii` reply
    pub ascii_size: usize,
}

impl Default for HeaderSizes {
    fn default() -> Self {
        Self {
            name_size: 32,
            checksum_size: 0,
            writeflag_size: 1,
            timestamp_size: 4,
            length_size: 1,
            ascii_size: 128,
        }
    }
}

impl HeaderSizes {
    /// Write flag + timestamp, the bytes ahead of the payload
    pub fn preamble_len(&self) -> usize {
        self.writeflag_size.saturating_add(self.timestamp_size)
    }

    /// Write flag + timestamp + checksum, the framing around every payload
    pub fn header_total(&self) -> usize {
        self.preamble_len().saturating_add(self.checksum_size)
    }

    /// Total reply length for a payload, or `None` if it does not fit in a `usize`
    pub fn frame_length(&self, payload: usize) -> Option<usize> {
        self.writeflag_size
            .checked_add(self.timestamp_size)?
            .checked_add(self.checksum_size)?
            .checked_add(payload)
    }

    /// True when every fixed-size reply (`,name`, `,length`, `,ascii`) has a
    /// representable length
    fn fixed_frames_fit(&self) -> bool {
        [self.name_size, self.length_size, self.ascii_size]
            .into_iter()
            .all(|payload| self.frame_length(payload).is_some())
    }

    /// Get one size by field
    pub fn get(&self, field: HeaderField) -> usize {
        match field {
            HeaderField::NameSize => self.name_size,
            HeaderField::ChecksumSize => self.checksum_size,
            HeaderField::WriteFlagSize => self.writeflag_size,
            HeaderField::TimestampSize => self.timestamp_size,
            HeaderField::LengthSize => self.length_size,
            HeaderField::AsciiSize => self.ascii_size,
        }
    }

    /// Parse `value` as a non-negative integer and store it in `field`.
    ///
    /// On error the previous value is kept.
    pub fn update(&mut self, field: HeaderField, value: &str) -> Result<(), RegistryError> {
        let invalid = || RegistryError::InvalidHeaderSize {
            field: field.to_string(),
            value: value.to_string(),
        };
        let parsed = parse_size(value).ok_or_else(invalid)?;

        let mut updated = *self;
        let slot = match field {
            HeaderField::NameSize => &mut updated.name_size,
            HeaderField::ChecksumSize => &mut updated.checksum_size,
            HeaderField::WriteFlagSize => &mut updated.writeflag_size,
            HeaderField::TimestampSize => &mut updated.timestamp_size,
            HeaderField::LengthSize => &mut updated.length_size,
            HeaderField::AsciiSize => &mut updated.ascii_size,
        };
        *slot = parsed;
        if !updated.fixed_frames_fit() {
            return Err(invalid());
        }
        *self = updated;
        Ok(())
    }
}

/// Parse a plain decimal non-negative integer (no sign, no whitespace inside)
pub(crate) fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Names of the configurable header sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderField {
    /// `name_size`
    NameSize,
    /// `checksum_size` (`chksum_size`)
    ChecksumSize,
    /// `wflag_size` (`writeflag_size`)
    WriteFlagSize,
    /// `time_size` (`timestamp_size`)
    TimestampSize,
    /// `length_size`
    LengthSize,
    /// `ascii_size`
    AsciiSize,
}

impl HeaderField {
    /// All fields, in configuration file order
    pub const ALL: [HeaderField; 6] = [
        HeaderField::NameSize,
        HeaderField::ChecksumSize,
        HeaderField::WriteFlagSize,
        HeaderField::TimestampSize,
        HeaderField::LengthSize,
        HeaderField::AsciiSize,
    ];

    /// Tag used for this field in command definition files
    pub fn tag(&self) -> &'static str {
        match self {
            HeaderField::NameSize => "name_size",
            HeaderField::ChecksumSize => "checksum_size",
            HeaderField::WriteFlagSize => "wflag_size",
            HeaderField::TimestampSize => "time_size",
            HeaderField::LengthSize => "length_size",
            HeaderField::AsciiSize => "ascii_size",
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for HeaderField {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "name_size" => Ok(HeaderField::NameSize),
            "checksum_size" | "chksum_size" => Ok(HeaderField::ChecksumSize),
            "wflag_size" | "writeflag_size" => Ok(HeaderField::WriteFlagSize),
            "time_size" | "timestamp_size" => Ok(HeaderField::TimestampSize),
            "length_size" => Ok(HeaderField::LengthSize),
            "ascii_size" => Ok(HeaderField::AsciiSize),
            other => Err(RegistryError::UnknownHeaderField(other.to_string())),
        }
    }
}

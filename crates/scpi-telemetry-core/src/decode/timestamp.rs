//! Device timestamps
//!
//! Modules count time in ticks of 10 ms. Binary replies carry the tick count
//! little-endian in the preamble; some text replies embed it as `[f:ticks]`.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticks per second (one tick is 10 ms)
pub const TICKS_PER_SECOND: u64 = 100;

/// Placeholder shown when an embedded text timestamp cannot be read
pub const ASCII_TIME_PLACEHOLDER: &str = "[]";

/// A device tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticks(pub u64);

impl Ticks {
    /// Read an unsigned little-endian tick count (up to 8 bytes)
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        let width = bytes.len().min(8);
        if width == 0 {
            return None;
        }
        Some(Ticks(LittleEndian::read_uint(&bytes[..width], width)))
    }

    /// Convert seconds back to the nearest whole tick
    pub fn from_secs_f64(secs: f64) -> Self {
        Ticks((secs * TICKS_PER_SECOND as f64).round() as u64)
    }

    /// Extract the tick count from text of the form `[<flag>:<ticks>]...`.
    ///
    /// The count is the text between the first `:` and the first `]`.
    pub fn from_ascii_reply(data: &[u8]) -> Option<Self> {
        let text: String = data.iter().map(|&b| b as char).collect();
        let close = text.find(']')?;
        let colon = text[..close].find(':')?;
        text[colon + 1..close].trim().parse().ok().map(Ticks)
    }

    /// Time in seconds
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }
}

/// `dd:hh:mm:ss.cc`
impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.0 / TICKS_PER_SECOND;
        let centis = self.0 % TICKS_PER_SECOND;
        let days = total_secs / 86_400;
        let hours = (total_secs / 3_600) % 24;
        let minutes = (total_secs / 60) % 60;
        let seconds = total_secs % 60;
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}.{:02}",
            days, hours, minutes, seconds, centis
        )
    }
}

/// Render the embedded timestamp of a text reply, or the placeholder
pub fn format_ascii_time(data: &[u8]) -> String {
    Ticks::from_ascii_reply(data)
        .map(|ticks| ticks.to_string())
        .unwrap_or_else(|| ASCII_TIME_PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Ticks(0).to_string(), "00:00:00:00.00");
        assert_eq!(Ticks(100).to_string(), "00:00:00:01.00");
        // 1 day, 2 hours, 3 minutes, 4.56 seconds
        let ticks = ((86_400 + 2 * 3_600 + 3 * 60 + 4) * 100) + 56;
        assert_eq!(Ticks(ticks).to_string(), "01:02:03:04.56");
    }

    #[test]
    fn test_from_le_bytes() {
        assert_eq!(Ticks::from_le_bytes(&[0x64, 0, 0, 0]), Some(Ticks(100)));
        assert_eq!(Ticks::from_le_bytes(&[0x10, 0x27]), Some(Ticks(10_000)));
        assert_eq!(Ticks::from_le_bytes(&[]), None);
        assert_eq!(Ticks(100).as_secs_f64(), 1.0);
    }

    #[test]
    fn test_ascii_reply() {
        assert_eq!(Ticks::from_ascii_reply(b"[1:12345] 3.3V"), Some(Ticks(12345)));
        assert_eq!(format_ascii_time(b"[1:6000]"), "00:00:01:00.00");
        assert_eq!(format_ascii_time(b"[1:6000"), "[]");
        assert_eq!(format_ascii_time(b"[1:abc]"), "[]");
        assert_eq!(format_ascii_time(b"no timestamp"), "[]");
    }

    #[test]
    fn test_seconds_round_trip() {
        assert_eq!(Ticks::from_secs_f64(Ticks(12_345).as_secs_f64()), Ticks(12_345));
        assert_eq!(Ticks::from_secs_f64(0.29), Ticks(29));
    }
}

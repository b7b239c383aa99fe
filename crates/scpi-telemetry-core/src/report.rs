//! Text reports
//!
//! Renders decoded replies as the line-oriented output shown to the user.
//! Tooling greps these labels, so they are fixed: `Timestamp:`, `Data:`,
//! `Checksum:`, `Hex:`.

use serde::{Deserialize, Serialize};

use crate::decode::{format_ascii_time, Decoded, DecodedResult, DecodedValue, ASCII_TIME_PLACEHOLDER};
use crate::layout::DEFAULT_DECIMAL_PLACES;
use crate::registry::{FieldFormat, ResponseFormat};

/// Smallest and largest supported decimal places for float display
pub const DECIMAL_PLACES_RANGE: std::ops::RangeInclusive<u8> = 1..=12;

const NO_VALID_FORMAT: &str = "*** No valid format for data ***";

/// Display settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    decimal_places: u8,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            decimal_places: DEFAULT_DECIMAL_PLACES,
        }
    }
}

impl DisplayOptions {
    /// Display floats with `decimal_places` digits, clamped to 1–12
    pub fn new(decimal_places: u8) -> Self {
        Self {
            decimal_places: decimal_places
                .clamp(*DECIMAL_PLACES_RANGE.start(), *DECIMAL_PLACES_RANGE.end()),
        }
    }

    /// Decimal places used for `float` and `double` values
    pub fn decimal_places(&self) -> u8 {
        self.decimal_places
    }
}

/// Space separated upper-case hex bytes
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render one value with its natural representation
pub fn format_value(value: &DecodedValue, options: &DisplayOptions) -> String {
    if value.is_float() {
        format!("{:.*}", options.decimal_places as usize, value)
    } else {
        value.to_string()
    }
}

/// Render a decoded reply as report lines, ending with the hex dump
pub fn render_lines(decoded: &Decoded, options: &DisplayOptions) -> Vec<String> {
    let mut lines = Vec::new();

    match &decoded.result {
        DecodedResult::Failure(reason) => lines.push(reason.message().to_string()),
        DecodedResult::Success { timestamp, values } => {
            if let Some(ticks) = timestamp {
                lines.push(format!("Timestamp:\t\t{}", ticks));
            } else if !decoded.has_preamble && decoded.format == ResponseFormat::Single(FieldFormat::Ascii) {
                let time = decoded
                    .embedded_timestamp
                    .map(|ticks| ticks.to_string())
                    .unwrap_or_else(|| ASCII_TIME_PLACEHOLDER.to_string());
                lines.push(format!("Timestamp:\t\t{}", time));
            }

            match (&decoded.format, values.as_slice()) {
                (ResponseFormat::Single(_), [DecodedValue::Invalid]) => {
                    lines.push(NO_VALID_FORMAT.to_string())
                }
                (ResponseFormat::Single(_), [value]) => {
                    lines.push(format!("Data:\t\t{}", format_value(value, options)))
                }
                _ => {
                    let items: Vec<String> = values.iter().map(|v| format_value(v, options)).collect();
                    lines.push(format!("Data:\t\t[{}]", items.join(", ")));
                }
            }

            if decoded.has_preamble && !decoded.checksum.is_empty() {
                lines.push(format!("Checksum:\t\t{}", hex_dump(&decoded.checksum)));
            }
        }
    }

    lines.push(format!("Hex:\t\t{}", hex_dump(decoded.consumed())));
    lines
}

/// Render a decoded reply as one newline-joined report
pub fn render_report(decoded: &Decoded, options: &DisplayOptions) -> String {
    render_lines(decoded, options).join("\n")
}

/// Report for a reply to a command the registry does not know: hex only
pub fn render_unregistered(raw: &[u8]) -> String {
    format!("Hex:\t\t{}", hex_dump(raw))
}

/// Render the embedded timestamp of a raw text reply
pub fn ascii_time_line(data: &[u8]) -> String {
    format!("Timestamp:\t\t{}", format_ascii_time(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use crate::registry::{CommandRegistry, RegistryBuilder};
    use pretty_assertions::assert_eq;

    fn registry() -> CommandRegistry {
        let mut builder = RegistryBuilder::with_defaults();
        builder.update_header_size("checksum_size", "1");
        builder.build()
    }

    #[test]
    fn test_decimal_places_clamped() {
        assert_eq!(DisplayOptions::new(0).decimal_places(), 1);
        assert_eq!(DisplayOptions::new(20).decimal_places(), 12);
        assert_eq!(DisplayOptions::default().decimal_places(), 4);
    }

    #[test]
    fn test_sequence_report_with_checksum() {
        let registry = registry();
        let mut raw = vec![0x01, 0xE8, 0x03, 0x00, 0x00];
        raw.extend_from_slice(&7i32.to_le_bytes());
        raw.extend_from_slice(&(-1i32).to_le_bytes());
        raw.extend_from_slice(&1i16.to_le_bytes());
        raw.extend_from_slice(&2i16.to_le_bytes());
        raw.extend_from_slice(&3i16.to_le_bytes());
        raw.extend_from_slice(&[0u8; 8]);
        raw.push(0x5A);

        let decoded = Decoder::new(&registry).decode("SUP:TEL? 4,data", &raw).unwrap();
        let lines = render_lines(&decoded, &DisplayOptions::default());
        assert_eq!(lines[0], "Timestamp:\t\t00:00:00:10.00");
        assert_eq!(lines[1], "Data:\t\t[7, -1, 1, 2, 3]");
        assert_eq!(lines[2], "Checksum:\t\t5A");
        assert!(lines[3].starts_with("Hex:\t\t01 E8 03 00 00 07"));
        assert!(lines[3].ends_with("5A"));
    }

    #[test]
    fn test_failure_report_keeps_hex() {
        let registry = registry();
        let raw = [0x01u8; 14];
        let decoded = Decoder::new(&registry).decode("SUP:TEL? 8,data", &raw).unwrap();
        assert_eq!(
            render_report(&decoded, &DisplayOptions::default()),
            "*** Read failed, ensure the slave device is connected and powered ***\n\
             Hex:\t\t01 01 01 01 01 01 01 01 01 01 01 01 01 01"
        );
    }

    #[test]
    fn test_ascii_report_truncates_hex() {
        let registry = RegistryBuilder::with_defaults().build();
        let mut raw = vec![0x01, 0x00, 0x01, 0x00, 0x00];
        raw.extend_from_slice(b"v1.2\0");
        raw.resize(5 + 48, 0x99);

        let decoded = Decoder::new(&registry).decode("SUP:TEL? 0,data", &raw).unwrap();
        assert_eq!(
            render_lines(&decoded, &DisplayOptions::default()),
            vec![
                "Timestamp:\t\t00:00:00:02.56".to_string(),
                "Data:\t\tv1.2".to_string(),
                "Hex:\t\t01 00 01 00 00 76 31 2E 32 00".to_string(),
            ]
        );
    }

    #[test]
    fn test_unregistered_report() {
        assert_eq!(render_unregistered(&[0x0A, 0xFF]), "Hex:\t\t0A FF");
        assert_eq!(ascii_time_line(b"[1:100]"), "Timestamp:\t\t00:00:00:01.00");
    }
}

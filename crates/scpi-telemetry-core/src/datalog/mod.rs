//! Data Logging
//!
//! Flattens decoded replies into rows of a tab-delimited log. Every command
//! contributes the same number of cells on every poll, whether the read
//! succeeded or not, so columns never shift.

mod format;

pub use format::{LogError, TelemetryLog, LOG_DELIMITER};

use serde::Serialize;

use crate::command::{is_config_directive, is_raw_read, is_raw_write, is_telemetry_query};
use crate::decode::{Decoded, DecodedResult, DecodedValue, Ticks};
use crate::registry::CommandRegistry;
use crate::report::hex_dump;

/// Placeholder for a missing timestamp
pub const NO_TIMESTAMP: &str = "-";

/// First header column
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// One cell of a log row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LogCell {
    /// Device timestamp in seconds
    Seconds(f64),
    /// A decoded value
    Value(DecodedValue),
    /// Literal text (hex dumps, failure markers)
    Text(String),
}

impl LogCell {
    /// Cell text as written to the log file
    pub fn render(&self) -> String {
        match self {
            LogCell::Seconds(secs) => secs.to_string(),
            LogCell::Value(value) => value.to_string(),
            LogCell::Text(text) => text.clone(),
        }
    }
}

/// Header columns contributed by one command
pub fn command_columns(registry: &CommandRegistry, command: &str) -> Vec<String> {
    let command = command.trim();
    if is_raw_read(command) {
        return vec![format!("{}: Data", command)];
    }
    if is_config_directive(command) || is_raw_write(command) || !is_telemetry_query(command) {
        return Vec::new();
    }

    let Some(entry) = registry.lookup(command) else {
        return vec![format!("{}: Data", command)];
    };

    let mut columns = Vec::new();
    if registry.has_preamble(command) {
        columns.push(format!("{}: Time (s)", command));
    }
    if entry.format.is_sequence() {
        for i in 0..entry.format.cell_count() {
            columns.push(format!("{}: Data[{}]", command, i));
        }
    } else {
        columns.push(format!("{}: Data", command));
    }
    columns
}

/// Full header row for a command list
pub fn header_row(registry: &CommandRegistry, commands: &[String]) -> Vec<String> {
    std::iter::once(TIMESTAMP_COLUMN.to_string())
        .chain(commands.iter().flat_map(|command| command_columns(registry, command)))
        .collect()
}

/// Cells contributed by one decoded reply
pub fn decoded_cells(decoded: &Decoded) -> Vec<LogCell> {
    let mut cells = Vec::new();
    match &decoded.result {
        DecodedResult::Failure(reason) => {
            let marker = reason.log_marker();
            let count = decoded.format.cell_count() + usize::from(decoded.has_preamble);
            cells.extend((0..count).map(|_| LogCell::Text(marker.to_string())));
        }
        DecodedResult::Success { timestamp, values } => {
            if decoded.has_preamble {
                cells.push(match timestamp {
                    Some(ticks) => LogCell::Seconds(ticks.as_secs_f64()),
                    None => LogCell::Text(NO_TIMESTAMP.to_string()),
                });
            }
            cells.extend(values.iter().cloned().map(LogCell::Value));
        }
    }
    cells
}

/// One polling cycle's worth of cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogRow {
    cells: Vec<LogCell>,
}

impl LogRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the cells of a decoded reply
    pub fn push_decoded(&mut self, decoded: &Decoded) {
        self.cells.extend(decoded_cells(decoded));
    }

    /// Append a hex dump cell for a raw or unregistered read
    pub fn push_raw(&mut self, raw: &[u8]) {
        self.cells.push(LogCell::Text(hex_dump(raw)));
    }

    /// Append a literal cell
    pub fn push_text(&mut self, text: &str) {
        self.cells.push(LogCell::Text(text.to_string()));
    }

    /// Cells appended so far
    pub fn cells(&self) -> &[LogCell] {
        &self.cells
    }

    /// First device timestamp in the row
    pub fn first_timestamp(&self) -> Option<f64> {
        self.cells.iter().find_map(|cell| match cell {
            LogCell::Seconds(secs) => Some(*secs),
            _ => None,
        })
    }

    /// Row as written to the log: elapsed time column, then every cell
    pub fn to_record(&self) -> Vec<String> {
        let elapsed = self
            .first_timestamp()
            .map(|secs| Ticks::from_secs_f64(secs).to_string())
            .unwrap_or_else(|| NO_TIMESTAMP.to_string());

        std::iter::once(elapsed)
            .chain(self.cells.iter().map(LogCell::render))
            .collect()
    }
}

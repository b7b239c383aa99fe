//! Log file format
//!
//! Tab-delimited text, one header row then one row per polling cycle.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use super::LogRow;

/// Field delimiter of telemetry logs
pub const LOG_DELIMITER: u8 = b'\t';

/// Errors writing a telemetry log
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The file could not be written
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// A record could not be encoded
    #[error("Log write error: {0}")]
    CsvError(#[from] csv::Error),

    /// A row does not match the header width
    #[error("Row has {found} cells but the header has {expected}")]
    RowWidth {
        /// Header width
        expected: usize,
        /// Row width
        found: usize,
    },
}

/// Writes telemetry rows under a fixed header
pub struct TelemetryLog<W: Write> {
    writer: csv::Writer<W>,
    width: usize,
    rows_written: usize,
}

impl TelemetryLog<File> {
    /// Create (or truncate) a log file and write its header
    pub fn create<P: AsRef<Path>>(path: P, header: &[String]) -> Result<Self, LogError> {
        let file = File::create(path.as_ref())?;
        tracing::info!("Logging to {}", path.as_ref().display());
        Self::from_writer(file, header)
    }
}

impl<W: Write> TelemetryLog<W> {
    /// Wrap any writer and write the header row
    pub fn from_writer(inner: W, header: &[String]) -> Result<Self, LogError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(LOG_DELIMITER)
            .from_writer(inner);
        writer.write_record(header)?;
        Ok(Self {
            writer,
            width: header.len(),
            rows_written: 0,
        })
    }

    /// Append one row. Rows narrower or wider than the header are rejected.
    pub fn write_row(&mut self, row: &LogRow) -> Result<(), LogError> {
        let record = row.to_record();
        if record.len() != self.width {
            return Err(LogError::RowWidth {
                expected: self.width,
                found: record.len(),
            });
        }
        self.writer.write_record(&record)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush buffered rows to the underlying writer
    pub fn flush(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of data rows written (header excluded)
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Number of columns in every row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W, LogError> {
        self.writer
            .into_inner()
            .map_err(|e| LogError::IoError(e.into_error()))
    }
}

//! Command session
//!
//! Runs a command script against a [`BusTransport`]: applies configuration
//! directives, performs raw transfers, sends SCPI commands and reads back
//! telemetry replies, decoding them through the registry.
//!
//! Timing follows the module protocol. After a query the module needs the
//! inter-message delay (or the longer ascii delay for `,ascii` replies) before
//! its reply buffer is valid, and every command is followed by one more
//! inter-message delay.

use serde::Serialize;
use std::io::Write;
use std::time::Instant;

use crate::command::{
    encode_command, is_ascii_query, is_telemetry_query, CommandError, ConfigDirective, RawCommand,
    ScriptCommand,
};
use crate::config::ToolDefaults;
use crate::datalog::{LogError, LogRow, TelemetryLog};
use crate::decode::{DecodeError, Decoded, Decoder, SentinelSet};
use crate::registry::CommandRegistry;
use crate::report::{hex_dump, render_lines, render_unregistered, DisplayOptions};
use crate::transport::{BusTransport, TransportError};

/// Margin the logging period must leave over the estimated cycle time
pub const PERIOD_MARGIN: f64 = 1.2;

/// Timing and addressing for a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSettings {
    /// Module address commands go to until an `<ADDRESS>` directive
    pub address: u8,
    /// Delay between transfers (ms)
    pub delay_ms: u64,
    /// Delay before reading an `,ascii` reply (ms)
    pub ascii_delay_ms: u64,
    /// Float display precision
    pub display: DisplayOptions,
}

impl SessionSettings {
    /// Settings from the tool defaults, talking to `address`
    pub fn from_defaults(defaults: &ToolDefaults, address: u8) -> Self {
        Self {
            address,
            delay_ms: defaults.delay_ms,
            ascii_delay_ms: defaults.ascii_delay_ms(),
            display: DisplayOptions::new(defaults.decimal_places),
        }
    }
}

/// Reply to a telemetry query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryReply {
    /// Decoded through the registry
    Decoded(Decoded),
    /// The command is not registered; raw bytes only
    Unregistered(Vec<u8>),
}

/// What one script line did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommandOutput {
    /// A directive was applied
    Configured {
        /// The directive applied
        directive: ConfigDirective,
        /// Confirmation shown to the user
        message: String,
    },
    /// Raw bytes were written
    RawWrite {
        /// Target address
        address: u8,
        /// Bytes sent
        data: Vec<u8>,
    },
    /// Raw bytes were read
    RawRead {
        /// Source address
        address: u8,
        /// Bytes received
        data: Vec<u8>,
    },
    /// A command was sent with no reply expected
    Write {
        /// Command text
        command: String,
    },
    /// A telemetry query was sent and its reply read
    Query {
        /// Command text
        command: String,
        /// Reply as read
        reply: QueryReply,
    },
    /// The line could not be parsed; nothing was sent
    Rejected {
        /// Line as given
        command: String,
        /// Why it was rejected
        error: CommandError,
    },
}

impl CommandOutput {
    /// Report lines for this output
    pub fn lines(&self, options: &DisplayOptions) -> Vec<String> {
        match self {
            CommandOutput::Configured { message, .. } => vec![message.clone()],
            CommandOutput::RawWrite { address, data } => {
                vec![format!("Raw Write:\t\t[{}] to address {:#04x}", hex_dump(data), address)]
            }
            CommandOutput::RawRead { address, data } => {
                vec![format!("Raw Read:\t\t[{}] from address {:#04x}", hex_dump(data), address)]
            }
            CommandOutput::Write { command } => vec![format!("Write:\t\t{}", command)],
            CommandOutput::Query { command, reply } => {
                let mut lines = vec![format!("Read:\t\t{}", command)];
                match reply {
                    QueryReply::Decoded(decoded) => lines.extend(render_lines(decoded, options)),
                    QueryReply::Unregistered(raw) => lines.push(render_unregistered(raw)),
                }
                lines
            }
            CommandOutput::Rejected { error, .. } => vec![error.to_string()],
        }
    }
}

/// Estimated duration of one pass over `commands` (ms)
pub fn estimate_cycle_ms(commands: &[String], delay_ms: u64, ascii_delay_ms: u64) -> u64 {
    commands
        .iter()
        .map(|command| {
            if is_ascii_query(command) {
                ascii_delay_ms + delay_ms
            } else if is_telemetry_query(command) {
                2 * delay_ms
            } else {
                delay_ms
            }
        })
        .sum()
}

/// Default logging period for a cycle estimate: whole seconds, with slack
pub fn default_period_secs(cycle_ms: u64) -> u64 {
    cycle_ms / 1000 + 1
}

/// True when a logging period leaves too little room for the commands
pub fn period_too_short(period_secs: f64, cycle_ms: u64) -> bool {
    period_secs * 1000.0 <= cycle_ms as f64 * PERIOD_MARGIN
}

/// Errors from a logging run
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The bus transfer failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The log file could not be written
    #[error(transparent)]
    Log(#[from] LogError),
}

/// A command session over one transport
pub struct Session<'r, T: BusTransport> {
    decoder: Decoder<'r>,
    transport: T,
    settings: SessionSettings,
    address: u8,
}

impl<'r, T: BusTransport> Session<'r, T> {
    /// Create a session
    pub fn new(registry: &'r CommandRegistry, transport: T, settings: SessionSettings) -> Self {
        Self {
            decoder: Decoder::new(registry),
            transport,
            address: settings.address,
            settings,
        }
    }

    /// Use a different set of device-absent sentinels
    pub fn with_sentinels(mut self, sentinels: SentinelSet) -> Self {
        self.decoder = self.decoder.with_sentinels(sentinels);
        self
    }

    /// Address the next command goes to
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Session settings
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the session, returning the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn registry(&self) -> &'r CommandRegistry {
        self.decoder.registry()
    }

    /// Execute one script line
    pub fn execute(&mut self, line: &str) -> Result<CommandOutput, TransportError> {
        let command = line.trim();
        let output = match ScriptCommand::parse(command) {
            Ok(ScriptCommand::Directive(directive)) => self.configure(directive)?,
            Ok(ScriptCommand::Raw(raw)) => self.raw_transfer(raw)?,
            Ok(ScriptCommand::Write(text)) => {
                self.transport.write(self.address, &encode_command(&text))?;
                tracing::debug!("Write {:#04x}: {}", self.address, text);
                CommandOutput::Write { command: text }
            }
            Ok(ScriptCommand::Query(text)) => self.query(text)?,
            Err(error) => {
                tracing::warn!("{error}");
                CommandOutput::Rejected {
                    command: command.to_string(),
                    error,
                }
            }
        };
        self.transport.delay_ms(self.settings.delay_ms);
        Ok(output)
    }

    /// Execute a script from the configured address, stopping at the first
    /// transport failure
    pub fn run_script(&mut self, commands: &[String]) -> Result<Vec<CommandOutput>, TransportError> {
        self.address = self.settings.address;
        commands.iter().map(|command| self.execute(command)).collect()
    }

    /// Execute every command once and collect the log cells
    pub fn poll_cycle(&mut self, commands: &[String]) -> Result<LogRow, TransportError> {
        self.address = self.settings.address;
        let mut row = LogRow::new();
        for command in commands {
            match self.execute(command)? {
                CommandOutput::Query {
                    reply: QueryReply::Decoded(decoded),
                    ..
                } => row.push_decoded(&decoded),
                CommandOutput::Query {
                    reply: QueryReply::Unregistered(raw),
                    ..
                } => row.push_raw(&raw),
                CommandOutput::RawRead { data, .. } => row.push_raw(&data),
                CommandOutput::Rejected {
                    error: CommandError::InvalidRead(_),
                    ..
                } => row.push_text("Invalid READ"),
                _ => {}
            }
        }
        Ok(row)
    }

    /// Estimated duration of one pass over `commands` with this session's delays
    pub fn estimate_cycle_ms(&self, commands: &[String]) -> u64 {
        estimate_cycle_ms(commands, self.settings.delay_ms, self.settings.ascii_delay_ms)
    }

    /// Poll `commands` `cycles` times, one row per cycle, starting a cycle
    /// every `period_ms`
    pub fn run_logging<W: Write>(
        &mut self,
        commands: &[String],
        log: &mut TelemetryLog<W>,
        cycles: usize,
        period_ms: u64,
    ) -> Result<(), SessionError> {
        let cycle_ms = self.estimate_cycle_ms(commands);
        if period_too_short(period_ms as f64 / 1000.0, cycle_ms) {
            tracing::warn!(
                "*** Warning, logging period may be shorter than the duration of the commands requested ***"
            );
        }

        for cycle in 0..cycles {
            let started = Instant::now();
            let row = self.poll_cycle(commands)?;
            log.write_row(&row)?;
            log.flush()?;
            tracing::debug!("Logged cycle {}", cycle + 1);

            if cycle + 1 < cycles {
                let spent = started.elapsed().as_millis() as u64;
                self.transport.delay_ms(period_ms.saturating_sub(spent));
            }
        }
        Ok(())
    }

    fn configure(&mut self, directive: ConfigDirective) -> Result<CommandOutput, TransportError> {
        let message = match directive {
            ConfigDirective::Delay(ms) => {
                self.transport.delay_ms(ms);
                format!("Implementing additional {}ms delay.", ms)
            }
            ConfigDirective::Address(address) => {
                self.address = address;
                format!("Changed slave I2C address to {:#04x}.", address)
            }
            ConfigDirective::Bitrate(khz) => {
                let applied = self.transport.set_bitrate(khz)?;
                format!("Changed I2C bitrate to {}kHz.", applied)
            }
            ConfigDirective::Pullups(state) => {
                self.transport.set_pullups(state)?;
                format!("Turned I2C pullups {}.", state)
            }
        };
        tracing::info!("{message}");
        Ok(CommandOutput::Configured { directive, message })
    }

    fn raw_transfer(&mut self, raw: RawCommand) -> Result<CommandOutput, TransportError> {
        if let Some(frame) = raw.frame() {
            self.transport.write(raw.address(), &frame)?;
        }
        match raw {
            RawCommand::Write { address, data } => Ok(CommandOutput::RawWrite { address, data }),
            RawCommand::Read { address, count } => {
                let data = self.transport.read(address, count)?;
                Ok(CommandOutput::RawRead { address, data })
            }
        }
    }

    fn query(&mut self, command: String) -> Result<CommandOutput, TransportError> {
        self.transport.write(self.address, &encode_command(&command))?;

        let wait = if is_ascii_query(&command) {
            self.settings.ascii_delay_ms
        } else {
            self.settings.delay_ms
        };
        self.transport.delay_ms(wait);

        let length = self.registry().expected_length(&command);
        let raw = self.transport.read(self.address, length)?;

        let reply = match self.decoder.decode(&command, &raw) {
            Ok(decoded) => QueryReply::Decoded(decoded),
            Err(DecodeError::UnknownCommand(_)) => QueryReply::Unregistered(raw),
        };
        Ok(CommandOutput::Query { command, reply })
    }
}

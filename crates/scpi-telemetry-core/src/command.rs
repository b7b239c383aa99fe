//! Command classification
//!
//! A script line is one of: a bracketed configuration directive
//! (`<DELAY 100>`), a bracketed raw bus transfer (`<WRITE 0x53, 01 02>`,
//! `<READ 0x53, 10>`), or a plain SCPI command that is sent as ASCII text.
//! Plain commands containing `TEL?` are telemetry queries and expect a reply.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

use crate::registry::ReplyKind;

/// Line feed appended to every transmitted command
pub const COMMAND_TERMINATOR: u8 = 0x0A;

/// Errors parsing a script line
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq, Serialize)]
pub enum CommandError {
    /// Malformed `<WRITE ...>` line
    #[error("*** Invalid WRITE command \"{0}\", use <WRITE 0xYY, b0 b1 ...> ***")]
    InvalidWrite(String),

    /// Malformed `<READ ...>` line
    #[error("*** Invalid READ command \"{0}\", use <READ 0xYY, n> ***")]
    InvalidRead(String),

    /// A known directive with a bad argument
    #[error("*** The requested {keyword} command is not valid. Use {usage} ***")]
    InvalidDirective {
        /// Directive name
        keyword: &'static str,
        /// Expected syntax
        usage: &'static str,
    },

    /// Bracketed text that is not a known directive
    #[error("*** The configuration command \"{0}\" is not valid ***")]
    UnknownDirective(String),

    /// Blank line
    #[error("*** Empty command ***")]
    Empty,
}

/// True when `s` is a non-empty run of hex digits
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_bracketed(command: &str) -> bool {
    command.starts_with('<') && command.ends_with('>')
}

/// `<WRITE ...>`
pub fn is_raw_write(command: &str) -> bool {
    is_bracketed(command) && command.starts_with("<WRITE")
}

/// `<READ ...>`
pub fn is_raw_read(command: &str) -> bool {
    is_bracketed(command) && command.starts_with("<READ")
}

/// Bracketed, but not a raw transfer
pub fn is_config_directive(command: &str) -> bool {
    is_bracketed(command) && !is_raw_write(command) && !is_raw_read(command)
}

/// A raw transfer whose address, payload and count are all well formed
pub fn is_valid_raw(command: &str) -> bool {
    RawCommand::parse(command).is_ok()
}

/// Plain commands that ask the module for telemetry
pub fn is_telemetry_query(command: &str) -> bool {
    command.contains("TEL?")
}

/// Telemetry queries whose reply is the module's own text rendering
pub fn is_ascii_query(command: &str) -> bool {
    command.trim_end().ends_with(ReplyKind::Ascii.suffix())
}

/// Parse an I2C address written as `0xHH`
pub fn parse_address(text: &str) -> Option<u8> {
    let digits = text.strip_prefix("0x")?;
    if digits.len() != 2 || !is_hex(digits) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// Bytes put on the bus for a plain command: ASCII text and a line feed
pub fn encode_command(command: &str) -> Vec<u8> {
    command
        .bytes()
        .filter(u8::is_ascii)
        .chain(std::iter::once(COMMAND_TERMINATOR))
        .collect()
}

fn write_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^<WRITE (0x[0-9A-Fa-f]{2}), ([0-9A-Fa-fx ]+)>$").ok())
        .as_ref()
}

fn read_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^<READ (0x[0-9A-Fa-f]{2}), ([0-9]+)>$").ok())
        .as_ref()
}

fn parse_data_byte(token: &str) -> Option<u8> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    if digits.len() > 2 || !is_hex(digits) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// A raw bus transfer to an explicit address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RawCommand {
    /// Write `data` (plus the line feed) to `address`
    Write {
        /// Target address
        address: u8,
        /// Bytes to send
        data: Vec<u8>,
    },
    /// Read `count` bytes from `address`
    Read {
        /// Source address
        address: u8,
        /// Bytes to read
        count: usize,
    },
}

impl RawCommand {
    /// Parse `<WRITE 0xHH, b0 b1 ...>` or `<READ 0xHH, n>`
    pub fn parse(command: &str) -> Result<Self, CommandError> {
        if is_raw_write(command) {
            let invalid = || CommandError::InvalidWrite(command.to_string());
            let captures = write_pattern()
                .and_then(|re| re.captures(command))
                .ok_or_else(invalid)?;
            let address = parse_address(&captures[1]).ok_or_else(invalid)?;
            let data = captures[2]
                .split_whitespace()
                .map(parse_data_byte)
                .collect::<Option<Vec<u8>>>()
                .filter(|data| !data.is_empty())
                .ok_or_else(invalid)?;
            Ok(RawCommand::Write { address, data })
        } else if is_raw_read(command) {
            let invalid = || CommandError::InvalidRead(command.to_string());
            let captures = read_pattern()
                .and_then(|re| re.captures(command))
                .ok_or_else(invalid)?;
            let address = parse_address(&captures[1]).ok_or_else(invalid)?;
            let count = captures[2]
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(invalid)?;
            Ok(RawCommand::Read { address, count })
        } else {
            Err(CommandError::InvalidRead(command.to_string()))
        }
    }

    /// Target address
    pub fn address(&self) -> u8 {
        match self {
            RawCommand::Write { address, .. } | RawCommand::Read { address, .. } => *address,
        }
    }

    /// Bytes written for a raw write (payload and line feed)
    pub fn frame(&self) -> Option<Vec<u8>> {
        match self {
            RawCommand::Write { data, .. } => {
                let mut frame = data.clone();
                frame.push(COMMAND_TERMINATOR);
                Some(frame)
            }
            RawCommand::Read { .. } => None,
        }
    }
}

/// I2C pull-up resistor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Pullups {
    /// Pull-up resistors enabled
    On,
    /// Pull-up resistors disabled
    Off,
}

impl fmt::Display for Pullups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pullups::On => write!(f, "on"),
            Pullups::Off => write!(f, "off"),
        }
    }
}

/// Bus configuration changes embedded in a command script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigDirective {
    /// `<DELAY ms>`: wait before the next command
    Delay(u64),
    /// `<ADDRESS 0xHH>`: talk to a different module
    Address(u8),
    /// `<BITRATE khz>`
    Bitrate(u32),
    /// `<PULLUPS ON>` / `<PULLUPS OFF>`
    Pullups(Pullups),
}

impl ConfigDirective {
    /// Parse a bracketed directive
    pub fn parse(command: &str) -> Result<Self, CommandError> {
        let inner = command
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| CommandError::UnknownDirective(command.to_string()))?;
        let (keyword, argument) = inner.split_once(' ').unwrap_or((inner, ""));

        match keyword {
            "DELAY" => argument
                .parse::<u64>()
                .ok()
                .filter(|_| argument.chars().all(|c| c.is_ascii_digit()))
                .map(ConfigDirective::Delay)
                .ok_or(CommandError::InvalidDirective {
                    keyword: "DELAY",
                    usage: "<DELAY x>",
                }),
            "ADDRESS" => parse_address(argument)
                .map(ConfigDirective::Address)
                .ok_or(CommandError::InvalidDirective {
                    keyword: "ADDRESS",
                    usage: "<ADDRESS 0xYY>",
                }),
            "BITRATE" => argument
                .parse::<u32>()
                .ok()
                .filter(|_| argument.chars().all(|c| c.is_ascii_digit()))
                .map(ConfigDirective::Bitrate)
                .ok_or(CommandError::InvalidDirective {
                    keyword: "BITRATE",
                    usage: "<BITRATE x>",
                }),
            "PULLUPS" => match argument {
                "ON" => Ok(ConfigDirective::Pullups(Pullups::On)),
                "OFF" => Ok(ConfigDirective::Pullups(Pullups::Off)),
                _ => Err(CommandError::InvalidDirective {
                    keyword: "PULLUPS",
                    usage: "<PULLUPS ON> or <PULLUPS OFF>",
                }),
            },
            _ => Err(CommandError::UnknownDirective(command.to_string())),
        }
    }
}

/// One classified script line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScriptCommand {
    /// Bus configuration
    Directive(ConfigDirective),
    /// Raw transfer
    Raw(RawCommand),
    /// Plain command expecting a telemetry reply
    Query(String),
    /// Plain command with no reply
    Write(String),
}

impl ScriptCommand {
    /// Classify and parse one trimmed script line
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            Err(CommandError::Empty)
        } else if is_raw_write(line) || is_raw_read(line) {
            RawCommand::parse(line).map(ScriptCommand::Raw)
        } else if is_config_directive(line) {
            ConfigDirective::parse(line).map(ScriptCommand::Directive)
        } else if is_telemetry_query(line) {
            Ok(ScriptCommand::Query(line.to_string()))
        } else {
            Ok(ScriptCommand::Write(line.to_string()))
        }
    }
}

/// Split script text into trimmed, non-empty lines
pub fn script_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

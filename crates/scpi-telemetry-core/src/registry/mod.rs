//! Command Registry
//!
//! Owns the byte-layout contract for every known telemetry command: how many
//! bytes a reply occupies and how its payload splits into fields.
//!
//! Commands are registered by base name (e.g. `SUP:TEL? 4`) on a
//! [`RegistryBuilder`]; each base expands into four derived entries
//! (`,name`, `,data`, `,length`, `,ascii`) when the builder is frozen into a
//! [`CommandRegistry`].

mod defaults;
mod error;
mod format;
mod import;

pub use error::RegistryError;
pub use format::{FieldFormat, FormatRejection, ResponseFormat};
pub use import::{apply_command_document, import_command_definitions, import_command_str};

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::layout::{parse_size, HeaderField, HeaderSizes, DEFAULT_LENGTH};

/// A registry lookup key such as `SUP:TEL? 0,data`.
///
/// Keys are matched exactly; callers upper-case user input before lookup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommandKey(String);

impl CommandKey {
    /// Create a key, rejecting empty or whitespace-only strings
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// The key text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The device prefix (text before the first `:`)
    pub fn device(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    /// Which of the four reply variants this key names, if any
    pub fn reply_kind(&self) -> Option<ReplyKind> {
        ReplyKind::ALL
            .into_iter()
            .find(|kind| self.0.ends_with(kind.suffix()))
    }
}

impl Borrow<str> for CommandKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four reply variants generated for every base command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplyKind {
    /// Telemetry item name
    Name,
    /// Telemetry value in its registered format
    Data,
    /// Payload length of the data reply
    Length,
    /// Telemetry value rendered as text by the module
    Ascii,
}

impl ReplyKind {
    /// All variants, in registration order
    pub const ALL: [ReplyKind; 4] = [
        ReplyKind::Name,
        ReplyKind::Data,
        ReplyKind::Length,
        ReplyKind::Ascii,
    ];

    /// Key suffix, including the separating comma
    pub fn suffix(&self) -> &'static str {
        match self {
            ReplyKind::Name => ",name",
            ReplyKind::Data => ",data",
            ReplyKind::Length => ",length",
            ReplyKind::Ascii => ",ascii",
        }
    }
}

/// Expected reply length and payload format for one command key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Total bytes to read, header and checksum included
    pub expected_length: usize,
    /// Payload format
    pub format: ResponseFormat,
}

/// A validated base command waiting to be expanded
#[derive(Debug, Clone)]
struct BaseCommand {
    name: String,
    payload_length: usize,
    format: ResponseFormat,
}

impl BaseCommand {
    fn derived_keys(&self) -> impl Iterator<Item = String> + '_ {
        ReplyKind::ALL
            .into_iter()
            .map(move |kind| format!("{}{}", self.name, kind.suffix()))
    }

    /// Derived entry, or `None` when its length overflows
    fn entry(&self, kind: ReplyKind, sizes: &HeaderSizes) -> Option<CommandEntry> {
        let (payload, format) = match kind {
            ReplyKind::Name => (sizes.name_size, ResponseFormat::Single(FieldFormat::Ascii)),
            ReplyKind::Data => (self.payload_length, self.format.clone()),
            ReplyKind::Length => (sizes.length_size, ResponseFormat::Single(FieldFormat::Byte)),
            ReplyKind::Ascii => (sizes.ascii_size, ResponseFormat::Single(FieldFormat::Ascii)),
        };
        Some(CommandEntry {
            expected_length: sizes.frame_length(payload)?,
            format,
        })
    }
}

/// Mutable registry under construction.
///
/// Registration never fails outright: rejected definitions are recorded in
/// [`RegistryBuilder::errors`] and skipped.
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    sizes: HeaderSizes,
    commands: Vec<BaseCommand>,
    keys: HashSet<String>,
    errors: Vec<RegistryError>,
    default_length: usize,
    ascii_without_preamble: bool,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// Create an empty builder with default header sizes
    pub fn new() -> Self {
        Self {
            sizes: HeaderSizes::default(),
            commands: Vec::new(),
            keys: HashSet::new(),
            errors: Vec::new(),
            default_length: DEFAULT_LENGTH,
            ascii_without_preamble: false,
        }
    }

    /// Create a builder pre-loaded with the SupMCU commands every module supports
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        for (name, length, format) in defaults::SUPMCU_COMMANDS {
            builder.register(name, length, format);
        }
        builder
    }

    /// Register a base command, expanding to four entries at [`build`](Self::build).
    ///
    /// `payload_length` must be a non-negative integer and `format_spec` a
    /// single format token or a comma separated list of numeric tokens.
    /// Invalid or duplicate definitions are logged and ignored; the first
    /// registration of a name wins.
    pub fn register(&mut self, base_command: &str, payload_length: impl ToString, format_spec: &str) {
        let name = base_command.trim().to_string();
        let length_text = payload_length.to_string();

        let parsed = parse_size(&length_text).filter(|&length| self.sizes.frame_length(length).is_some());
        let Some(payload_length) = parsed else {
            self.log_error(RegistryError::InvalidLength {
                command: name,
                length: length_text,
            });
            return;
        };

        let format = match ResponseFormat::parse(format_spec) {
            Ok(format) => format,
            Err(FormatRejection::UnknownToken) => {
                self.log_error(RegistryError::InvalidFormat {
                    command: name,
                    format: format_spec.to_string(),
                });
                return;
            }
            Err(FormatRejection::TextInSequence) => {
                self.log_error(RegistryError::TextInSequence {
                    command: name,
                    format: format_spec.to_string(),
                });
                return;
            }
        };

        let command = BaseCommand {
            name,
            payload_length,
            format,
        };

        let taken = command.derived_keys().find(|key| self.keys.contains(key));
        if let Some(taken) = taken {
            self.log_error(RegistryError::DuplicateCommand(taken));
            return;
        }

        self.keys.extend(command.derived_keys());
        self.commands.push(command);
    }

    /// Update one header size from its configuration text.
    ///
    /// Invalid values are logged and the previous size is kept.
    pub fn update_header_size(&mut self, field_name: &str, new_value: &str) {
        let result = field_name
            .parse::<HeaderField>()
            .and_then(|field| self.sizes.update(field, new_value));
        if let Err(e) = result {
            self.log_error(e);
        }
    }

    /// Load header sizes and commands from a definition file
    pub fn import_xml<P: AsRef<std::path::Path>>(&mut self, path: P) {
        import_command_definitions(self, path);
    }

    /// Read length used for unknown commands
    pub fn set_default_length(&mut self, length: usize) {
        self.default_length = length;
    }

    /// Treat `,ascii` replies as carrying no write flag or timestamp
    pub fn ascii_without_preamble(mut self, enabled: bool) -> Self {
        self.ascii_without_preamble = enabled;
        self
    }

    /// Record an error found while loading definitions
    pub fn log_error(&mut self, error: RegistryError) {
        tracing::warn!("{error}");
        self.errors.push(error);
    }

    /// Errors collected so far
    pub fn errors(&self) -> &[RegistryError] {
        &self.errors
    }

    /// Current header sizes
    pub fn header_sizes(&self) -> &HeaderSizes {
        &self.sizes
    }

    /// Number of base commands registered
    pub fn base_count(&self) -> usize {
        self.commands.len()
    }

    /// Freeze into an immutable registry, expanding every base command
    ///
    /// A command whose reply length no longer fits the final header sizes is
    /// logged and left out.
    pub fn build(mut self) -> CommandRegistry {
        let mut entries = BTreeMap::new();
        let mut oversized = Vec::new();
        for command in &self.commands {
            let derived: Option<Vec<(CommandKey, CommandEntry)>> = ReplyKind::ALL
                .into_iter()
                .map(|kind| {
                    let key = CommandKey(format!("{}{}", command.name, kind.suffix()));
                    command.entry(kind, &self.sizes).map(|entry| (key, entry))
                })
                .collect();
            match derived {
                Some(derived) => entries.extend(derived),
                None => oversized.push(RegistryError::InvalidLength {
                    command: command.name.clone(),
                    length: command.payload_length.to_string(),
                }),
            }
        }
        for error in oversized {
            self.log_error(error);
        }

        tracing::debug!(
            "Command registry built: {} commands, {} entries, {} errors",
            self.commands.len(),
            entries.len(),
            self.errors.len()
        );

        CommandRegistry {
            entries,
            sizes: self.sizes,
            default_length: self.default_length,
            ascii_without_preamble: self.ascii_without_preamble,
            errors: self.errors,
        }
    }
}

/// Immutable registry of command byte layouts
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    entries: BTreeMap<CommandKey, CommandEntry>,
    sizes: HeaderSizes,
    default_length: usize,
    ascii_without_preamble: bool,
    errors: Vec<RegistryError>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        RegistryBuilder::with_defaults().build()
    }
}

impl CommandRegistry {
    /// Exact-match lookup
    pub fn lookup(&self, command_key: &str) -> Option<&CommandEntry> {
        self.entries.get(command_key)
    }

    /// True when the key is registered
    pub fn contains(&self, command_key: &str) -> bool {
        self.entries.contains_key(command_key)
    }

    /// Bytes to read for a command, falling back to the default length for
    /// unknown commands so they still get a bounded read attempt.
    pub fn expected_length(&self, command_key: &str) -> usize {
        match self.lookup(command_key) {
            Some(entry) => entry.expected_length,
            None => {
                tracing::warn!(
                    "*** Command \"{}\" not found in dictionary, length defaults to {} ***",
                    command_key,
                    self.default_length
                );
                self.default_length
            }
        }
    }

    /// Whether replies to this command start with a write flag and timestamp
    pub fn has_preamble(&self, command_key: &str) -> bool {
        !(self.ascii_without_preamble && command_key.ends_with(ReplyKind::Ascii.suffix()))
    }

    /// Distinct device prefixes of all non-SupMCU commands
    pub fn list_devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = Vec::new();
        for key in self.entries.keys() {
            let device = match key.device() {
                "SUP" => continue,
                "GPS" => "GPSRM",
                other => other,
            };
            if !devices.iter().any(|d| d == device) {
                devices.push(device.to_string());
            }
        }
        devices
    }

    /// Header sizes the entries were derived with
    pub fn header_sizes(&self) -> &HeaderSizes {
        &self.sizes
    }

    /// Read length used for unknown commands
    pub fn default_length(&self) -> usize {
        self.default_length
    }

    /// Errors collected while the registry was built
    pub fn errors(&self) -> &[RegistryError] {
        &self.errors
    }

    /// All entries, ordered by key
    pub fn entries(&self) -> impl Iterator<Item = (&CommandKey, &CommandEntry)> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no commands are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

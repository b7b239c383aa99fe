//! Tool configuration
//!
//! Defaults for the command runner, optionally overridden by an XML file:
//!
//! ```xml
//! <config>
//!     <default_filename>aardvark_script.xml</default_filename>
//!     <default_delay>200</default_delay>
//!     <default_length>16</default_length>
//!     <default_dp>4</default_dp>
//!     <addresses>
//!         <PIM address="0x53"/>
//!     </addresses>
//!     <default_commands>
//!         <command>SUP:TEL? 0,name</command>
//!     </default_commands>
//! </config>
//! ```
//!
//! A bad value is logged and the built-in default kept.

use serde::Serialize;
use std::path::Path;

use crate::command::parse_address;
use crate::layout::{parse_size, DEFAULT_DECIMAL_PLACES, DEFAULT_LENGTH};
use crate::registry::RegistryBuilder;
use crate::report::DECIMAL_PLACES_RANGE;
use crate::xml::{self, XmlElement};

/// Default inter-message delay (ms)
pub const DEFAULT_DELAY_MS: u64 = 200;

/// Default script file name
pub const DEFAULT_FILENAME: &str = "aardvark_script.xml";

/// Modules without a SCPI interface, always kept in the address table
const NON_SCPI_DEVICES: &[(&str, u8)] = &[
    ("CS EPS", 0x2B),
    ("ADCS CTRL", 0x1F),
    ("CS BAT", 0x2A),
    ("EXT_LIGHT", 0x60),
];

const SCPI_DEVICES: &[(&str, u8)] = &[
    ("PIM", 0x53),
    ("BM2", 0x5C),
    ("GPSRM", 0x51),
    ("SIM", 0x50),
    ("BIM", 0x52),
    ("BSM", 0x58),
];

const DEFAULT_COMMANDS: &[&str] = &[
    "SUP:TEL? 0,name",
    "SUP:TEL? 0,length",
    "SUP:TEL? 0,data",
    "SUP:TEL? 0,ascii",
];

/// Problems found in the configuration file
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read or parsed
    #[error("*** {0} is missing or corrupt ***")]
    Unreadable(String),

    /// A setting appears zero or several times
    #[error("*** There is the wrong number of {0} declarations ***")]
    WrongCount(&'static str),

    /// A setting has an unusable value
    #[error("*** Invalid {0} in config file ***")]
    InvalidValue(&'static str),

    /// A module address is not `0xHH`
    #[error("*** Invalid default address for {0} in config file ***")]
    InvalidAddress(String),

    /// The address table is missing or empty
    #[error("*** No addresses were provided in config file ***")]
    NoAddresses,

    /// The default command list is missing or empty
    #[error("*** No commands were provided in config file ***")]
    NoCommands,
}

/// A named module and its I2C address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceAddress {
    /// Module name as shown to the user
    pub name: String,
    /// 7-bit I2C address
    pub address: u8,
}

impl DeviceAddress {
    fn new(name: &str, address: u8) -> Self {
        Self {
            name: name.to_string(),
            address,
        }
    }
}

/// Runner defaults
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefaults {
    /// Script file used when none is given
    pub filename: String,
    /// Delay between transfers (ms)
    pub delay_ms: u64,
    /// Read length for commands not in the registry
    pub default_length: usize,
    /// Decimal places for float display
    pub decimal_places: u8,
    /// Known modules, in display order
    pub addresses: Vec<DeviceAddress>,
    /// Commands offered when no script is loaded
    pub commands: Vec<String>,
    #[serde(skip)]
    errors: Vec<ConfigError>,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_string(),
            delay_ms: DEFAULT_DELAY_MS,
            default_length: DEFAULT_LENGTH,
            decimal_places: DEFAULT_DECIMAL_PLACES,
            addresses: SCPI_DEVICES
                .iter()
                .chain(NON_SCPI_DEVICES)
                .map(|(name, address)| DeviceAddress::new(name, *address))
                .collect(),
            commands: DEFAULT_COMMANDS.iter().map(|c| c.to_string()).collect(),
            errors: Vec::new(),
        }
    }
}

impl ToolDefaults {
    /// Built-in defaults overridden by a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut defaults = Self::default();
        match xml::read_document(path) {
            Ok(root) => defaults.apply(&root),
            Err(e) => {
                tracing::debug!("Failed to read {}: {e}", path.display());
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                defaults.log_error(ConfigError::Unreadable(name));
            }
        }
        defaults
    }

    /// Built-in defaults overridden by config XML text
    pub fn from_xml_str(content: &str) -> Self {
        let mut defaults = Self::default();
        match xml::parse_document(content) {
            Ok(root) => defaults.apply(&root),
            Err(_) => defaults.log_error(ConfigError::Unreadable("config".to_string())),
        }
        defaults
    }

    /// Apply every setting present in a parsed config document
    pub fn apply(&mut self, root: &XmlElement) {
        if let Some(text) = self.single(root, "default_filename") {
            if text.ends_with(".xml") {
                self.filename = text;
            } else {
                self.log_error(ConfigError::InvalidValue("default filename"));
            }
        }

        if let Some(text) = self.single(root, "default_delay") {
            match parse_size(&text).filter(|&v| v > 0) {
                Some(delay) => self.delay_ms = delay as u64,
                None => self.log_error(ConfigError::InvalidValue("default delay")),
            }
        }

        if let Some(text) = self.single(root, "default_length") {
            match parse_size(&text).filter(|&v| v > 0) {
                Some(length) => self.default_length = length,
                None => self.log_error(ConfigError::InvalidValue("default length")),
            }
        }

        if let Some(text) = self.single(root, "default_dp") {
            let dp = parse_size(&text)
                .and_then(|v| u8::try_from(v).ok())
                .filter(|v| DECIMAL_PLACES_RANGE.contains(v));
            match dp {
                Some(dp) => self.decimal_places = dp,
                None => self.log_error(ConfigError::InvalidValue("default number of decimal places")),
            }
        }

        self.apply_addresses(root);
        self.apply_commands(root);
    }

    fn single(&mut self, root: &XmlElement, tag: &'static str) -> Option<String> {
        let found: Vec<&XmlElement> = root.children_named(tag).collect();
        match found.as_slice() {
            [element] => Some(element.text.trim().to_string()),
            _ => {
                self.log_error(ConfigError::WrongCount(tag));
                None
            }
        }
    }

    /// The first listed address replaces the built-in SCPI modules
    fn apply_addresses(&mut self, root: &XmlElement) {
        let lists: Vec<&XmlElement> = root.children_named("addresses").collect();
        let [list] = lists.as_slice() else {
            self.log_error(ConfigError::NoAddresses);
            return;
        };
        if list.children.is_empty() {
            self.log_error(ConfigError::NoAddresses);
            return;
        }

        let mut first = true;
        for element in &list.children {
            // tags cannot hold spaces: CS_EPS names "CS EPS"
            let name = NON_SCPI_DEVICES
                .iter()
                .find(|(known, _)| known.replace(' ', "_") == element.name)
                .map_or_else(|| element.name.clone(), |(known, _)| known.to_string());
            let Some(address) = element.attribute("address").and_then(parse_address) else {
                self.log_error(ConfigError::InvalidAddress(name));
                continue;
            };
            if first {
                self.addresses = NON_SCPI_DEVICES
                    .iter()
                    .map(|(name, address)| DeviceAddress::new(name, *address))
                    .collect();
                first = false;
            }
            self.set_address(&name, address);
        }
    }

    fn apply_commands(&mut self, root: &XmlElement) {
        let lists: Vec<&XmlElement> = root.children_named("default_commands").collect();
        let commands: Vec<String> = match lists.as_slice() {
            [list] => list
                .children
                .iter()
                .map(|c| c.text.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        if commands.is_empty() {
            self.log_error(ConfigError::NoCommands);
        } else {
            self.commands = commands;
        }
    }

    fn set_address(&mut self, name: &str, address: u8) {
        match self.addresses.iter_mut().find(|d| d.name == name) {
            Some(device) => device.address = address,
            None => self.addresses.push(DeviceAddress::new(name, address)),
        }
    }

    /// Address of a named module
    pub fn address_of(&self, name: &str) -> Option<u8> {
        self.addresses
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .map(|d| d.address)
    }

    /// Pass the registry-facing settings to a registry under construction
    pub fn apply_to(&self, builder: &mut RegistryBuilder) {
        builder.set_default_length(self.default_length);
    }

    /// Delay before reading an `,ascii` reply (four times the message delay)
    pub fn ascii_delay_ms(&self) -> u64 {
        self.delay_ms * 4
    }

    fn log_error(&mut self, error: ConfigError) {
        tracing::warn!("{error}");
        self.errors.push(error);
    }

    /// Problems found while loading
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }
}

//! Error types for command registration

use thiserror::Error;

/// Problems found while building the command registry.
///
/// These are collected into the builder's error log rather than returned to
/// the caller, so a bad definition never stops the remaining ones loading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A data length that is not a usable byte count
    #[error("*** Invalid data length '{length}' for command '{command}' ***")]
    InvalidLength {
        /// Base command
        command: String,
        /// Length as given
        length: String,
    },

    /// A format token that is not recognised
    #[error("*** Invalid data format '{format}' for command '{command}' ***")]
    InvalidFormat {
        /// Base command
        command: String,
        /// Format as given
        format: String,
    },

    /// `ascii` or `hex` inside a field list
    #[error("*** Data format '{format}' for command '{command}' may not contain ascii or hex members ***")]
    TextInSequence {
        /// Base command
        command: String,
        /// Format as given
        format: String,
    },

    /// A derived key is already registered
    #[error("*** Command '{0}' is already registered ***")]
    DuplicateCommand(String),

    /// A header size that is not a usable byte count
    #[error("*** Invalid value '{value}' for {field} ***")]
    InvalidHeaderSize {
        /// Size tag
        field: String,
        /// Value as given
        value: String,
    },

    /// A size tag that names no header field
    #[error("*** {0} is not a recognised size config ***")]
    UnknownHeaderField(String),

    /// The definition file could not be used
    #[error("*** {0} ***")]
    Import(String),
}

//! Reply data formats
//!
//! A command's reply payload is either one field or a fixed list of numeric
//! fields laid out back to back, all little-endian.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format of a single reply field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldFormat {
    /// Null-terminated ASCII text
    Ascii,
    /// Raw bytes shown as a hex dump
    Hex,
    /// Signed 16-bit integer (`int`)
    Int16,
    /// Unsigned 16-bit integer (`uint`)
    UInt16,
    /// Signed 32-bit integer (`long`)
    Int32,
    /// Signed 64-bit integer (`long long`)
    Int64,
    /// 32-bit float (`float`)
    Float32,
    /// 64-bit float (`double`)
    Float64,
    /// Unsigned 8-bit value (`char`)
    Byte,
}

impl FieldFormat {
    /// Parse a format token as written in command definitions
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "ascii" => Some(FieldFormat::Ascii),
            "hex" => Some(FieldFormat::Hex),
            "int" => Some(FieldFormat::Int16),
            "uint" => Some(FieldFormat::UInt16),
            "long" => Some(FieldFormat::Int32),
            "long long" => Some(FieldFormat::Int64),
            "float" => Some(FieldFormat::Float32),
            "double" => Some(FieldFormat::Float64),
            "char" => Some(FieldFormat::Byte),
            _ => None,
        }
    }

    /// The definition-file token for this format
    pub fn token(&self) -> &'static str {
        match self {
            FieldFormat::Ascii => "ascii",
            FieldFormat::Hex => "hex",
            FieldFormat::Int16 => "int",
            FieldFormat::UInt16 => "uint",
            FieldFormat::Int32 => "long",
            FieldFormat::Int64 => "long long",
            FieldFormat::Float32 => "float",
            FieldFormat::Float64 => "double",
            FieldFormat::Byte => "char",
        }
    }

    /// Width in bytes (0 for the variable-size text formats)
    pub fn size_bytes(&self) -> usize {
        match self {
            FieldFormat::Ascii | FieldFormat::Hex => 0,
            FieldFormat::Byte => 1,
            FieldFormat::Int16 | FieldFormat::UInt16 => 2,
            FieldFormat::Int32 | FieldFormat::Float32 => 4,
            FieldFormat::Int64 | FieldFormat::Float64 => 8,
        }
    }

    /// Ascii and hex consume the whole payload and cannot sit in a list
    pub fn is_text(&self) -> bool {
        matches!(self, FieldFormat::Ascii | FieldFormat::Hex)
    }
}

impl fmt::Display for FieldFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Why a format string was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRejection {
    /// A token is not a known format
    UnknownToken,
    /// A list contains `ascii` or `hex`
    TextInSequence,
}

/// Format of a whole reply payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormat {
    /// One field
    Single(FieldFormat),
    /// An ordered list of numeric fields
    Sequence(Vec<FieldFormat>),
}

impl ResponseFormat {
    /// Parse a format spec: one token, or a comma separated list of tokens
    pub fn parse(spec: &str) -> Result<Self, FormatRejection> {
        if !spec.contains(',') {
            return FieldFormat::from_token(spec)
                .map(ResponseFormat::Single)
                .ok_or(FormatRejection::UnknownToken);
        }

        let fields = spec
            .split(',')
            .map(|token| FieldFormat::from_token(token).ok_or(FormatRejection::UnknownToken))
            .collect::<Result<Vec<_>, _>>()?;

        if fields.iter().any(FieldFormat::is_text) {
            return Err(FormatRejection::TextInSequence);
        }

        Ok(ResponseFormat::Sequence(fields))
    }

    /// The fields of this format in payload order
    pub fn fields(&self) -> &[FieldFormat] {
        match self {
            ResponseFormat::Single(field) => std::slice::from_ref(field),
            ResponseFormat::Sequence(fields) => fields,
        }
    }

    /// Number of decoded values (and log cells) this format produces
    pub fn cell_count(&self) -> usize {
        self.fields().len()
    }

    /// Payload bytes implied by the numeric fields
    pub fn payload_size(&self) -> usize {
        self.fields().iter().map(FieldFormat::size_bytes).sum()
    }

    /// True when this is a list format
    pub fn is_sequence(&self) -> bool {
        matches!(self, ResponseFormat::Sequence(_))
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.fields().iter().map(FieldFormat::token).collect();
        f.write_str(&tokens.join(", "))
    }
}

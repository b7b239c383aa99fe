//! Command definition file import
//!
//! Format:
//!
//! ```xml
//! <commands>
//!     <sizes>
//!         <name_size>32</name_size>
//!         <checksum_size>0</checksum_size>
//!         <wflag_size>1</wflag_size>
//!         <time_size>4</time_size>
//!         <length_size>1</length_size>
//!         <ascii_size>128</ascii_size>
//!     </sizes>
//!     <command name="BM2:TEL? 1" data_length="2" data_format="int"/>
//! </commands>
//! ```
//!
//! Every problem is logged on the builder; nothing here aborts the import.

use std::path::Path;

use super::{RegistryBuilder, RegistryError};
use crate::xml::{self, XmlElement};

/// Load a command definition file into `builder`
pub fn import_command_definitions<P: AsRef<Path>>(builder: &mut RegistryBuilder, path: P) {
    let path = path.as_ref();
    match xml::read_document(path) {
        Ok(root) => apply_command_document(builder, &root),
        Err(e) => {
            tracing::debug!("Failed to read {}: {e}", path.display());
            builder.log_error(RegistryError::Import(format!(
                "{} is missing or corrupt",
                file_name(path)
            )));
        }
    }
}

/// Load command definitions from XML text
pub fn import_command_str(builder: &mut RegistryBuilder, content: &str) {
    match xml::parse_document(content) {
        Ok(root) => apply_command_document(builder, &root),
        Err(e) => builder.log_error(RegistryError::Import(format!(
            "command definitions are corrupt: {e}"
        ))),
    }
}

/// Apply a parsed definition document: sizes first, then commands
pub fn apply_command_document(builder: &mut RegistryBuilder, root: &XmlElement) {
    let sizes: Vec<&XmlElement> = root.children_named("sizes").collect();
    match sizes.as_slice() {
        [sizes] => {
            for size in &sizes.children {
                builder.update_header_size(&size.name, &size.text);
            }
        }
        _ => builder.log_error(RegistryError::Import(
            "No size configurations were found in the command definitions".into(),
        )),
    }

    let mut registered = 0usize;
    for command in root.children_named("command") {
        match (
            command.attribute("name"),
            command.attribute("data_length"),
            command.attribute("data_format"),
        ) {
            (Some(name), Some(length), Some(format)) => {
                builder.register(name, length, format);
                registered += 1;
            }
            _ => builder.log_error(RegistryError::Import(
                "A command has an invalid format in the command definitions".into(),
            )),
        }
    }

    if registered == 0 {
        builder.log_error(RegistryError::Import(
            "No commands were found in the command definitions".into(),
        ));
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

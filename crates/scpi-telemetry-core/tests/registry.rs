//! Tests for command registration, header sizes and definition file import

use pretty_assertions::assert_eq;
use scpi_telemetry_core::layout::HeaderSizes;
use scpi_telemetry_core::registry::{
    import_command_definitions, CommandRegistry, FieldFormat, RegistryBuilder, RegistryError,
    ResponseFormat,
};
use std::fs;
use tempfile::TempDir;

fn assert_expanded(registry: &CommandRegistry, base: &str, length: usize) {
    let sizes = registry.header_sizes();
    let total = sizes.header_total();
    assert_eq!(
        registry.lookup(&format!("{base},name")).map(|e| e.expected_length),
        Some(total + sizes.name_size)
    );
    assert_eq!(
        registry.lookup(&format!("{base},length")).map(|e| e.expected_length),
        Some(total + sizes.length_size)
    );
    assert_eq!(
        registry.lookup(&format!("{base},ascii")).map(|e| e.expected_length),
        Some(total + sizes.ascii_size)
    );
    assert_eq!(
        registry.lookup(&format!("{base},data")).map(|e| e.expected_length),
        Some(total + length)
    );
}

#[test]
fn test_expansion_invariant_for_every_format() {
    let definitions = [
        ("TST:TEL? 0", 7, "hex"),
        ("TST:TEL? 1", 1, "char"),
        ("TST:TEL? 2", 2, "uint"),
        ("TST:TEL? 3", 2, "int"),
        ("TST:TEL? 4", 4, "long"),
        ("TST:TEL? 5", 8, "long long"),
        ("TST:TEL? 6", 4, "float"),
        ("TST:TEL? 7", 8, "double"),
        ("TST:TEL? 8", 40, "ascii"),
        ("TST:TEL? 9", 12, "double, int, int"),
    ];

    for checksum in ["0", "2"] {
        let mut builder = RegistryBuilder::new();
        builder.update_header_size("checksum_size", checksum);
        for (base, length, format) in definitions {
            builder.register(base, length, format);
        }
        let registry = builder.build();
        assert!(registry.errors().is_empty(), "{:?}", registry.errors());
        assert_eq!(registry.len(), definitions.len() * 4);

        for (base, length, _) in definitions {
            assert_expanded(&registry, base, length);
        }
    }
}

#[test]
fn test_builtin_supmcu_commands() {
    let registry = CommandRegistry::default();
    assert_expanded(&registry, "SUP:TEL? 0", 48);
    assert_expanded(&registry, "SUP:TEL? 4", 22);
    assert_expanded(&registry, "SUP:TEL? 8", 8);
    assert_eq!(
        registry.lookup("SUP:TEL? 4,data").map(|e| e.format.clone()),
        Some(ResponseFormat::Sequence(vec![
            FieldFormat::Int32,
            FieldFormat::Int32,
            FieldFormat::Int16,
            FieldFormat::Int16,
            FieldFormat::Int16,
        ]))
    );
    assert!(!registry.contains("SUP:TEL? 3,data"));
    assert!(registry.list_devices().is_empty());
}

#[test]
fn test_rejected_definitions_are_collected() {
    let mut builder = RegistryBuilder::new();
    builder.register("BM2:TEL? 1", "two", "int");
    builder.register("BM2:TEL? 2", 2, "short");
    builder.register("BM2:TEL? 3", 10, "int, ascii");
    builder.register("BM2:TEL? 4", 2, "int");
    builder.register("BM2:TEL? 4", 4, "long");
    let registry = builder.build();

    assert_eq!(registry.len(), 4);
    assert_eq!(registry.expected_length("BM2:TEL? 4,data"), 7);
    assert_eq!(registry.errors().len(), 4);
    assert!(matches!(registry.errors()[0], RegistryError::InvalidLength { .. }));
    assert!(matches!(registry.errors()[1], RegistryError::InvalidFormat { .. }));
    assert!(matches!(registry.errors()[2], RegistryError::TextInSequence { .. }));
    assert!(matches!(registry.errors()[3], RegistryError::DuplicateCommand(_)));
}

#[test]
fn test_unknown_command_uses_default_length() {
    let mut builder = RegistryBuilder::with_defaults();
    builder.set_default_length(24);
    let registry = builder.build();
    assert_eq!(registry.expected_length("PIM:TEL? 99,data"), 24);
    // lookups are exact: no case folding or trimming
    assert_eq!(registry.expected_length("sup:tel? 8,data"), 24);
    assert_eq!(registry.expected_length("SUP:TEL? 8,data "), 24);
}

#[test]
fn test_import_definition_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("commands.xml");
    fs::write(
        &path,
        r#"<?xml version="1.0"?>
<commands>
    <command name="BM2:TEL? 5" data_length="10" data_format="int, int, long, uint"/>
    <command name="GPS:TEL? 1" data_length="8" data_format="double"/>
    <command name="PIM:TEL? 2" data_length="4"/>
    <sizes>
        <name_size>16</name_size>
        <chksum_size>1</chksum_size>
        <wflag_size>1</wflag_size>
        <time_size>4</time_size>
        <length_size>1</length_size>
        <ascii_size>64</ascii_size>
        <frame_size>3</frame_size>
    </sizes>
</commands>"#,
    )
    .unwrap();

    let mut builder = RegistryBuilder::with_defaults();
    import_command_definitions(&mut builder, &path);
    let registry = builder.build();

    let expected_sizes = HeaderSizes {
        name_size: 16,
        checksum_size: 1,
        writeflag_size: 1,
        timestamp_size: 4,
        length_size: 1,
        ascii_size: 64,
    };
    assert_eq!(registry.header_sizes(), &expected_sizes);

    // sizes apply to commands declared before them and to the built-ins
    assert_expanded(&registry, "BM2:TEL? 5", 10);
    assert_expanded(&registry, "GPS:TEL? 1", 8);
    assert_expanded(&registry, "SUP:TEL? 8", 8);
    assert_eq!(registry.expected_length("SUP:TEL? 8,data"), 14);

    assert_eq!(registry.list_devices(), vec!["BM2", "GPSRM"]);
    assert_eq!(
        registry.errors(),
        &[
            RegistryError::UnknownHeaderField("frame_size".to_string()),
            RegistryError::Import(
                "A command has an invalid format in the command definitions".to_string()
            ),
        ]
    );
}

#[test]
fn test_import_missing_file() {
    let dir = TempDir::new().unwrap();
    let mut builder = RegistryBuilder::with_defaults();
    builder.import_xml(dir.path().join("absent.xml"));

    assert_eq!(
        builder.errors(),
        &[RegistryError::Import("absent.xml is missing or corrupt".to_string())]
    );
    // defaults survive a failed import
    assert_eq!(builder.build().expected_length("SUP:TEL? 4,data"), 27);
}

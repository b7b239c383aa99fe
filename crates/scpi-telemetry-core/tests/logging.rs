//! Tests for polling sessions writing telemetry logs to disk

use pretty_assertions::assert_eq;
use scpi_telemetry_core::config::ToolDefaults;
use scpi_telemetry_core::datalog::{header_row, TelemetryLog, LOG_DELIMITER};
use scpi_telemetry_core::registry::RegistryBuilder;
use scpi_telemetry_core::report::DisplayOptions;
use scpi_telemetry_core::session::{Session, SessionSettings};
use scpi_telemetry_core::transport::SimulatedTransport;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn script(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

fn settings(address: u8) -> SessionSettings {
    SessionSettings {
        address,
        delay_ms: 10,
        ascii_delay_ms: 40,
        display: DisplayOptions::default(),
    }
}

fn read_log(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(LOG_DELIMITER)
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn test_logging_run_writes_header_and_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scpi_log.csv");

    let registry = RegistryBuilder::with_defaults().build();
    let sim = SimulatedTransport::seeded(registry.clone(), 11);
    let mut session = Session::new(&registry, sim, settings(0x53));
    let commands = script(&[
        "SUP:TEL? 4,data",
        "SUP:TEL? 8,data",
        "SUP:TEL? 0,ascii",
        "SUP:LED ON",
        "<DELAY 5>",
    ]);

    let header = header_row(&registry, &commands);
    let mut log = TelemetryLog::create(&path, &header).unwrap();
    session.run_logging(&commands, &mut log, 3, 1000).unwrap();
    assert_eq!(log.rows_written(), 3);
    drop(log);

    let rows = read_log(&path);
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[0],
        vec![
            "Timestamp",
            "SUP:TEL? 4,data: Time (s)",
            "SUP:TEL? 4,data: Data[0]",
            "SUP:TEL? 4,data: Data[1]",
            "SUP:TEL? 4,data: Data[2]",
            "SUP:TEL? 4,data: Data[3]",
            "SUP:TEL? 4,data: Data[4]",
            "SUP:TEL? 8,data: Time (s)",
            "SUP:TEL? 8,data: Data",
            "SUP:TEL? 0,ascii: Time (s)",
            "SUP:TEL? 0,ascii: Data",
        ]
    );
    for row in &rows[1..] {
        assert_eq!(row.len(), header.len());
    }
    // first query is read one delay after power-up
    assert_eq!(rows[1][0], "00:00:00:00.01");
    assert_eq!(rows[1][1], "0.01");
}

#[test]
fn test_absent_module_keeps_row_width() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.csv");

    let registry = RegistryBuilder::with_defaults().build();
    let sim = SimulatedTransport::seeded(registry.clone(), 3).with_devices(&[0x53]);
    let mut session = Session::new(&registry, sim, settings(0x5C));
    let commands = script(&["SUP:TEL? 4,data", "BM2:TEL? 42,data", "<READ 0x5C, 2>"]);

    let header = header_row(&registry, &commands);
    let mut log = TelemetryLog::create(&path, &header).unwrap();
    session.run_logging(&commands, &mut log, 1, 0).unwrap();
    drop(log);

    let rows = read_log(&path);
    assert_eq!(rows.len(), 2);
    let mut expected = vec!["-".to_string()];
    expected.extend(std::iter::repeat("No Device".to_string()).take(6));
    expected.push("01 01 01 01 01 01 01 01 01 01 01 01 01 01 01 01".to_string());
    expected.push("01 01".to_string());
    assert_eq!(rows[1], expected);
}

#[test]
fn test_configured_defaults_drive_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scpi_config.xml");
    fs::write(
        &path,
        r#"<?xml version="1.0"?>
<config>
    <default_filename>bench.xml</default_filename>
    <default_delay>25</default_delay>
    <default_length>8</default_length>
    <default_dp>2</default_dp>
    <addresses>
        <GPSRM address="0x51"/>
    </addresses>
    <default_commands>
        <command>SUP:TEL? 8,data</command>
        <command>GPS:TEL? 9,data</command>
    </default_commands>
</config>"#,
    )
    .unwrap();

    let defaults = ToolDefaults::load(&path);
    assert!(defaults.errors().is_empty(), "{:?}", defaults.errors());
    let address = defaults.address_of("GPSRM").unwrap();
    assert_eq!(address, 0x51);

    let mut builder = RegistryBuilder::with_defaults();
    defaults.apply_to(&mut builder);
    let registry = builder.build();
    assert_eq!(registry.expected_length("GPS:TEL? 9,data"), 8);

    let settings = SessionSettings::from_defaults(&defaults, address);
    assert_eq!(settings.ascii_delay_ms, 100);
    let sim = SimulatedTransport::seeded(registry.clone(), 8);
    let mut session = Session::new(&registry, sim, settings);

    let outputs = session.run_script(&defaults.commands).unwrap();
    let lines = outputs[0].lines(&settings.display);
    assert_eq!(lines[0], "Read:\t\tSUP:TEL? 8,data");
    assert_eq!(lines[1], "Timestamp:\t\t00:00:00:00.02");
    let data = lines[2].strip_prefix("Data:\t\t").unwrap();
    // two decimal places unless the random value is not finite
    assert!(
        data.split('.').nth(1).map_or(true, |frac| frac.len() == 2),
        "{data}"
    );
    assert_eq!(session.transport().elapsed_ms(), 4 * 25);
}

//! Tests for reply decoding and text reports

use pretty_assertions::assert_eq;
use scpi_telemetry_core::decode::{DecodedResult, DecodedValue, Decoder, FailureReason, Ticks};
use scpi_telemetry_core::registry::{CommandRegistry, RegistryBuilder};
use scpi_telemetry_core::report::{render_lines, render_report, DisplayOptions};

const PREAMBLE: [u8; 5] = [0x01, 0x64, 0x00, 0x00, 0x00];

fn with_preamble(payload: &[u8]) -> Vec<u8> {
    let mut raw = PREAMBLE.to_vec();
    raw.extend_from_slice(payload);
    raw
}

fn registry_with(definitions: &[(&str, usize, &str)]) -> CommandRegistry {
    let mut builder = RegistryBuilder::with_defaults();
    for (base, length, format) in definitions {
        builder.register(base, length, format);
    }
    builder.build()
}

fn decode_single(registry: &CommandRegistry, command: &str, payload: &[u8]) -> DecodedValue {
    let decoded = Decoder::new(registry)
        .decode(command, &with_preamble(payload))
        .unwrap();
    let values = decoded.result.values();
    assert_eq!(values.len(), 1, "{command}: {:?}", decoded.result);
    values[0].clone()
}

#[test]
fn test_concrete_double_scenario() {
    let registry = RegistryBuilder::with_defaults().build();
    let raw = [
        0x01, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE0, 0x3F,
    ];
    let decoded = Decoder::new(&registry).decode("SUP:TEL? 8,data", &raw).unwrap();

    assert_eq!(
        decoded.result,
        DecodedResult::Success {
            timestamp: Some(Ticks(100)),
            values: vec![DecodedValue::Float64(0.5)],
        }
    );
    assert_eq!(decoded.result.timestamp_seconds(), Some(1.0));
    assert_eq!(
        render_report(&decoded, &DisplayOptions::new(4)),
        "Timestamp:\t\t00:00:00:01.00\n\
         Data:\t\t0.5000\n\
         Hex:\t\t01 64 00 00 00 00 00 00 00 00 00 E0 3F"
    );
}

#[test]
fn test_numeric_boundaries_round_trip() {
    let registry = registry_with(&[
        ("TST:TEL? 1", 2, "int"),
        ("TST:TEL? 2", 2, "uint"),
        ("TST:TEL? 3", 4, "long"),
        ("TST:TEL? 4", 8, "long long"),
        ("TST:TEL? 5", 4, "float"),
        ("TST:TEL? 6", 8, "double"),
        ("TST:TEL? 7", 1, "char"),
    ]);

    for v in [0i16, -1, i16::MIN, i16::MAX] {
        assert_eq!(
            decode_single(&registry, "TST:TEL? 1,data", &v.to_le_bytes()),
            DecodedValue::Int16(v)
        );
    }
    for v in [0u16, 1, u16::MAX] {
        assert_eq!(
            decode_single(&registry, "TST:TEL? 2,data", &v.to_le_bytes()),
            DecodedValue::UInt16(v)
        );
    }
    for v in [0i32, -1, i32::MIN, i32::MAX] {
        assert_eq!(
            decode_single(&registry, "TST:TEL? 3,data", &v.to_le_bytes()),
            DecodedValue::Int32(v)
        );
    }
    for v in [0i64, -1, i64::MIN, i64::MAX] {
        assert_eq!(
            decode_single(&registry, "TST:TEL? 4,data", &v.to_le_bytes()),
            DecodedValue::Int64(v)
        );
    }
    for v in [0.0f32, -1.0, 1.2345, f32::MAX] {
        assert_eq!(
            decode_single(&registry, "TST:TEL? 5,data", &v.to_le_bytes()),
            DecodedValue::Float32(v)
        );
    }
    for v in [0.0f64, -1.0, 1234.5678, f64::MIN_POSITIVE] {
        assert_eq!(
            decode_single(&registry, "TST:TEL? 6,data", &v.to_le_bytes()),
            DecodedValue::Float64(v)
        );
    }
    for v in [0u8, 0x7F, u8::MAX] {
        assert_eq!(
            decode_single(&registry, "TST:TEL? 7,data", &[v]),
            DecodedValue::Byte(v)
        );
    }

    // display precision for floats
    let decoded = Decoder::new(&registry)
        .decode("TST:TEL? 5,data", &with_preamble(&1.2345f32.to_le_bytes()))
        .unwrap();
    let lines = render_lines(&decoded, &DisplayOptions::new(2));
    assert_eq!(lines[1], "Data:\t\t1.23");
}

#[test]
fn test_all_sentinel_is_device_absent_for_every_format() {
    let registry = registry_with(&[
        ("TST:TEL? 1", 2, "int"),
        ("TST:TEL? 2", 6, "hex"),
        ("TST:TEL? 3", 12, "ascii"),
        ("TST:TEL? 4", 8, "long, int, int"),
    ]);
    let decoder = Decoder::new(&registry);

    for (key, entry) in registry.entries() {
        for length in [1, entry.expected_length, entry.expected_length + 3] {
            let raw = vec![0x01; length];
            let decoded = decoder.decode(key.as_str(), &raw).unwrap();
            assert_eq!(
                decoded.result,
                DecodedResult::Failure(FailureReason::DeviceAbsent),
                "{key} with {length} bytes"
            );
        }
    }
}

#[test]
fn test_write_flag_clear_is_write_flag_zero() {
    let registry = registry_with(&[("TST:TEL? 1", 4, "long")]);
    let decoder = Decoder::new(&registry);

    for flag in [0x00u8, 0x02, 0xFE] {
        let raw = [flag, 0x10, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04];
        let decoded = decoder.decode("TST:TEL? 1,data", &raw).unwrap();
        assert_eq!(decoded.result.failure(), Some(FailureReason::WriteFlagZero));
        assert_eq!(
            render_lines(&decoded, &DisplayOptions::default())[0],
            "*** Read failed, Write flag = 0, try increasing the message delay ***"
        );
    }
}

#[test]
fn test_ascii_null_truncation() {
    let registry = registry_with(&[("TST:TEL? 1", 5, "ascii")]);
    let raw = with_preamble(&[0x41, 0x42, 0x00, 0x99, 0x99]);
    let decoded = Decoder::new(&registry).decode("TST:TEL? 1,data", &raw).unwrap();

    assert_eq!(decoded.result.values(), &[DecodedValue::Text("AB".to_string())]);
    assert_eq!(decoded.stop_index, 8);
    assert_eq!(decoded.consumed(), &raw[..8]);
    assert_eq!(
        render_lines(&decoded, &DisplayOptions::default()).last().unwrap(),
        "Hex:\t\t01 64 00 00 00 41 42 00"
    );
}

#[test]
fn test_ascii_without_preamble_stop_index() {
    let registry = RegistryBuilder::with_defaults()
        .ascii_without_preamble(true)
        .build();
    let mut raw = b"[1:200] 3.30V\0".to_vec();
    raw.resize(registry.expected_length("SUP:TEL? 4,ascii"), 0x77);

    let decoded = Decoder::new(&registry).decode("SUP:TEL? 4,ascii", &raw).unwrap();
    assert!(!decoded.has_preamble);
    assert_eq!(decoded.stop_index, 14);
    assert_eq!(decoded.embedded_timestamp, Some(Ticks(200)));
    assert_eq!(
        render_lines(&decoded, &DisplayOptions::default())[..2].to_vec(),
        vec!["Timestamp:\t\t00:00:00:02.00", "Data:\t\t[1:200] 3.30V"]
    );
}

#[test]
fn test_sequence_offsets_stay_within_payload() {
    let registry = RegistryBuilder::with_defaults().build();
    let mut payload = Vec::new();
    payload.extend_from_slice(&123_456i32.to_le_bytes());
    payload.extend_from_slice(&(-7i32).to_le_bytes());
    payload.extend_from_slice(&(-2i16).to_le_bytes());
    payload.extend_from_slice(&300i16.to_le_bytes());
    payload.extend_from_slice(&i16::MAX.to_le_bytes());
    // bytes 14..22 are never read
    payload.extend_from_slice(&[0xEE; 8]);
    assert_eq!(payload.len(), 22);

    let decoded = Decoder::new(&registry)
        .decode("SUP:TEL? 4,data", &with_preamble(&payload))
        .unwrap();
    assert_eq!(
        decoded.result.values(),
        &[
            DecodedValue::Int32(123_456),
            DecodedValue::Int32(-7),
            DecodedValue::Int16(-2),
            DecodedValue::Int16(300),
            DecodedValue::Int16(i16::MAX),
        ]
    );
}

#[test]
fn test_short_payload_marks_fields_invalid() {
    let registry = RegistryBuilder::with_defaults().build();
    let raw = with_preamble(&[0x01, 0x00, 0x00, 0x00, 0x02, 0x00]);
    let decoded = Decoder::new(&registry).decode("SUP:TEL? 4,data", &raw).unwrap();

    assert_eq!(
        decoded.result.values(),
        &[
            DecodedValue::Int32(1),
            DecodedValue::Invalid,
            DecodedValue::Invalid,
            DecodedValue::Invalid,
            DecodedValue::Invalid,
        ]
    );
    assert_eq!(
        render_lines(&decoded, &DisplayOptions::default())[1],
        "Data:\t\t[1, invalid format, invalid format, invalid format, invalid format]"
    );

    let decoded = Decoder::new(&registry)
        .decode("SUP:TEL? 8,data", &with_preamble(&[0x00; 3]))
        .unwrap();
    assert_eq!(
        render_lines(&decoded, &DisplayOptions::default())[1],
        "*** No valid format for data ***"
    );
}

#[test]
fn test_decoded_reply_serializes() {
    let registry = RegistryBuilder::with_defaults().build();
    let mut raw = PREAMBLE.to_vec();
    raw.extend_from_slice(&0.5f64.to_le_bytes());
    let decoded = Decoder::new(&registry).decode("SUP:TEL? 8,data", &raw).unwrap();

    let json = serde_json::to_value(&decoded).unwrap();
    assert_eq!(json["command"], "SUP:TEL? 8,data");
    assert_eq!(json["has_preamble"], true);
    assert_eq!(json["result"]["Success"]["timestamp"], 100);
    assert_eq!(json["result"]["Success"]["values"][0]["Float64"], 0.5);

    let absent = Decoder::new(&registry)
        .decode("SUP:TEL? 8,data", &[0x01; 13])
        .unwrap();
    let json = serde_json::to_value(&absent).unwrap();
    assert_eq!(json["result"]["Failure"], "DeviceAbsent");
}

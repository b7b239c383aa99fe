//! Built-in SupMCU commands
//!
//! Every SupMCU-based module answers these, so they are available before any
//! command definition file is loaded.

/// (base command, data payload length, data format)
pub(super) const SUPMCU_COMMANDS: &[(&str, usize, &str)] = &[
    // Firmware version
    ("SUP:TEL? 0", 48, "ascii"),
    // SCPI commands parsed
    ("SUP:TEL? 1", 8, "long long"),
    // SCPI command errors
    ("SUP:TEL? 2", 8, "long long"),
    // CPU self-tests
    ("SUP:TEL? 4", 22, "long, long, int, int, int"),
    // Elapsed time in seconds
    ("SUP:TEL? 5", 8, "long long"),
    // Context switches
    ("SUP:TEL? 6", 8, "long long"),
    // Idling hooks remaining
    ("SUP:TEL? 7", 8, "long long"),
    // MCU load
    ("SUP:TEL? 8", 8, "double"),
];

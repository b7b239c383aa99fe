//! Simulated module stack
//!
//! Answers telemetry queries with well-formed replies built from the command
//! registry, so the whole write/read/decode path can run without hardware.
//! Addresses with no simulated module, and reads that follow anything other
//! than a registered query, return the idle bus fill of all `0x01`.

use std::collections::{HashMap, HashSet};

use byteorder::{ByteOrder, LittleEndian};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{BusTransport, TransportError};
use crate::command::{Pullups, COMMAND_TERMINATOR};
use crate::decode::TICKS_PER_SECOND;
use crate::registry::{CommandKey, CommandRegistry, FieldFormat, ReplyKind, ResponseFormat};

/// Byte seen on the bus when nothing drives it
const IDLE_FILL: u8 = 0x01;

/// Simulated modules answering on the bus
pub struct SimulatedTransport {
    registry: CommandRegistry,
    /// Addresses with a module attached (empty = every address answers)
    devices: HashSet<u8>,
    /// Last command written to each address
    pending: HashMap<u8, String>,
    /// Virtual time since power-up (ms)
    elapsed_ms: u64,
    bitrate_khz: u32,
    pullups: Pullups,
    writes: usize,
    rng: StdRng,
}

impl SimulatedTransport {
    /// Simulator seeded from system entropy
    pub fn new(registry: CommandRegistry) -> Self {
        Self::with_rng(registry, StdRng::from_entropy())
    }

    /// Deterministic simulator
    pub fn seeded(registry: CommandRegistry, seed: u64) -> Self {
        Self::with_rng(registry, StdRng::seed_from_u64(seed))
    }

    fn with_rng(registry: CommandRegistry, rng: StdRng) -> Self {
        Self {
            registry,
            devices: HashSet::new(),
            pending: HashMap::new(),
            elapsed_ms: 0,
            bitrate_khz: 100,
            pullups: Pullups::On,
            writes: 0,
            rng,
        }
    }

    /// Only answer at the given addresses
    pub fn with_devices(mut self, addresses: &[u8]) -> Self {
        self.devices = addresses.iter().copied().collect();
        self
    }

    /// Virtual time advanced by delays (ms)
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Current bitrate (kHz)
    pub fn bitrate_khz(&self) -> u32 {
        self.bitrate_khz
    }

    /// Current pull-up state
    pub fn pullups(&self) -> Pullups {
        self.pullups
    }

    /// Number of writes seen
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn is_attached(&self, address: u8) -> bool {
        self.devices.is_empty() || self.devices.contains(&address)
    }

    fn ticks(&self) -> u64 {
        self.elapsed_ms * TICKS_PER_SECOND / 1000
    }

    /// Build the reply a module would give to `command`
    fn reply(&mut self, command: &str, count: usize) -> Vec<u8> {
        let Some(entry) = self.registry.lookup(command).cloned() else {
            return vec![IDLE_FILL; count];
        };
        let sizes = *self.registry.header_sizes();
        let has_preamble = self.registry.has_preamble(command);
        let ticks = self.ticks();

        let mut reply = Vec::with_capacity(count);
        if has_preamble {
            let mut preamble = vec![0u8; sizes.preamble_len()];
            if sizes.writeflag_size > 0 {
                preamble[0] = 0x01;
            }
            let time = &mut preamble[sizes.writeflag_size..];
            let width = time.len().min(8);
            if width > 0 {
                let max = if width == 8 { u64::MAX } else { (1u64 << (width * 8)) - 1 };
                LittleEndian::write_uint(&mut time[..width], ticks.min(max), width);
            }
            reply.extend_from_slice(&preamble);
        }

        let payload_len = entry.expected_length.saturating_sub(sizes.header_total());
        let mut payload = self.payload(command, &entry.format, ticks);
        payload.resize(payload_len, 0x00);
        reply.extend_from_slice(&payload);

        for _ in 0..sizes.checksum_size {
            reply.push(self.rng.gen());
        }
        reply.resize(count, 0x00);
        reply
    }

    fn payload(&mut self, command: &str, format: &ResponseFormat, ticks: u64) -> Vec<u8> {
        let kind = CommandKey::new(command).and_then(|key| key.reply_kind());
        let base = command.rsplit_once(',').map_or(command, |(base, _)| base);

        match (kind, format) {
            (Some(ReplyKind::Name), _) => text_bytes(base),
            (Some(ReplyKind::Ascii), _) => {
                let value: f64 = self.rng.gen_range(0.0..5.0);
                text_bytes(&format!("[1:{}] {:.3}", ticks, value))
            }
            (Some(ReplyKind::Length), _) => {
                let data_key = format!("{}{}", base, ReplyKind::Data.suffix());
                let header = self.registry.header_sizes().header_total();
                let length = self
                    .registry
                    .lookup(&data_key)
                    .map_or(0, |entry| entry.expected_length.saturating_sub(header));
                vec![length.min(u8::MAX as usize) as u8]
            }
            (_, ResponseFormat::Single(FieldFormat::Ascii)) => text_bytes(&format!("{} v1.0", base)),
            (_, format) => format
                .fields()
                .iter()
                .flat_map(|field| self.field_bytes(*field))
                .collect(),
        }
    }

    fn field_bytes(&mut self, field: FieldFormat) -> Vec<u8> {
        let mut buf = vec![0u8; field.size_bytes()];
        match field {
            FieldFormat::Int16 => LittleEndian::write_i16(&mut buf, self.rng.gen_range(-500..500)),
            FieldFormat::UInt16 => LittleEndian::write_u16(&mut buf, self.rng.gen_range(0..4096)),
            FieldFormat::Int32 => LittleEndian::write_i32(&mut buf, self.rng.gen_range(-100_000..100_000)),
            FieldFormat::Int64 => LittleEndian::write_i64(&mut buf, self.rng.gen_range(0..1_000_000)),
            FieldFormat::Float32 => LittleEndian::write_f32(&mut buf, self.rng.gen_range(-10.0..10.0)),
            FieldFormat::Float64 => LittleEndian::write_f64(&mut buf, self.rng.gen_range(-10.0..10.0)),
            FieldFormat::Byte => buf[0] = self.rng.gen(),
            FieldFormat::Hex => {
                let mut bytes = [0u8; 8];
                self.rng.fill(&mut bytes[..]);
                return bytes.to_vec();
            }
            FieldFormat::Ascii => return text_bytes("0"),
        }
        buf
    }
}

fn text_bytes(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0x00);
    bytes
}

impl BusTransport for SimulatedTransport {
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), TransportError> {
        self.writes += 1;
        let body = data.strip_suffix(&[COMMAND_TERMINATOR]).unwrap_or(data);
        let command: String = body.iter().map(|&b| b as char).collect();
        tracing::trace!("sim write {:#04x}: {}", address, command);
        self.pending.insert(address, command);
        Ok(())
    }

    fn read(&mut self, address: u8, count: usize) -> Result<Vec<u8>, TransportError> {
        let command = self.pending.remove(&address);
        if !self.is_attached(address) {
            return Ok(vec![IDLE_FILL; count]);
        }
        Ok(match command {
            Some(command) => self.reply(&command, count),
            None => vec![IDLE_FILL; count],
        })
    }

    fn set_bitrate(&mut self, khz: u32) -> Result<u32, TransportError> {
        self.bitrate_khz = khz;
        Ok(khz)
    }

    fn set_pullups(&mut self, pullups: Pullups) -> Result<(), TransportError> {
        self.pullups = pullups;
        Ok(())
    }

    fn delay_ms(&mut self, ms: u64) {
        self.elapsed_ms += ms;
    }
}

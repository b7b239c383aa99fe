//! `scpi-tel`: decode SupMCU telemetry replies and run command scripts

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scpi_telemetry_core::command::{parse_address, script_lines};
use scpi_telemetry_core::config::ToolDefaults;
use scpi_telemetry_core::datalog::{header_row, TelemetryLog};
use scpi_telemetry_core::decode::{DecodeError, Decoder, SentinelSet};
use scpi_telemetry_core::registry::{CommandRegistry, RegistryBuilder};
use scpi_telemetry_core::report::{render_lines, render_unregistered, DisplayOptions};
use scpi_telemetry_core::session::{default_period_secs, QueryReply, Session, SessionSettings};
use scpi_telemetry_core::transport::{SimulatedTransport, TransportError};

#[derive(Debug, Parser)]
#[command(name = "scpi-tel", author, version, about)]
struct Cli {
    /// Command definition file (sizes and telemetry commands)
    #[arg(long, global = true)]
    commands: Option<PathBuf>,

    /// Tool configuration file (delays, addresses, default commands)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// `,ascii` replies carry no write flag or timestamp
    #[arg(long, global = true)]
    ascii_no_preamble: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a captured reply
    Decode {
        /// Registry key, e.g. "SUP:TEL? 4,data"
        command: String,
        /// Reply bytes in hex ("01 64 00", "0x01", "016400")
        #[arg(required = true)]
        bytes: Vec<String>,
        /// Decimal places for floats (1-12)
        #[arg(long)]
        dp: Option<u8>,
        /// Treat all-0x00 replies as device absent too
        #[arg(long)]
        dual_sentinel: bool,
        /// Print the decoded reply as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the read length for a command
    Length {
        /// Registry key
        command: String,
    },
    /// List device prefixes with registered commands
    Devices,
    /// Execute a command script once
    Run(RunArgs),
    /// Poll a command script and write a tab-delimited log
    Log {
        #[command(flatten)]
        run: RunArgs,
        /// Log file (default: timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of polling cycles
        #[arg(long, default_value_t = 10)]
        cycles: usize,
        /// Seconds between cycles (default: estimated cycle time plus slack)
        #[arg(long)]
        period: Option<u64>,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Newline-separated command file (default: configured default commands)
    script: Option<PathBuf>,
    /// Module address as 0xHH
    #[arg(long, conflicts_with = "device")]
    address: Option<String>,
    /// Module name from the address table
    #[arg(long, default_value = "PIM")]
    device: String,
    /// Inter-message delay (ms)
    #[arg(long)]
    delay: Option<u64>,
    /// Delay before reading `,ascii` replies (ms)
    #[arg(long)]
    ascii_delay: Option<u64>,
    /// Decimal places for floats (1-12)
    #[arg(long)]
    dp: Option<u8>,
    /// Use simulated modules instead of an adapter
    #[arg(long)]
    simulate: bool,
    /// Seed for the simulated modules
    #[arg(long)]
    seed: Option<u64>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_registry(cli: &Cli, defaults: &ToolDefaults) -> CommandRegistry {
    let mut builder = RegistryBuilder::with_defaults().ascii_without_preamble(cli.ascii_no_preamble);
    defaults.apply_to(&mut builder);
    if let Some(path) = &cli.commands {
        builder.import_xml(path);
    }
    builder.build()
}

fn load_defaults(cli: &Cli) -> ToolDefaults {
    match &cli.config {
        Some(path) => ToolDefaults::load(path),
        None => ToolDefaults::default(),
    }
}

/// Print every import problem once, before any command output
fn report_import_errors(registry: &CommandRegistry, defaults: &ToolDefaults) {
    for error in registry.errors() {
        eprintln!("{error}");
    }
    for error in defaults.errors() {
        eprintln!("{error}");
    }
}

/// Parse hex byte arguments: separate tokens, optional `0x`, or packed pairs
fn parse_hex_bytes(tokens: &[String]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in tokens.iter().flat_map(|t| t.split([' ', ','])) {
        let token = token.trim();
        let digits = token.strip_prefix("0x").unwrap_or(token);
        if digits.is_empty() {
            continue;
        }
        if !digits.is_ascii() {
            bail!("invalid hex byte '{token}'");
        }
        if digits.len() % 2 != 0 && digits.len() > 1 {
            bail!("odd number of hex digits in '{token}'");
        }
        for start in (0..digits.len()).step_by(2) {
            let pair = &digits[start..(start + 2).min(digits.len())];
            let byte = u8::from_str_radix(pair, 16)
                .with_context(|| format!("invalid hex byte '{pair}'"))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}

/// Decode a captured reply; commands missing from the registry keep their raw bytes
fn decode_reply(decoder: &Decoder<'_>, command: &str, raw: Vec<u8>) -> QueryReply {
    match decoder.decode(command, &raw) {
        Ok(decoded) => QueryReply::Decoded(decoded),
        Err(DecodeError::UnknownCommand(_)) => {
            tracing::warn!("*** Command \"{command}\" not found in dictionary ***");
            QueryReply::Unregistered(raw)
        }
    }
}

fn reply_lines(reply: &QueryReply, options: &DisplayOptions) -> Vec<String> {
    match reply {
        QueryReply::Decoded(decoded) => render_lines(decoded, options),
        QueryReply::Unregistered(raw) => vec![render_unregistered(raw)],
    }
}

fn read_script(args: &RunArgs, defaults: &ToolDefaults) -> Result<Vec<String>> {
    match &args.script {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script {}", path.display()))?;
            Ok(script_lines(&text))
        }
        None => Ok(defaults.commands.clone()),
    }
}

fn session_settings(args: &RunArgs, defaults: &ToolDefaults) -> Result<SessionSettings> {
    let address = match &args.address {
        Some(text) => parse_address(text)
            .with_context(|| format!("*** Invalid address '{text}', use 0xYY ***"))?,
        None => defaults
            .address_of(&args.device)
            .with_context(|| format!("Unknown device '{}'", args.device))?,
    };
    let mut settings = SessionSettings::from_defaults(defaults, address);
    if let Some(delay) = args.delay {
        settings.delay_ms = delay;
        settings.ascii_delay_ms = delay * 4;
    }
    if let Some(ascii_delay) = args.ascii_delay {
        settings.ascii_delay_ms = ascii_delay;
    }
    if let Some(dp) = args.dp {
        settings.display = DisplayOptions::new(dp);
    }
    Ok(settings)
}

fn transport(args: &RunArgs, registry: &CommandRegistry) -> Result<SimulatedTransport> {
    if !args.simulate {
        // no hardware adapter backend is built into this tool
        return Err(TransportError::NotPresent.into());
    }
    Ok(match args.seed {
        Some(seed) => SimulatedTransport::seeded(registry.clone(), seed),
        None => SimulatedTransport::new(registry.clone()),
    })
}

fn default_log_path() -> PathBuf {
    PathBuf::from(
        chrono::Local::now()
            .format("scpi_log_%Y%m%d_%H%M%S.csv")
            .to_string(),
    )
}

fn run(cli: &Cli) -> Result<()> {
    let defaults = load_defaults(cli);
    let registry = load_registry(cli, &defaults);
    report_import_errors(&registry, &defaults);
    tracing::debug!(
        "Loaded {} registry entries, {} known devices",
        registry.len(),
        defaults.addresses.len()
    );

    match &cli.command {
        Command::Decode {
            command,
            bytes,
            dp,
            dual_sentinel,
            json,
        } => {
            let raw = parse_hex_bytes(bytes)?;
            let mut decoder = Decoder::new(&registry);
            if *dual_sentinel {
                decoder = decoder.with_sentinels(SentinelSet::dual());
            }
            let reply = decode_reply(&decoder, command, raw);
            if *json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                let options = DisplayOptions::new(dp.unwrap_or(defaults.decimal_places));
                for line in reply_lines(&reply, &options) {
                    println!("{line}");
                }
            }
        }
        Command::Length { command } => {
            println!("{}", registry.expected_length(command));
        }
        Command::Devices => {
            for device in registry.list_devices() {
                match defaults.address_of(&device) {
                    Some(address) => println!("{device}\t{address:#04x}"),
                    None => println!("{device}"),
                }
            }
        }
        Command::Run(args) => {
            let commands = read_script(args, &defaults)?;
            let settings = session_settings(args, &defaults)?;
            let mut session = Session::new(&registry, transport(args, &registry)?, settings);

            println!("Starting communications\n");
            for command in &commands {
                let output = session.execute(command)?;
                for line in output.lines(&settings.display) {
                    println!("{line}");
                }
                println!();
            }
            println!("Communications finished");
        }
        Command::Log {
            run,
            output,
            cycles,
            period,
        } => {
            let commands = read_script(run, &defaults)?;
            let settings = session_settings(run, &defaults)?;
            let mut session = Session::new(&registry, transport(run, &registry)?, settings);

            let cycle_ms = session.estimate_cycle_ms(&commands);
            let period_secs = period.unwrap_or_else(|| default_period_secs(cycle_ms));

            let path = output.clone().unwrap_or_else(default_log_path);
            let mut log = TelemetryLog::create(&path, &header_row(&registry, &commands))
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            session.run_logging(&commands, &mut log, *cycles, period_secs * 1000)?;
            println!("Wrote {} rows to {}", log.rows_written(), display_name(&path));
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    run(&cli)
}

use crate::shared::acquire::{MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// CLI root definition. Every subcommand drives the same fix engine or one of its parts.
#[derive(Parser, Debug)]
#[command(name = "gps-fix-tracker", version)]
#[command(about = "GPS fix acquisition for a low-power tracker on a u-blox NMEA module")]
pub struct Cli {
    #[command(subcommand)]
    pub command: AppCommand,
}

// Subcommands map directly to one module each under src/commands/.
#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Acquire one position over a serial port and print the report
    Fix(FixArgs),
    /// Acquire a position periodically until Ctrl-C
    Track(TrackArgs),
    /// Enable a set of NMEA sentences on the module and disable all others
    Select(SelectArgs),
    /// Run a fix session against a recorded NMEA log, one line per second
    Replay(ReplayArgs),
    /// Decode and range-check every line of a file as a GGA sentence
    Decode(DecodeArgs),
}

fn timeout_in_range(raw: &str) -> Result<u32, String> {
    let secs: u32 = raw.parse().map_err(|_| format!("invalid timeout: {raw}"))?;
    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(format!(
            "timeout must be within {MIN_TIMEOUT_SECS}..={MAX_TIMEOUT_SECS} seconds"
        ));
    }
    Ok(secs)
}

// Accept decimal or 0x-prefixed hexadecimal.
fn parse_mask_bits(raw: &str) -> Result<u32, String> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse::<u32>(),
    };
    parsed.map_err(|_| format!("invalid sentence mask: {raw}"))
}

// One acquisition over a serial port.
#[derive(Args, Debug, Clone)]
pub struct FixArgs {
    #[arg(long, env = "GPS_SERIAL_PORT", default_value = "/dev/ttyACM0")]
    pub serial_port: String,
    #[arg(long, env = "GPS_BAUD_RATE", default_value_t = 9_600)]
    pub baud_rate: u32,
    #[arg(long, default_value_t = 250)]
    pub read_timeout_ms: u64,
    #[arg(long, default_value_t = 100)]
    pub command_gap_ms: u64,
    #[arg(long, default_value_t = 120, value_parser = timeout_in_range)]
    pub timeout_secs: u32,
    /// Abort once the reserve drops below this voltage
    #[arg(long, default_value_t = 0)]
    pub min_reserve_mv: u32,
    /// Fixed reserve voltage reported to the engine
    #[arg(long, conflicts_with = "reserve_file")]
    pub reserve_mv: Option<u32>,
    /// Text file re-read on every sample, holding the reserve voltage in mV
    #[arg(long)]
    pub reserve_file: Option<PathBuf>,
    /// Watchdog period; 0 disables it
    #[arg(long, default_value_t = 10)]
    pub watchdog_secs: u64,
    #[arg(long)]
    pub lock_file: Option<PathBuf>,
}

// Periodic reporting. Carries every fix field plus the reporting interval.
#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    #[arg(long, env = "GPS_SERIAL_PORT", default_value = "/dev/ttyACM0")]
    pub serial_port: String,
    #[arg(long, env = "GPS_BAUD_RATE", default_value_t = 9_600)]
    pub baud_rate: u32,
    #[arg(long, default_value_t = 250)]
    pub read_timeout_ms: u64,
    #[arg(long, default_value_t = 100)]
    pub command_gap_ms: u64,
    #[arg(long, default_value_t = 120, value_parser = timeout_in_range)]
    pub timeout_secs: u32,
    #[arg(long, default_value_t = 0)]
    pub min_reserve_mv: u32,
    #[arg(long, conflicts_with = "reserve_file")]
    pub reserve_mv: Option<u32>,
    #[arg(long)]
    pub reserve_file: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    pub watchdog_secs: u64,
    #[arg(long)]
    pub lock_file: Option<PathBuf>,
    /// Time between the start of two sessions
    #[arg(long, default_value_t = 600)]
    pub interval_secs: u64,
}

impl TrackArgs {
    // Build FixArgs from the shared fields so track mode reuses the fix setup.
    pub fn to_fix_args(&self) -> FixArgs {
        FixArgs {
            serial_port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            read_timeout_ms: self.read_timeout_ms,
            command_gap_ms: self.command_gap_ms,
            timeout_secs: self.timeout_secs,
            min_reserve_mv: self.min_reserve_mv,
            reserve_mv: self.reserve_mv,
            reserve_file: self.reserve_file.clone(),
            watchdog_secs: self.watchdog_secs,
            lock_file: self.lock_file.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    #[arg(long, env = "GPS_SERIAL_PORT", default_value = "/dev/ttyACM0")]
    pub serial_port: String,
    #[arg(long, env = "GPS_BAUD_RATE", default_value_t = 9_600)]
    pub baud_rate: u32,
    #[arg(long, default_value_t = 100)]
    pub command_gap_ms: u64,
    /// Comma-separated sentence names to enable, e.g. "GGA,RMC"
    #[arg(long, default_value = "GGA", conflicts_with = "mask")]
    pub sentences: String,
    /// Raw 18-bit enable mask, DTM in bit 0 through ZDA in bit 17
    #[arg(long, value_parser = parse_mask_bits)]
    pub mask: Option<u32>,
    #[arg(long)]
    pub lock_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// NMEA log, one line per simulated second; blank lines are silent seconds
    pub file: PathBuf,
    #[arg(long, default_value_t = 120, value_parser = timeout_in_range)]
    pub timeout_secs: u32,
    #[arg(long, default_value_t = 0)]
    pub min_reserve_mv: u32,
    /// Reserve voltage per simulated second, e.g. "3000,2400,1800"; the last value repeats
    #[arg(long, value_delimiter = ',')]
    pub reserve_mv: Vec<u32>,
    /// Print per-session counters after the report
    #[arg(long, default_value_t = false)]
    pub stats: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    pub file: PathBuf,
}

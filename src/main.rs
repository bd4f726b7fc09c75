//! Serial Capture
//!
//! Records the raw byte stream of a serial-connected device (a
//! microcontroller printing sensor readings, for example) to a file, for a
//! fixed duration or until stopped with Ctrl+C.
//!
//! # Features
//!
//! - **Verbatim capture**: bytes are written exactly as received, line by line
//! - **Bounded or unbounded windows**: `--duration` or Ctrl+C
//! - **Operator gate**: capture starts only after Enter is pressed (`--yes` skips it)
//! - **Capture profiles**: defaults can come from a TOML file
//! - **Port listing**: show the serial ports available on this host
//!
//! # Usage
//!
//! ```bash
//! # Capture 60 seconds at 115200 baud
//! serial-capture readings.txt -p /dev/ttyACM0 -b 115200 -d 60
//!
//! # Capture until Ctrl+C, settings from a profile
//! serial-capture readings.txt --config sensor.toml
//!
//! # List available serial ports
//! serial-capture --list-ports
//! ```

mod capture;
mod config;
mod serial;
mod signal;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use capture::{Immediate, PromptGate, StartGate};
use config::{CaptureConfig, CaptureOptions};
use serial::port::{parse_baud_rate, BaudRate};
use serial::SerialConnection;

/// Serial Capture
///
/// Pipe the output of a serial device into a file
#[derive(Parser, Debug)]
#[command(name = "serial-capture")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Capture the raw byte stream of a serial device to a file")]
struct Cli {
    /// Output file path (created or truncated)
    #[arg(required_unless_present = "list_ports")]
    output: Option<PathBuf>,

    /// Serial port path [default: /dev/ttyACM0, COM3 on Windows]
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, one of 300 600 1200 2400 4800 9600 14400 19200 28800 38400 57600 115200 [default: 9600]
    #[arg(short, long, value_parser = parse_baud_rate)]
    baud_rate: Option<BaudRate>,

    /// Serial port timeout in seconds; 0 keeps the 1 s read timeout [default: 0]
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Duration of the acquisition in seconds (unbounded if omitted)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Capture profile (TOML) supplying defaults for the options above
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start capturing without waiting for Enter
    #[arg(short = 'y', long)]
    yes: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> CaptureOptions {
        CaptureOptions {
            port: self.port.clone(),
            baud_rate: self.baud_rate.map(BaudRate::get),
            timeout: self.timeout,
            duration: self.duration,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_ports {
        return serial::port::print_ports();
    }

    let config = resolve_config(&cli)?;
    log::debug!("resolved configuration: {:?}", config);

    let mut gate: Box<dyn StartGate> = if cli.yes {
        Box::new(Immediate)
    } else {
        Box::new(PromptGate::terminal())
    };

    let summary = capture::acquire(
        &config,
        |port| SerialConnection::open(port.clone()),
        gate.as_mut(),
        signal::close_on_interrupt,
    )?;

    summary.print_report();
    Ok(())
}

/// Layer the command line over the optional profile and validate the result
fn resolve_config(cli: &Cli) -> Result<CaptureConfig> {
    let output = cli
        .output
        .clone()
        .ok_or_else(|| anyhow!("An output file path is required"))?;

    let profile = match cli.config {
        Some(ref path) => CaptureOptions::load(path)?,
        None => CaptureOptions::default(),
    };

    Ok(CaptureConfig::resolve(output, cli.options().or(profile))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::DurationBound;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["serial-capture", "out.txt"]).unwrap();
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.output, PathBuf::from("out.txt"));
        assert_eq!(config.port.port_path, config::DEFAULT_PORT);
        assert_eq!(config.port.baud_rate.get(), 9600);
        assert_eq!(config.duration, DurationBound::Unbounded);
        assert!(!cli.yes);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "serial-capture", "out.txt", "-p", "/dev/ttyUSB0", "-b", "115200", "-t", "0.5", "-d", "10",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.port.port_path, "/dev/ttyUSB0");
        assert_eq!(config.port.baud_rate.get(), 115200);
        assert_eq!(config.port.timeout, Duration::from_millis(500));
        assert_eq!(config.duration, DurationBound::Bounded(Duration::from_secs(10)));
    }

    #[test]
    fn test_invalid_baud_rejected_by_parser() {
        assert!(Cli::try_parse_from(["serial-capture", "out.txt", "--baud-rate", "250000"]).is_err());
        assert!(Cli::try_parse_from(["serial-capture", "out.txt", "-b", "fast"]).is_err());
    }

    #[test]
    fn test_output_required_unless_listing() {
        assert!(Cli::try_parse_from(["serial-capture"]).is_err());
        assert!(Cli::try_parse_from(["serial-capture", "--list-ports"]).is_ok());
    }

    #[test]
    fn test_invalid_profile_baud_leaves_no_file() {
        let dir = tempdir().unwrap();
        let profile = dir.path().join("capture.toml");
        std::fs::write(&profile, "baud_rate = 250000\n").unwrap();
        let output = dir.path().join("out.txt");

        let cli = Cli::try_parse_from([
            "serial-capture",
            output.to_str().unwrap(),
            "--config",
            profile.to_str().unwrap(),
            "--yes",
        ])
        .unwrap();

        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("unsupported baud rate 250000"));
        assert!(!output.exists());
    }

    #[test]
    fn test_command_line_beats_profile() {
        let dir = tempdir().unwrap();
        let profile = dir.path().join("capture.toml");
        std::fs::write(&profile, "port = \"/dev/ttyUSB3\"\nbaud_rate = 57600\nduration = 5.0\n").unwrap();

        let cli = Cli::try_parse_from([
            "serial-capture",
            "out.txt",
            "-b",
            "300",
            "-c",
            profile.to_str().unwrap(),
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.port.port_path, "/dev/ttyUSB3");
        assert_eq!(config.port.baud_rate.get(), 300);
        assert_eq!(config.duration, DurationBound::Bounded(Duration::from_secs(5)));
    }
}

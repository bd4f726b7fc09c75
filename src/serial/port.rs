//! Serial port configuration and connection management
//!
//! Opens the capture device with fixed 8N1 framing and lists the ports
//! available on the host.

use super::line::LineReader;
use super::{CloseHandle, LineSource};
use crate::config::ConfigError;
use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Read;
use std::time::Duration;

/// Standard baud rates accepted for a capture session
pub const STANDARD_BAUD_RATES: &[u32] = &[
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 28800, 38400, 57600, 115200,
];

/// Default baud rate for microcontroller serial output
pub const DEFAULT_BAUD: u32 = 9600;

/// A baud rate known to be one of [`STANDARD_BAUD_RATES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudRate(u32);

impl BaudRate {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(DEFAULT_BAUD)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = ConfigError;

    fn try_from(rate: u32) -> Result<Self, Self::Error> {
        if STANDARD_BAUD_RATES.contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(ConfigError::UnsupportedBaudRate(rate))
        }
    }
}

impl std::fmt::Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Command-line value parser for `--baud-rate`
pub fn parse_baud_rate(value: &str) -> Result<BaudRate, String> {
    let rate: u32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    BaudRate::try_from(rate).map_err(|e| e.to_string())
}

/// Configuration for serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 9600)
    pub baud_rate: BaudRate,
    /// Data bits (always 8)
    pub data_bits: DataBits,
    /// Parity (always none)
    pub parity: Parity,
    /// Stop bits (always 1)
    pub stop_bits: StopBits,
    /// Flow control (always none)
    pub flow_control: FlowControl,
    /// Read timeout, also the upper bound of one polling iteration
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from(crate::config::DEFAULT_PORT),
            baud_rate: BaudRate::default(),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: crate::config::DEFAULT_READ_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default 8N1 settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: BaudRate) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open serial port feeding a capture session.
///
/// On Unix the port is opened in exclusive mode, so no other process can
/// claim it while the connection lives.
pub struct SerialConnection<P = Box<dyn SerialPort>> {
    reader: LineReader<P>,
    port_path: String,
    handle: CloseHandle,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self> {
        let port = serialport::new(&config.port_path, config.baud_rate.get())
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .with_context(|| format!("Failed to open serial port: {}", config.port_path))?;

        debug!(
            "opened {} at {} baud, read timeout {:?}",
            config.port_path, config.baud_rate, config.timeout
        );

        Ok(Self::with_port(port, &config.port_path))
    }
}

impl<P: Read> SerialConnection<P> {
    /// Wrap an already open port
    pub fn with_port(port: P, port_path: &str) -> Self {
        Self {
            reader: LineReader::new(port),
            port_path: port_path.to_string(),
            handle: CloseHandle::new(),
        }
    }
}

impl<P: Read> LineSource for SerialConnection<P> {
    fn read_line(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        self.reader
            .read_line(out)
            .with_context(|| format!("Failed to read from serial port: {}", self.port_path))
    }

    fn drain_pending(&mut self, out: &mut Vec<u8>) -> usize {
        self.reader.drain_pending(out)
    }

    fn close_handle(&self) -> &CloseHandle {
        &self.handle
    }
}

/// USB identity of a port, when the OS reports one
#[derive(Debug, Clone, PartialEq)]
pub struct UsbDevice {
    pub vid: u16,
    pub pid: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// A serial port a capture could be pointed at
#[derive(Debug, Clone, PartialEq)]
pub struct PortEntry {
    pub path: String,
    pub usb: Option<UsbDevice>,
}

impl From<serialport::SerialPortInfo> for PortEntry {
    fn from(p: serialport::SerialPortInfo) -> Self {
        let usb = match p.port_type {
            serialport::SerialPortType::UsbPort(info) => Some(UsbDevice {
                vid: info.vid,
                pid: info.pid,
                manufacturer: info.manufacturer,
                product: info.product,
            }),
            _ => None,
        };
        Self {
            path: p.port_name,
            usb,
        }
    }
}

impl PortEntry {
    /// One-line description: path, then VID:PID and product for USB devices
    pub fn describe(&self) -> String {
        match self.usb {
            Some(ref usb) => {
                let mut line = format!("{}  {:04x}:{:04x}", self.path, usb.vid, usb.pid);
                if let Some(ref product) = usb.product {
                    line.push_str(&format!("  {}", product));
                }
                if let Some(ref mfg) = usb.manufacturer {
                    line.push_str(&format!(" ({})", mfg));
                }
                line
            }
            None => format!("{}  (not USB)", self.path),
        }
    }
}

/// USB ports first (microcontroller boards enumerate as USB), then by path
fn order_for_capture(ports: &mut [PortEntry]) {
    ports.sort_by(|a, b| {
        b.usb
            .is_some()
            .cmp(&a.usb.is_some())
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// List available serial ports, likely capture devices first
pub fn list_ports() -> Result<Vec<PortEntry>> {
    let ports = serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;
    let mut ports: Vec<PortEntry> = ports.into_iter().map(PortEntry::from).collect();
    order_for_capture(&mut ports);
    Ok(ports)
}

/// Print the ports a capture can read from, marking the default port
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("Connect the device, then check permissions on the port (e.g. the 'dialout' group).");
        return Ok(());
    }

    for port in &ports {
        let marker = if port.path == crate::config::DEFAULT_PORT {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!("{} {}", marker, port.describe());
    }
    println!(
        "\n{} marks the default port; pick another with {}",
        "*".green().bold(),
        "-p <PORT>".cyan()
    );

    Ok(())
}

//! Capture session: relays a serial byte stream into a file
//!
//! The output file receives exactly the bytes read from the connection, in
//! arrival order. A session ends when its duration bound is reached or its
//! connection is closed, whichever comes first.

pub mod gate;

pub use gate::{Immediate, PromptGate, StartGate};

use crate::config::{CaptureConfig, DurationBound};
use crate::serial::{CloseHandle, LineSource, PortConfig};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    ConnectionClosed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::DurationElapsed => write!(f, "duration elapsed"),
            StopReason::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub bytes: u64,
    pub lines: u64,
    pub stop: StopReason,
}

impl CaptureSummary {
    pub fn print_report(&self) {
        println!("\n{}", "=".repeat(60).dimmed());
        println!("{}", "--- Capture Summary ---".cyan().bold());
        println!("Started: {}", self.started_at.format("%Y-%m-%d %H:%M:%S%.3f"));
        println!("Stopped: {}", self.stop);
        println!("Lines written: {}", self.lines);
        println!("Bytes written: {}", self.bytes);
        println!("{}", "=".repeat(60).dimmed());
        println!("Logged {:.2} seconds of data.", self.elapsed.as_secs_f64());
    }
}

/// One acquisition window over an open source and sink
pub struct Session<S, W> {
    source: S,
    sink: W,
    bound: DurationBound,
}

impl<S: LineSource, W: Write> Session<S, W> {
    pub fn new(source: S, sink: W, bound: DurationBound) -> Self {
        Self { source, sink, bound }
    }

    /// Run the acquisition loop until the bound is reached or the source closes.
    ///
    /// The bound is only checked between reads, so a session may overrun it
    /// by up to one read timeout.
    pub fn run(mut self) -> Result<CaptureSummary> {
        let started_at = Local::now();
        let start = Instant::now();
        let mut line = Vec::new();
        let mut bytes = 0u64;
        let mut lines = 0u64;

        let stop = loop {
            if !self.source.is_open() {
                break StopReason::ConnectionClosed;
            }
            if self.bound.is_exceeded(start.elapsed()) {
                break StopReason::DurationElapsed;
            }

            line.clear();
            let len = self.source.read_line(&mut line)?;
            if len == 0 {
                continue;
            }

            self.sink
                .write_all(&line)
                .context("Failed to write to output file")?;
            self.sink.flush().context("Failed to flush output file")?;
            bytes += len as u64;
            lines += 1;
        };
        let elapsed = start.elapsed();

        // bytes already read from the device belong to the capture
        line.clear();
        let len = self.source.drain_pending(&mut line);
        if len > 0 {
            self.sink
                .write_all(&line)
                .context("Failed to write to output file")?;
            bytes += len as u64;
            lines += line.split_inclusive(|&b| b == b'\n').count() as u64;
            debug!("flushed {} buffered bytes after stop", len);
        }

        self.source.close();
        self.sink.flush().context("Failed to flush output file")?;
        debug!("session stopped: {} after {:?}", stop, elapsed);

        Ok(CaptureSummary {
            started_at,
            elapsed,
            bytes,
            lines,
            stop,
        })
    }
}

/// Run a full capture as configured.
///
/// Resources are acquired in a fixed order: the output file is created
/// first, then the source is opened, then the gate is waited on. A failure
/// at any step leaves the later steps untouched. `on_start` receives the
/// source's close handle once the gate has passed, just before the window
/// opens.
pub fn acquire<S, O, G, F>(
    config: &CaptureConfig,
    open_source: O,
    gate: &mut G,
    on_start: F,
) -> Result<CaptureSummary>
where
    S: LineSource,
    O: FnOnce(&PortConfig) -> Result<S>,
    G: StartGate + ?Sized,
    F: FnOnce(CloseHandle) -> Result<()>,
{
    let file = File::create(&config.output)
        .with_context(|| format!("Failed to create output file: {}", config.output.display()))?;
    debug!("created output file {}", config.output.display());

    let source = open_source(&config.port)?;
    println!(
        "{} Connected to {} at {} baud",
        "[OK]".green().bold(),
        config.port.port_path.white().bold(),
        config.port.baud_rate
    );

    gate.wait()?;
    on_start(source.close_handle().clone())?;

    println!(
        "{} Piping from {} to {}",
        "[*]".cyan().bold(),
        config.port.port_path.white(),
        config.output.display().to_string().white()
    );
    if config.duration == DurationBound::Unbounded {
        println!("{}", "Press Ctrl+C to stop.".yellow());
    }
    info!("capture window: {}", config.duration);
    debug!(
        "operator timeout {:?}, read timeout {:?}",
        config.user_timeout, config.port.timeout
    );

    Session::new(source, BufWriter::new(file), config.duration).run()
}

//! Ctrl+C handling
//!
//! An interrupt closes the capture connection instead of killing the
//! process, so the loop winds down and the summary still gets printed.

use crate::serial::CloseHandle;
use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, warn};
use std::thread;

#[cfg(unix)]
fn listen() -> std::io::Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
}

#[cfg(windows)]
fn listen() -> std::io::Result<tokio::signal::windows::CtrlC> {
    tokio::signal::windows::ctrl_c()
}

/// Close `handle` when the process receives Ctrl+C.
///
/// The listener is registered before this returns, so an interrupt arriving
/// right after is not lost. It is then awaited on a dedicated thread driving
/// a single-threaded tokio runtime.
pub fn close_on_interrupt(handle: CloseHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to build signal runtime")?;
    let mut listener = runtime
        .block_on(async { listen() })
        .with_context(|| "Failed to register Ctrl+C handler")?;

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || match runtime.block_on(listener.recv()) {
            Some(()) => {
                println!("\n{}", "Stopping capture...".yellow());
                handle.close();
            }
            None => warn!("Ctrl+C listener stopped before any interrupt"),
        })
        .with_context(|| "Failed to spawn signal thread")?;

    debug!("Ctrl+C closes the connection");
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::{Duration, Instant};

    #[test]
    fn test_interrupt_closes_handle() {
        let handle = CloseHandle::new();
        close_on_interrupt(handle.clone()).unwrap();
        assert!(handle.is_open());

        let status = Command::new("kill")
            .args(["-INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_open() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!handle.is_open());
    }
}

//! Serial input for capture sessions
//!
//! This module provides:
//! - Opening a serial port with validated 8N1 parameters
//! - Splitting the incoming byte stream into lines without altering it
//! - A shared close flag so an interrupt can end the session

pub mod line;
pub mod port;

pub use port::{PortConfig, SerialConnection};

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "connection is open" flag.
///
/// Clones refer to the same flag, so a clone handed to a signal watcher can
/// close the connection the capture loop is reading from.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    open: Arc<AtomicBool>,
}

impl CloseHandle {
    /// Create a handle in the open state
    pub fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A byte source the capture loop drains line by line
pub trait LineSource {
    /// Append the next line (or whatever arrived within one read timeout) to
    /// `out` and return how many bytes were appended.
    fn read_line(&mut self, out: &mut Vec<u8>) -> Result<usize>;

    /// Move bytes already taken from the device but not yet returned by
    /// [`read_line`](Self::read_line) into `out`. Called once the loop stops.
    fn drain_pending(&mut self, _out: &mut Vec<u8>) -> usize {
        0
    }

    /// The flag reporting whether this source is still open
    fn close_handle(&self) -> &CloseHandle;

    fn is_open(&self) -> bool {
        self.close_handle().is_open()
    }

    fn close(&mut self) {
        self.close_handle().close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_is_shared_between_clones() {
        let handle = CloseHandle::new();
        let watcher = handle.clone();
        assert!(handle.is_open());

        watcher.close();
        assert!(!handle.is_open());
    }
}

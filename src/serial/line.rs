//! Line splitting over a timed byte stream
//!
//! A read on the underlying stream blocks for at most its timeout, so each
//! call to [`LineReader::read_line`] is one bounded polling iteration.

use std::io::{self, ErrorKind, Read};

const CHUNK_SIZE: usize = 1024;

/// Splits a byte stream into `\n`-terminated lines without altering it.
///
/// Bytes are handed out exactly once and in arrival order; carriage
/// returns and invalid UTF-8 pass through untouched.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    chunk: Box<[u8]>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            chunk: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Append the next line to `out` and return its length.
    ///
    /// A line is everything up to and including the next `\n`. When no
    /// terminator arrives within one read, whatever is buffered is returned
    /// instead. Zero means nothing arrived before the read timed out.
    pub fn read_line(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        if let Some(len) = self.take_line(out) {
            return Ok(len);
        }

        match self.inner.read(&mut self.chunk) {
            Ok(n) => self.pending.extend_from_slice(&self.chunk[..n]),
            Err(e) if is_idle(&e) => {}
            Err(e) => return Err(e),
        }

        match self.take_line(out) {
            Some(len) => Ok(len),
            None => Ok(self.drain_pending(out)),
        }
    }

    /// Move every byte read from the stream but not yet handed out into `out`
    pub fn drain_pending(&mut self, out: &mut Vec<u8>) -> usize {
        let len = self.pending.len();
        out.append(&mut self.pending);
        len
    }

    fn take_line(&mut self, out: &mut Vec<u8>) -> Option<usize> {
        let end = self.pending.iter().position(|&b| b == b'\n')? + 1;
        out.extend(self.pending.drain(..end));
        Some(end)
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted reads, then times out forever
    struct ScriptedRead {
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedRead {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self { reads: reads.into() }
        }
    }

    impl Read for ScriptedRead {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    fn next_line<R: Read>(reader: &mut LineReader<R>) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        reader.read_line(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_splits_buffered_lines() {
        let mut reader = LineReader::new(ScriptedRead::new(vec![Ok(b"12\r\n34\r\n".to_vec())]));

        assert_eq!(next_line(&mut reader).unwrap(), b"12\r\n");
        assert_eq!(next_line(&mut reader).unwrap(), b"34\r\n");
        assert!(next_line(&mut reader).unwrap().is_empty());
    }

    #[test]
    fn test_partial_line_returned_after_timeout() {
        let mut reader = LineReader::new(ScriptedRead::new(vec![
            Ok(b"ab".to_vec()),
            Ok(b"c\nd".to_vec()),
        ]));

        assert_eq!(next_line(&mut reader).unwrap(), b"ab");
        assert_eq!(next_line(&mut reader).unwrap(), b"c\n");
        assert_eq!(next_line(&mut reader).unwrap(), b"d");
    }

    #[test]
    fn test_timeout_yields_nothing() {
        let mut reader = LineReader::new(ScriptedRead::new(vec![]));
        let mut out = b"kept".to_vec();
        assert_eq!(reader.read_line(&mut out).unwrap(), 0);
        assert_eq!(out, b"kept");
    }

    #[test]
    fn test_binary_bytes_pass_through() {
        let payload = vec![0x00, 0xff, 0xfe, b'\n', 0x80];
        let mut reader = LineReader::new(ScriptedRead::new(vec![Ok(payload.clone())]));

        let mut captured = Vec::new();
        while reader.read_line(&mut captured).unwrap() > 0 {}
        assert_eq!(captured, payload);
    }

    #[test]
    fn test_drain_pending_returns_unread_lines() {
        let mut reader = LineReader::new(ScriptedRead::new(vec![Ok(b"1,2\n3,4\n5,6\n".to_vec())]));

        assert_eq!(next_line(&mut reader).unwrap(), b"1,2\n");
        let mut rest = Vec::new();
        assert_eq!(reader.drain_pending(&mut rest), 8);
        assert_eq!(rest, b"3,4\n5,6\n");
        assert_eq!(reader.drain_pending(&mut rest), 0);
    }

    #[test]
    fn test_io_errors_propagate() {
        let mut reader = LineReader::new(ScriptedRead::new(vec![Err(io::Error::new(
            ErrorKind::BrokenPipe,
            "device unplugged",
        ))]));

        let err = next_line(&mut reader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }
}

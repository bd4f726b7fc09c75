//! Operator start gate
//!
//! The acquisition window does not open until the gate lets it through.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Stdout, Write};

/// Blocks until the capture may start
pub trait StartGate {
    fn wait(&mut self) -> Result<()>;
}

/// Prompts the operator and waits for one line of input
pub struct PromptGate<R, W> {
    input: R,
    output: W,
    message: String,
}

impl PromptGate<io::StdinLock<'static>, Stdout> {
    /// Prompt on the terminal
    pub fn terminal() -> Self {
        Self::new(io::stdin().lock(), io::stdout(), "Press Enter to start...")
    }
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W, message: &str) -> Self {
        Self {
            input,
            output,
            message: message.to_string(),
        }
    }
}

impl<R: BufRead, W: Write> StartGate for PromptGate<R, W> {
    fn wait(&mut self) -> Result<()> {
        write!(self.output, "{}", self.message)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read operator confirmation")?;
        if read == 0 {
            bail!("Input closed before the capture was started");
        }
        Ok(())
    }
}

/// Lets the capture start immediately (`--yes`)
pub struct Immediate;

impl StartGate for Immediate {
    fn wait(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prompt_waits_for_a_line() {
        let mut shown = Vec::new();
        let mut gate = PromptGate::new(Cursor::new(b"\n".to_vec()), &mut shown, "Ready? ");
        gate.wait().unwrap();
        assert_eq!(shown, b"Ready? ");
    }

    #[test]
    fn test_prompt_fails_on_closed_input() {
        let mut gate = PromptGate::new(Cursor::new(Vec::new()), io::sink(), "Ready? ");
        assert!(gate.wait().is_err());
    }
}

//! # Interactive Prompts
//!
//! Line-based questions over any reader/writer pair. Production wires this to
//! stdin/stderr, keeping stdout for command output; tests feed it a byte
//! buffer.
//!
//! Invalid answers are re-asked. End of input is an error, never a default.

use crate::error::CliError;
use std::io::{self, BufRead, Write};
use std::ops::RangeInclusive;

/// Asks questions on `output` and reads answers from `input`.
#[derive(Debug)]
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompter reading stdin and asking on stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    /// Create a prompter over an arbitrary reader and writer.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the writer, e.g. to inspect what was asked.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Print a line of guidance.
    pub fn say(&mut self, message: &str) -> Result<(), CliError> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    /// Ask once; an empty answer is returned as-is (trimmed).
    pub fn text(&mut self, label: &str) -> Result<String, CliError> {
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;
        self.read_answer()
    }

    /// Ask until the answer is non-empty.
    pub fn required_text(&mut self, label: &str) -> Result<String, CliError> {
        loop {
            let answer = self.text(label)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            self.say("A value is required.")?;
        }
    }

    /// Ask until the answer is an integer inside `range`.
    pub fn number(&mut self, label: &str, range: RangeInclusive<i64>) -> Result<i64, CliError> {
        loop {
            let answer = self.text(label)?;
            match answer.parse::<i64>() {
                Ok(value) if range.contains(&value) => return Ok(value),
                _ => self.say(&format!(
                    "Please enter a whole number between {} and {}.",
                    range.start(),
                    range.end()
                ))?,
            }
        }
    }

    /// Yes/no question. An empty answer picks `default`.
    pub fn confirm(&mut self, label: &str, default: bool) -> Result<bool, CliError> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self.text(&format!("{} [{}]", label, hint))?;
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n.")?,
            }
        }
    }

    fn read_answer(&mut self) -> Result<String, CliError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(CliError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input ended while waiting for an answer",
            )));
        }
        Ok(line.trim().to_string())
    }
}

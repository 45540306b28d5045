//! Interactive terminal I/O.
//!
//! Every prompt in the procedure goes through the `Terminal` trait so the
//! credential and locale loops can be driven by scripted answers in tests.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use crate::error::{OobeError, Result};
use crate::secret::Secret;

pub trait Terminal {
    /// Print `prompt` and read one line without its trailing newline.
    /// Returns `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Print `prompt` and read one line with echo disabled.
    /// Returns `None` at end of input.
    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<Secret>>;

    /// Print a message line.
    fn say(&mut self, message: &str);

    /// Block for `duration` (rate-limits password retries).
    fn pause(&mut self, duration: Duration);
}

/// Ask a question and return the answer, treating end of input as an abort.
pub fn ask(term: &mut dyn Terminal, prompt: &str) -> Result<String> {
    term.read_line(prompt)?.ok_or(OobeError::InputClosed)
}

/// Read a secret, treating end of input as an abort.
pub fn ask_secret(term: &mut dyn Terminal, prompt: &str) -> Result<Secret> {
    term.read_secret(prompt)?.ok_or(OobeError::InputClosed)
}

/// Yes only for a case-insensitive `y`; anything else is no.
pub fn confirm(term: &mut dyn Terminal, prompt: &str) -> Result<bool> {
    Ok(ask(term, prompt)?.trim().eq_ignore_ascii_case("y"))
}

/// `Terminal` on the process's stdin/stdout.
#[derive(Debug, Default)]
pub struct ConsoleTerminal;

impl Terminal for ConsoleTerminal {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<Secret>> {
        match rpassword::prompt_password(prompt) {
            Ok(value) => Ok(Some(Secret::new(value))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

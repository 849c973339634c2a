//! Terminal surfaces used by the CLI

use super::{DisplaySurface, InputSource, Notifier};
use std::io::{self, BufRead, Write};

/// Reads one line from stdin per call
///
/// Line endings are stripped. Use [`StdinInput::at_end`] to stop before
/// reading past the end of input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinInput;

impl StdinInput {
    /// True once stdin has no more data; blocks until it knows
    pub fn at_end(&self) -> bool {
        match io::stdin().lock().fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(_) => true,
        }
    }
}

impl InputSource for StdinInput {
    fn read(&self) -> String {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => line.trim_end_matches(['\r', '\n']).to_string(),
            Err(_) => String::new(),
        }
    }
}

/// Writes each result as a line on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDisplay;

impl DisplaySurface for ConsoleDisplay {
    fn write(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        // A closed stdout (e.g. `| head`) is not worth failing the run for
        let _ = writeln!(stdout, "{}", text);
        let _ = stdout.flush();
    }
}

/// Writes notifications to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

//! CLI console utilities

use colored::*;
use std::time::{Duration, Instant};

/// CLI console for formatted output
pub struct CLIConsole {
    verbose: bool,
}

impl CLIConsole {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Print an info message, only in verbose mode
    pub fn info(&self, message: &str) {
        if self.verbose {
            println!("{} {}", "ℹ".blue().bold(), message);
        }
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message.green());
    }

    pub fn warn(&self, message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    /// Print a section header
    pub fn print_header(&self, title: &str) {
        println!();
        println!("{} {}", "•".bold(), title.bold());
    }
}

/// Prints the time elapsed since creation when dropped
pub struct StopClock {
    label: String,
    color: Color,
    started: Instant,
}

impl StopClock {
    pub fn start(label: impl Into<String>, color: Color) -> Self {
        Self {
            label: label.into(),
            color,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for StopClock {
    fn drop(&mut self) {
        let line = format!("{} took {}", self.label, format_elapsed(self.elapsed()));
        println!("{}", line.color(self.color));
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed >= Duration::from_secs(1) {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

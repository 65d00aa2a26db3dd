//! CLI console utilities

use colored::*;
use slotkeeper_core::{NoticeLevel, Notifier};

/// CLI console for formatted output
#[derive(Debug, Clone, Copy)]
pub struct CliConsole {
    verbose: bool,
}

impl CliConsole {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a detail shown only with --verbose
    pub fn detail(&self, message: &str) {
        if self.verbose {
            println!("  {}", message.dimmed());
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

    pub fn print_header(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
        println!("{}", "=".repeat(title.len()).dimmed());
    }
}

/// Prints core notices to the terminal
pub struct ConsoleNotifier {
    console: CliConsole,
}

impl ConsoleNotifier {
    pub fn new(console: CliConsole) -> Self {
        Self { console }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => self.console.info(message),
            NoticeLevel::Success => self.console.success(message),
            NoticeLevel::Warning => self.console.warn(message),
            NoticeLevel::Error => self.console.error(message),
        }
    }
}

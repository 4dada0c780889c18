//! Styled terminal output for primesweep
//!
//! Results go to stdout; warnings and errors go to stderr so that piping
//! `--format json` output stays clean.

use console::style;

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("⚠").yellow(), message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    /// Print a verbose message (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Print a header/title
    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    /// Print a category header
    pub fn category(&self, category: &str) {
        if !self.quiet {
            println!("\n{}", style(category).bold().cyan());
        }
    }

    /// Print a key-value pair with consistent styling
    pub fn key_value(&self, key: &str, value: &str, highlight: bool) {
        if !self.quiet {
            let styled_value = if highlight {
                style(value).green().bold()
            } else {
                style(value).white()
            };
            println!("  {:<20} {}", style(key).dim(), styled_value);
        }
    }

    /// Print a table row with pre-padded cells
    pub fn table_row(&self, cells: &[String]) {
        if !self.quiet {
            println!("  {}", cells.join("  "));
        }
    }

    /// Print a dimmed table header followed by a separator
    pub fn table_header(&self, cells: &[String]) {
        if !self.quiet {
            let line = cells.join("  ");
            println!("  {}", style(&line).bold());
            println!("  {}", style("─".repeat(line.chars().count())).dim());
        }
    }

    /// Print blank line
    pub fn blank_line(&self) {
        if !self.quiet {
            println!();
        }
    }
}

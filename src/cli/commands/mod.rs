//! Command implementations for the primesweep CLI
//!
//! Each command lives in its own module with its clap `Args` struct next to
//! its `execute` function.

pub mod config;
pub mod count;
pub mod scale;
pub mod version;

/// How a command prints its result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Styled, human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON on stdout
    Json,
}

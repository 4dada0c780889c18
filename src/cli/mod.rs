//! Command-line interface for primesweep
//!
//! Parses arguments with clap, installs the tracing subscriber and dispatches to
//! the command implementations in [`commands`].

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod output;

pub use commands::OutputFormat;
pub use output::Output;

#[derive(Parser)]
#[command(
    name = "primesweep",
    version = env!("CARGO_PKG_VERSION"),
    about = "Count primes in [2, LIMIT) across a pool of worker threads",
    long_about = "primesweep counts the primes below a limit by trial division, splitting the \
                  range across worker threads with static, dynamic, guided or runtime \
                  scheduling. Settings come from primesweep.toml, PRIMESWEEP_* environment \
                  variables and the flags below, in increasing priority."
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count the primes below a limit
    Count(commands::count::CountArgs),
    /// Time every schedule across a ladder of worker counts
    Scale(commands::scale::ScaleArgs),
    /// Configuration management
    Config(commands::config::ConfigArgs),
    /// Show version information
    Version(commands::version::VersionArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);

        let output = Output::new(self.verbose > 0, self.quiet);
        let config = self.config.as_deref();

        match self.command {
            Some(Commands::Count(args)) => commands::count::execute(args, config, &output),
            Some(Commands::Scale(args)) => commands::scale::execute(args, config, &output),
            Some(Commands::Config(args)) => commands::config::execute(args, config, &output),
            Some(Commands::Version(args)) => commands::version::execute(args, &output),
            None => {
                // Show help when no command is provided
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // Logs share stderr with the progress bar; stdout carries results only
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_count_flags() {
        let cli = Cli::try_parse_from([
            "primesweep",
            "-vv",
            "count",
            "1000",
            "--workers",
            "4",
            "--schedule",
            "dynamic,50",
            "--accumulation",
            "atomic",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::Count(args)) => {
                assert_eq!(args.limit, Some(1000));
                assert_eq!(args.workers, Some(4));
                assert_eq!(args.schedule.map(|s| s.to_string()).as_deref(), Some("dynamic,50"));
                assert_eq!(args.format, OutputFormat::Json);
            }
            _ => panic!("expected the count command"),
        }
    }

    #[test]
    fn test_unknown_schedule_flag_rejected() {
        assert!(Cli::try_parse_from(["primesweep", "count", "100", "--schedule", "auto"]).is_err());
    }
}

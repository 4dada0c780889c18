use anyhow::Result;
use clap::Parser;

use primesweep::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}

use anyhow::Result;
use clap::Args;

use crate::cli::Output;

#[derive(Args)]
pub struct VersionArgs {
    /// Show detailed version information
    #[arg(short = 'd', long = "detailed")]
    pub detailed: bool,
}

pub fn execute(args: VersionArgs, output: &Output) -> Result<()> {
    println!("{} {}", crate::NAME, crate::VERSION);

    if args.detailed {
        output.category("Build Information");
        output.key_value("Rust edition:", "2024", false);
        output.key_value("Target:", std::env::consts::ARCH, false);
        output.key_value(
            "Profile:",
            if cfg!(debug_assertions) { "debug" } else { "release" },
            false,
        );
        output.key_value("Available cores:", &num_cpus::get().to_string(), false);
        output.key_value("Repository:", env!("CARGO_PKG_REPOSITORY"), false);
        output.key_value("License:", env!("CARGO_PKG_LICENSE"), false);
    }
    Ok(())
}

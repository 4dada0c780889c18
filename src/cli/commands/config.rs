use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::Output;
use crate::config::SweepConfig;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display the merged configuration as JSON
    Show,
    /// Check that the merged configuration is usable
    Validate,
}

pub fn execute(args: ConfigArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = SweepConfig::load(custom_config, None)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommand::Validate => {
            let config = SweepConfig::load(custom_config, None)?;
            let schedule = config.schedule();
            let workers = config.counter().requested_workers()?;

            output.success("Configuration is valid");
            output.key_value("Limit:", &config.limit.to_string(), false);
            output.key_value("Workers:", &workers.to_string(), false);
            output.key_value("Schedule:", &schedule.to_string(), false);
            output.key_value("Accumulation:", config.accumulation.label(), false);
        }
    }
    Ok(())
}

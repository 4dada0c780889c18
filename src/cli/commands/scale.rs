use anyhow::Result;
use clap::Args;

use super::OutputFormat;
use crate::cli::Output;
use crate::config::{ConfigOverrides, SweepConfig};
use crate::parallel::{Accumulation, Schedule};
use crate::report::{ScalingRow, ScalingStudy};

#[derive(Args)]
pub struct ScaleArgs {
    /// Exclusive upper bound; primes in [2, LIMIT) are counted
    pub limit: Option<u64>,

    /// Largest worker count in the ladder (default: the configured worker count)
    #[arg(short = 'm', long)]
    pub max_workers: Option<usize>,

    /// Schedule to compare; repeat for several (default: static, dynamic and guided)
    #[arg(short, long = "schedule", value_name = "KIND[,CHUNK]")]
    pub schedules: Vec<Schedule>,

    /// How per-worker hits are combined
    #[arg(short, long, value_enum)]
    pub accumulation: Option<Accumulation>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub fn execute(args: ScaleArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let overrides = ConfigOverrides {
        limit: args.limit,
        workers: args.max_workers,
        accumulation: args.accumulation,
        ..Default::default()
    };
    let config = SweepConfig::load(custom_config, Some(&overrides))?;
    let max_workers = config.counter().requested_workers()?;

    let study = ScalingStudy::new(config.limit, max_workers)?
        .with_schedules(args.schedules)
        .with_accumulation(config.accumulation);

    let text = args.format == OutputFormat::Text && !output.is_quiet();
    if text {
        output.header(&format!("📈 Scaling study over [2, {})", config.limit));
        output.info(&format!(
            "Worker counts: {}",
            study
                .worker_counts()
                .iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        output.blank_line();
        output.table_header(&table_cells(
            "schedule", "workers", "used", "primes", "seconds", "speedup", "efficiency",
        ));
    }

    let rows = study.run(|row| {
        if text {
            output.table_row(&row_cells(row));
        }
    })?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            if let Some(first) = rows.first() {
                output.blank_line();
                output.success(&format!(
                    "All {} runs agree on {} primes",
                    rows.len(),
                    first.count
                ));
            }
        }
    }

    Ok(())
}

fn table_cells(
    schedule: &str,
    workers: &str,
    used: &str,
    primes: &str,
    seconds: &str,
    speedup: &str,
    efficiency: &str,
) -> Vec<String> {
    vec![
        format!("{schedule:<14}"),
        format!("{workers:>7}"),
        format!("{used:>4}"),
        format!("{primes:>12}"),
        format!("{seconds:>9}"),
        format!("{speedup:>7}"),
        format!("{efficiency:>10}"),
    ]
}

fn row_cells(row: &ScalingRow) -> Vec<String> {
    table_cells(
        &row.schedule,
        &row.workers_requested.to_string(),
        &row.workers_used.to_string(),
        &row.count.to_string(),
        &format!("{:.3}", row.elapsed_seconds),
        &format!("{:.2}x", row.speedup),
        &format!("{:.0}%", row.efficiency * 100.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_cells_align_with_header() {
        let header = table_cells("schedule", "workers", "used", "primes", "seconds", "speedup", "efficiency");
        let row = row_cells(&ScalingRow {
            schedule: "dynamic,1000".to_string(),
            workers_requested: 4,
            workers_used: 4,
            count: 5_133,
            elapsed_seconds: 0.25,
            speedup: 3.0,
            efficiency: 0.75,
        });

        let widths = |cells: &[String]| cells.iter().map(|c| c.chars().count()).collect::<Vec<_>>();
        assert_eq!(widths(&header), widths(&row));
        assert_eq!(row[5].trim(), "3.00x");
        assert_eq!(row[6].trim(), "75%");
    }
}

//! Configuration management for primesweep
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Embedded `default-config.toml`
//! 2. `~/.config/primesweep/config.toml`
//! 3. `primesweep.{toml,json,yaml,yml}` in the working directory
//!    (replaced by the `--config` file when one is given)
//! 4. `PRIMESWEEP_*` environment variables
//! 5. Command-line flags
//!
//! The worker count therefore resolves as `--workers` > `PRIMESWEEP_WORKERS` >
//! config file `workers` > the platform default.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::parallel::{Accumulation, PrimeCounter, Schedule, SweepRange};

mod core;

pub use self::core::ENV_PREFIX;

/// Fully merged configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Upper bound of the swept range `[2, limit)`
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Requested worker count (unset = platform default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Percentage of CPU cores to use when `workers` is unset (1-100)
    #[serde(default = "default_thread_percentage")]
    pub thread_percentage: u8,

    /// Schedule label in `kind[,chunk]` form. Unknown labels fall back to `static`.
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Chunk size overriding the one in `schedule`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,

    #[serde(default)]
    pub accumulation: Accumulation,

    /// Limit of the untimed warm-up sweep
    #[serde(default = "default_warmup_limit")]
    pub warmup_limit: u64,
}

fn default_limit() -> u64 {
    400_000_000
}

fn default_thread_percentage() -> u8 {
    100
}

fn default_schedule() -> String {
    "runtime".to_string()
}

fn default_warmup_limit() -> u64 {
    1_000
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            workers: None,
            thread_percentage: default_thread_percentage(),
            schedule: default_schedule(),
            chunk_size: None,
            accumulation: Accumulation::default(),
            warmup_limit: default_warmup_limit(),
        }
    }
}

/// Values from the command line, merged on top of every other layer.
///
/// Unset fields are skipped so they never mask lower layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accumulation: Option<Accumulation>,
}

impl SweepConfig {
    /// Reject values the counter cannot run with
    pub fn validate(&self) -> Result<()> {
        SweepRange::new(self.limit)?;
        ensure!(self.workers != Some(0), "workers must be a positive integer");
        ensure!(
            (1..=100).contains(&self.thread_percentage),
            "thread_percentage must be between 1 and 100 (got {})",
            self.thread_percentage
        );
        ensure!(self.chunk_size != Some(0), "chunk_size must be a positive integer");
        ensure!(
            self.warmup_limit >= SweepRange::START,
            "warmup_limit must be an integer greater than 1 (got {})",
            self.warmup_limit
        );
        Ok(())
    }

    /// The schedule to run, with `chunk_size` applied
    pub fn schedule(&self) -> Schedule {
        let schedule = Schedule::parse_lenient(&self.schedule);
        match self.chunk_size {
            Some(chunk) => schedule.with_chunk_size(chunk),
            None => schedule,
        }
    }

    /// A counter configured from these settings
    pub fn counter(&self) -> PrimeCounter {
        PrimeCounter::new()
            .with_workers(self.workers)
            .with_thread_percentage(self.thread_percentage)
            .with_schedule(self.schedule())
            .with_accumulation(self.accumulation)
    }
}

//! # primesweep - parallel prime counting
//!
//! Counts the primes in `[2, limit)` by trial division, spreading the work over a
//! pool of scoped worker threads.
//!
//! ## Features
//!
//! - **Scheduling policies**: `static`, `dynamic`, `guided` and `runtime`, each with an
//!   optional chunk size
//! - **Accumulation strategies**: per-worker partial counts, or one shared atomic counter
//! - **Graceful degradation**: work for threads that cannot be spawned runs on the caller
//! - **Layered configuration**: defaults, config files, `PRIMESWEEP_*` variables and flags
//!
//! ## Quick Start
//!
//! ```bash
//! # Count the primes below one million with 8 workers and dynamic scheduling
//! primesweep count 1000000 --workers 8 --schedule dynamic,500
//!
//! # Compare schedules across worker counts
//! primesweep scale 10000000 --max-workers 8
//! ```
//!
//! ```rust
//! use primesweep::parallel::{count_primes_parallel, SchedulePolicy};
//!
//! let tally = count_primes_parallel(10_000, Some(4), SchedulePolicy::Dynamic)?;
//! assert_eq!(tally.count, 1_229);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod parallel;
pub mod primality;
pub mod report;

pub use cli::{Cli, Output};
pub use config::SweepConfig;
pub use parallel::{PrimeCounter, Schedule, SchedulePolicy, Tally, count_primes_parallel};
pub use primality::is_prime;

/// Result type alias for primesweep operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

//! Parallel range counter
//!
//! Sweeps `[2, limit)` with a fixed pool of scoped worker threads and merges the
//! per-worker partial counts into one total.
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Resource Discovery**: Detects available CPU cores using `num_cpus::get()`
//! - **Partitioning**: Splits the range into chunks according to a [`Schedule`]
//! - **Execution**: Runs workers on `crossbeam` scoped threads, with the calling thread
//!   acting as worker 0
//! - **Reduction**: Merges partial counts once per worker, or through one shared atomic
//!   counter when [`Accumulation::SharedAtomic`] is selected
//!
//! ## What This Module Does NOT Do:
//! - **Configuration lookup**: apart from the `runtime` schedule hook
//!   ([`ScheduleSource`]), every setting arrives as a typed value
//! - **Reporting**: timing and formatting live in [`crate::report`] and the CLI
//!
//! # Scheduling policies
//!
//! ```text
//! static   │████ w0 ████│████ w1 ████│████ w2 ████│████ w3 ████│  one block each
//! dynamic  │w0│w2│w1│w3│w0│w1│w2│w0│w3│w1│ ...                    claimed on demand
//! guided   │──── w0 ────│─ w2 ─│─ w1 ─│w3│w0│w2│...               shrinking claims
//! runtime  resolved from a ScheduleSource when the sweep starts
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use primesweep::parallel::{count_primes_parallel, SchedulePolicy};
//!
//! let tally = count_primes_parallel(100, Some(4), SchedulePolicy::Guided)?;
//! assert_eq!(tally.count, 25);
//! assert!(tally.workers_used <= 4);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod core;
pub mod partition;
pub mod progress;
pub mod schedule;

// Re-export main types for easier access
pub use self::core::{
    Accumulation, ExecutionStrategy, PrimeCounter, ProgressFn, Tally, count_primes_parallel,
};
pub use partition::{Chunk, ChunkQueue, SweepRange};
pub use progress::SweepProgress;
pub use schedule::{
    EnvScheduleSource, RUNTIME_SCHEDULE_ENV, Schedule, SchedulePolicy, ScheduleSource,
};

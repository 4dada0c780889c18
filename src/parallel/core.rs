use anyhow::{Result, anyhow, bail, ensure};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::partition::{Chunk, ChunkQueue, SweepRange, round_robin_chunks, static_block};
use super::schedule::{EnvScheduleSource, Schedule, SchedulePolicy, ScheduleSource};
use crate::primality;

/// Progress callback: `(integers_tested, integers_total, worker_id)`
pub type ProgressFn = dyn Fn(u64, u64, usize) + Send + Sync;

/// How per-worker hits are combined into the total
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Accumulation {
    /// Private running total per worker, merged once when the worker exits
    #[default]
    #[serde(rename = "local", alias = "local-reduce")]
    #[value(name = "local", alias = "local-reduce")]
    LocalReduce,
    /// Every hit increments one shared atomic counter
    #[serde(rename = "atomic", alias = "shared-atomic")]
    #[value(name = "atomic", alias = "shared-atomic")]
    SharedAtomic,
}

impl Accumulation {
    pub fn label(&self) -> &'static str {
        match self {
            Accumulation::LocalReduce => "local",
            Accumulation::SharedAtomic => "atomic",
        }
    }
}

/// Outcome of one counter invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Primes in `[2, limit)`
    pub count: u64,
    /// Threads that actually took part, the calling thread included
    pub workers_used: usize,
    /// Worker count asked for after defaults were applied
    pub workers_requested: usize,
    /// Schedule applied after `runtime` resolution
    pub schedule: Schedule,
}

/// Execution strategy for one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Pick a strategy for `range`, never creating more workers than there are
    /// integers to test.
    pub fn for_range(range: SweepRange, requested_workers: usize) -> Self {
        let workers = (requested_workers as u64).min(range.len().max(1)) as usize;
        if workers <= 1 {
            ExecutionStrategy::Sequential
        } else {
            ExecutionStrategy::Parallel { workers }
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    /// Calculate the default worker count from available cores.
    ///
    /// ```text
    /// 1. Detect available CPU cores: num_cpus::get()
    /// 2. Apply percentage: cores * thread_percentage / 100
    /// 3. Ensure minimum: max(1, result)
    /// ```
    pub fn calculate_optimal_workers(thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();
        std::cmp::max(1, (available_cores * thread_percentage as usize) / 100)
    }
}

/// How the range is handed to workers once the schedule is known
#[derive(Debug)]
enum Plan {
    /// Worker `i` sweeps block `i` of `parts`
    Blocks { parts: usize },
    /// Fixed-size chunks dealt round-robin
    RoundRobin { size: u64, workers: usize },
    /// Workers claim chunks until the queue is empty
    Queue(ChunkQueue),
}

impl Plan {
    fn new(schedule: Schedule, range: SweepRange, workers: usize) -> Self {
        // A zero chunk would never advance
        let chunk_size = schedule.chunk_size.filter(|&size| size > 0);
        match schedule.policy {
            SchedulePolicy::Static | SchedulePolicy::Runtime => match chunk_size {
                Some(size) => Plan::RoundRobin { size, workers },
                None => Plan::Blocks { parts: workers },
            },
            SchedulePolicy::Dynamic => Plan::Queue(ChunkQueue::dynamic(
                range,
                chunk_size.unwrap_or(Schedule::DEFAULT_DYNAMIC_CHUNK),
            )),
            SchedulePolicy::Guided => Plan::Queue(ChunkQueue::guided(
                range,
                workers,
                chunk_size.unwrap_or(Schedule::DEFAULT_GUIDED_MIN_CHUNK),
            )),
        }
    }
}

/// State shared by all workers of one invocation
struct Sweep<'a> {
    range: SweepRange,
    plan: Plan,
    accumulation: Accumulation,
    shared_hits: AtomicU64,
    tested: AtomicU64,
    progress: Option<&'a ProgressFn>,
    stop: Option<&'a AtomicBool>,
}

impl Sweep<'_> {
    fn stop_requested(&self) -> bool {
        self.stop.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run the share of work planned for `slot` and return its partial count.
    fn run_slot(&self, slot: usize, worker_id: usize) -> u64 {
        let mut partial = 0;
        match &self.plan {
            Plan::Blocks { parts } => {
                partial += self.process(static_block(self.range, *parts, slot), worker_id);
            }
            Plan::RoundRobin { size, workers } => {
                for chunk in round_robin_chunks(self.range, *size, *workers, slot) {
                    if self.stop_requested() {
                        break;
                    }
                    partial += self.process(chunk, worker_id);
                }
            }
            Plan::Queue(queue) => {
                while !self.stop_requested() {
                    let Some(chunk) = queue.claim() else {
                        break;
                    };
                    partial += self.process(chunk, worker_id);
                }
            }
        }
        tracing::trace!(worker_id, slot, partial, "worker share finished");
        partial
    }

    fn process(&self, chunk: Chunk, worker_id: usize) -> u64 {
        if chunk.is_empty() {
            return 0;
        }

        let found = match self.accumulation {
            Accumulation::LocalReduce => primality::count_in(chunk.start, chunk.end),
            Accumulation::SharedAtomic => {
                for n in chunk.start..chunk.end {
                    if primality::is_prime_u64(n) {
                        self.shared_hits.fetch_add(1, Ordering::Relaxed);
                    }
                }
                0
            }
        };

        let done = self.tested.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
        if let Some(report) = self.progress {
            report(done, self.range.len(), worker_id);
        }
        found
    }
}

/// Counts primes in `[2, limit)` on a pool of scoped worker threads.
///
/// ```rust
/// use primesweep::parallel::{PrimeCounter, Schedule, SchedulePolicy};
///
/// let tally = PrimeCounter::new()
///     .with_workers(4)
///     .with_schedule(Schedule::new(SchedulePolicy::Dynamic).with_chunk_size(16))
///     .count(100)
///     .unwrap();
/// assert_eq!(tally.count, 25);
/// ```
pub struct PrimeCounter {
    workers: Option<usize>,
    thread_percentage: u8,
    schedule: Schedule,
    accumulation: Accumulation,
    runtime_source: Box<dyn ScheduleSource + Send + Sync>,
    progress: Option<Arc<ProgressFn>>,
    stop: Option<Arc<AtomicBool>>,
    spawn_budget: Option<usize>,
}

impl Default for PrimeCounter {
    fn default() -> Self {
        Self {
            workers: None,
            thread_percentage: 100,
            schedule: Schedule::default(),
            accumulation: Accumulation::default(),
            runtime_source: Box::new(EnvScheduleSource::default()),
            progress: None,
            stop: None,
            spawn_budget: None,
        }
    }
}

impl PrimeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested worker count; `None` uses the platform default
    pub fn with_workers(mut self, workers: impl Into<Option<usize>>) -> Self {
        self.workers = workers.into();
        self
    }

    /// Share of the available cores used when no worker count is given (1-100)
    pub fn with_thread_percentage(mut self, thread_percentage: u8) -> Self {
        self.thread_percentage = thread_percentage;
        self
    }

    pub fn with_schedule(mut self, schedule: impl Into<Schedule>) -> Self {
        self.schedule = schedule.into();
        self
    }

    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    /// Where a `runtime` schedule is looked up. Defaults to [`EnvScheduleSource`].
    pub fn with_runtime_source(mut self, source: impl ScheduleSource + Send + Sync + 'static) -> Self {
        self.runtime_source = Box::new(source);
        self
    }

    /// Called after every completed chunk with `(tested, total, worker_id)`
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(u64, u64, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Cooperative stop flag, checked between chunk claims
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    #[cfg(test)]
    fn with_spawn_budget(mut self, budget: usize) -> Self {
        self.spawn_budget = Some(budget);
        self
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn accumulation(&self) -> Accumulation {
        self.accumulation
    }

    /// The schedule a sweep started now would apply, with `runtime` looked up
    pub fn resolved_schedule(&self) -> Schedule {
        self.schedule.resolve(self.runtime_source.as_ref())
    }

    /// Worker count this counter asks for, after applying the platform default
    pub fn requested_workers(&self) -> Result<usize> {
        match self.workers {
            Some(0) => bail!("worker count must be a positive integer"),
            Some(workers) => Ok(workers),
            None => {
                ensure!(
                    (1..=100).contains(&self.thread_percentage),
                    "thread percentage must be between 1 and 100 (got {})",
                    self.thread_percentage
                );
                Ok(ExecutionStrategy::calculate_optimal_workers(
                    self.thread_percentage,
                ))
            }
        }
    }

    /// Count the primes in `[2, limit)`.
    ///
    /// Blocks until every worker has finished and the partial counts are merged.
    pub fn count(&self, limit: u64) -> Result<Tally> {
        let range = SweepRange::new(limit)?;
        let workers_requested = self.requested_workers()?;
        let schedule = self.resolved_schedule();

        if range.is_empty() {
            tracing::debug!("range [2, {limit}) is empty, nothing to dispatch");
            return Ok(Tally {
                count: 0,
                workers_used: 1,
                workers_requested,
                schedule,
            });
        }

        let strategy = ExecutionStrategy::for_range(range, workers_requested);
        if strategy.workers() < workers_requested {
            tracing::info!(
                "range holds {} integers; using {} of {} requested workers",
                range.len(),
                strategy.workers(),
                workers_requested
            );
        }
        tracing::debug!(
            ?strategy,
            %schedule,
            accumulation = self.accumulation.label(),
            "dispatching sweep over [2, {limit})"
        );

        let sweep = Sweep {
            range,
            plan: Plan::new(schedule, range, strategy.workers()),
            accumulation: self.accumulation,
            shared_hits: AtomicU64::new(0),
            tested: AtomicU64::new(0),
            progress: self.progress.as_deref(),
            stop: self.stop.as_deref(),
        };

        let (partial, workers_used) = self.dispatch(&sweep, strategy.workers())?;

        let tested = sweep.tested.load(Ordering::Relaxed);
        if tested < range.len() {
            bail!(
                "sweep cancelled after testing {tested} of {} integers",
                range.len()
            );
        }

        Ok(Tally {
            count: partial + sweep.shared_hits.load(Ordering::Relaxed),
            workers_used,
            workers_requested,
            schedule,
        })
    }

    /// Spawn `workers - 1` helpers and run worker 0 on the calling thread.
    ///
    /// If a helper cannot be spawned no further spawns are attempted, and the calling
    /// thread also runs the shares planned for the missing workers.
    fn dispatch(&self, sweep: &Sweep<'_>, workers: usize) -> Result<(u64, usize)> {
        crossbeam::thread::scope(|s| -> Result<(u64, usize)> {
            let mut handles = Vec::with_capacity(workers.saturating_sub(1));

            for worker_id in 1..workers {
                let spawned = if self.spawn_budget.is_some_and(|budget| handles.len() >= budget) {
                    Err(std::io::Error::other("spawn budget exhausted"))
                } else {
                    s.builder()
                        .name(format!("primesweep-worker-{worker_id}"))
                        .spawn(move |_| sweep.run_slot(worker_id, worker_id))
                };

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        tracing::warn!(
                            "could not start worker {worker_id} ({e}); only {} of {workers} workers will run",
                            handles.len() + 1
                        );
                        break;
                    }
                }
            }

            let helpers = handles.len();
            let mut total = sweep.run_slot(0, 0);
            for orphan in helpers + 1..workers {
                total += sweep.run_slot(orphan, 0);
            }

            for handle in handles {
                total += handle
                    .join()
                    .map_err(|_| anyhow!("worker thread panicked during sweep"))?;
            }

            Ok((total, helpers + 1))
        })
        .map_err(|_| anyhow!("Thread panic occurred during parallel sweep"))?
    }
}

/// Convenience function: count with the default counter configuration
pub fn count_primes_parallel(
    limit: u64,
    requested_workers: Option<usize>,
    schedule: impl Into<Schedule>,
) -> Result<Tally> {
    PrimeCounter::new()
        .with_workers(requested_workers)
        .with_schedule(schedule)
        .count(limit)
}

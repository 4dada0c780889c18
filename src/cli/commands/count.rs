use anyhow::{Result, anyhow};
use clap::Args;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::OutputFormat;
use crate::cli::Output;
use crate::config::{ConfigOverrides, SweepConfig};
use crate::parallel::{Accumulation, Schedule, SchedulePolicy, SweepProgress, SweepRange};
use crate::report::{self, SweepReport};

#[derive(Args)]
pub struct CountArgs {
    /// Exclusive upper bound; primes in [2, LIMIT) are counted
    pub limit: Option<u64>,

    /// Number of worker threads, the calling thread included
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Percentage of CPU cores to use when --workers is not given
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub thread_percentage: Option<u8>,

    /// Scheduling policy as KIND[,CHUNK]: static, dynamic, guided or runtime
    #[arg(short, long, value_name = "KIND[,CHUNK]")]
    pub schedule: Option<Schedule>,

    /// Chunk size, overriding the one given with --schedule
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,

    /// How per-worker hits are combined
    #[arg(short, long, value_enum)]
    pub accumulation: Option<Accumulation>,

    /// Run a small untimed sweep first
    #[arg(long)]
    pub warmup: bool,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,

    /// Cancel the sweep after this many seconds. Only chunked and queue-based
    /// schedules stop early.
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub fn execute(args: CountArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let overrides = ConfigOverrides {
        limit: args.limit,
        workers: args.workers,
        thread_percentage: args.thread_percentage,
        schedule: args.schedule.map(|schedule| schedule.to_string()),
        chunk_size: args.chunk_size,
        accumulation: args.accumulation,
    };
    let config = SweepConfig::load(custom_config, Some(&overrides))?;
    let deadline = args
        .deadline
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|d| !d.is_zero())
                .ok_or_else(|| anyhow!("deadline must be a positive number of seconds (got {secs})"))
        })
        .transpose()?;

    let mut counter = config.counter();

    // `runtime` must be resolved first; it usually lands on unchunked static
    if deadline.is_some() && !can_stop_early(counter.resolved_schedule()) {
        output.warning("Static scheduling without a chunk size cannot stop before the deadline");
    }

    if args.warmup {
        output.verbose(&format!("Warming up on [2, {})", config.warmup_limit));
        let warm = counter.count(config.warmup_limit)?;
        tracing::debug!("warm-up found {} primes", warm.count);
    }

    let progress = if args.progress && !output.is_quiet() {
        let total = SweepRange::new(config.limit)?.len();
        let progress = SweepProgress::new(total, counter.requested_workers()?);
        counter = counter.with_progress(progress.callback());
        Some(progress)
    } else {
        None
    };

    let stop = Arc::new(AtomicBool::new(false));
    counter = counter.with_stop_flag(Arc::clone(&stop));
    let (done_tx, done_rx) = channel::bounded::<()>(0);

    let outcome = crossbeam::thread::scope(|scope| {
        if let Some(deadline) = deadline {
            let stop = Arc::clone(&stop);
            scope.spawn(move |_| watch_deadline(deadline, done_rx, &stop));
        }
        let outcome = report::sweep(&counter, config.limit);
        // Disconnecting wakes the watcher
        drop(done_tx);
        outcome
    })
    .map_err(|_| anyhow!("deadline watcher panicked"))?;

    let chunks_per_worker = progress.map(|progress| progress.finish());

    let report = match outcome {
        Ok(report) => report,
        Err(e) if stop.load(Ordering::Relaxed) => {
            let deadline = deadline.unwrap_or_default();
            return Err(e.context(format!("deadline of {deadline:?} reached")));
        }
        Err(e) => return Err(e),
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text if output.is_quiet() => println!("{}", report.count),
        OutputFormat::Text => print_report(&report, chunks_per_worker.as_deref(), output),
    }

    if report.is_degraded() {
        output.warning(&format!(
            "Ran with {} of {} requested workers",
            report.workers_used, report.workers_requested
        ));
    }

    Ok(())
}

/// Whether workers check the stop flag between chunks under `schedule`
fn can_stop_early(schedule: Schedule) -> bool {
    schedule.policy != SchedulePolicy::Static || schedule.chunk_size.is_some()
}

fn watch_deadline(deadline: Duration, done: Receiver<()>, stop: &AtomicBool) {
    if let Err(RecvTimeoutError::Timeout) = done.recv_timeout(deadline) {
        tracing::warn!("deadline of {deadline:?} reached, stopping workers");
        stop.store(true, Ordering::Relaxed);
    }
}

fn print_report(report: &SweepReport, chunks_per_worker: Option<&[usize]>, output: &Output) {
    output.header("🔢 Prime Count");
    output.key_value("Range:", &format!("[2, {})", report.limit), false);
    output.key_value("Primes:", &report.count.to_string(), true);

    output.category("Execution");
    output.key_value(
        "Workers:",
        &format!("{} used / {} requested", report.workers_used, report.workers_requested),
        false,
    );
    let schedule = if report.resolved_schedule.starts_with(report.schedule.label()) {
        report.resolved_schedule.clone()
    } else {
        format!("{} → {}", report.schedule, report.resolved_schedule)
    };
    output.key_value("Schedule:", &schedule, false);
    output.key_value("Accumulation:", report.accumulation.label(), false);
    output.key_value("Elapsed:", &format!("{:.3}s", report.elapsed_seconds), false);
    output.key_value(
        "Throughput:",
        &format!("{:.0} integers/s", report.throughput),
        false,
    );

    if let Some(chunks) = chunks_per_worker {
        let summary = chunks
            .iter()
            .enumerate()
            .map(|(id, count)| format!("worker-{id}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        output.verbose(&format!("Chunks completed per worker: {summary}"));
    }
    output.blank_line();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_can_stop_early() {
        assert!(!can_stop_early(Schedule::new(SchedulePolicy::Static)));
        assert!(can_stop_early(Schedule::new(SchedulePolicy::Static).with_chunk_size(64)));
        assert!(can_stop_early(Schedule::new(SchedulePolicy::Dynamic)));
        assert!(can_stop_early(Schedule::new(SchedulePolicy::Guided)));
    }

    #[test]
    fn test_watcher_exits_when_sweep_finishes() {
        let stop = AtomicBool::new(false);
        let (tx, rx) = channel::bounded::<()>(0);
        drop(tx);

        let start = Instant::now();
        watch_deadline(Duration::from_secs(30), rx, &stop);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_watcher_sets_stop_on_timeout() {
        let stop = AtomicBool::new(false);
        let (_tx, rx) = channel::bounded::<()>(0);

        watch_deadline(Duration::from_millis(10), rx, &stop);
        assert!(stop.load(Ordering::Relaxed));
    }
}

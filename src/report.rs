//! Execution reports
//!
//! Timing wraps the counter from the outside; the counter itself never looks at a
//! clock.

use anyhow::{Result, bail, ensure};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::parallel::{Accumulation, PrimeCounter, Schedule, SchedulePolicy, SweepRange, Tally};

/// Result of one timed sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub limit: u64,
    pub count: u64,
    pub workers_requested: usize,
    pub workers_used: usize,
    /// Policy as requested, `runtime` included
    pub schedule: SchedulePolicy,
    /// Schedule actually applied, in `kind[,chunk]` form
    pub resolved_schedule: String,
    pub accumulation: Accumulation,
    pub elapsed_seconds: f64,
    /// Integers tested per second
    pub throughput: f64,
}

impl SweepReport {
    pub fn new(
        limit: u64,
        requested: Schedule,
        accumulation: Accumulation,
        tally: Tally,
        elapsed: Duration,
    ) -> Self {
        let elapsed_seconds = elapsed.as_secs_f64();
        let tested = limit.saturating_sub(SweepRange::START) as f64;
        let throughput = if elapsed_seconds > 0.0 {
            tested / elapsed_seconds
        } else {
            0.0
        };

        Self {
            limit,
            count: tally.count,
            workers_requested: tally.workers_requested,
            workers_used: tally.workers_used,
            schedule: requested.policy,
            resolved_schedule: tally.schedule.to_string(),
            accumulation,
            elapsed_seconds,
            throughput,
        }
    }

    /// Fewer workers ran than were requested
    pub fn is_degraded(&self) -> bool {
        self.workers_used < self.workers_requested
    }
}

/// Run `counter` once and time it.
pub fn sweep(counter: &PrimeCounter, limit: u64) -> Result<SweepReport> {
    let start = Instant::now();
    let tally = counter.count(limit)?;
    let elapsed = start.elapsed();

    tracing::info!(
        count = tally.count,
        workers_used = tally.workers_used,
        "sweep of [2, {limit}) finished in {:.3}s",
        elapsed.as_secs_f64()
    );

    Ok(SweepReport::new(
        limit,
        counter.schedule(),
        counter.accumulation(),
        tally,
        elapsed,
    ))
}

/// One measurement of a scaling study
#[derive(Debug, Clone, Serialize)]
pub struct ScalingRow {
    pub schedule: String,
    pub workers_requested: usize,
    pub workers_used: usize,
    pub count: u64,
    pub elapsed_seconds: f64,
    /// Single-worker time of the same schedule divided by this time
    pub speedup: f64,
    /// Speedup per worker used
    pub efficiency: f64,
}

/// Repeats a sweep over a ladder of worker counts for each schedule.
#[derive(Debug, Clone)]
pub struct ScalingStudy {
    limit: u64,
    schedules: Vec<Schedule>,
    worker_counts: Vec<usize>,
    accumulation: Accumulation,
}

impl ScalingStudy {
    /// Worker counts 1, 2, 4, ... up to `max_workers`, which is always included.
    pub fn new(limit: u64, max_workers: usize) -> Result<Self> {
        SweepRange::new(limit)?;
        ensure!(max_workers >= 1, "maximum worker count must be a positive integer");

        Ok(Self {
            limit,
            schedules: vec![
                Schedule::new(SchedulePolicy::Static),
                Schedule::new(SchedulePolicy::Dynamic),
                Schedule::new(SchedulePolicy::Guided),
            ],
            worker_counts: Self::worker_ladder(max_workers),
            accumulation: Accumulation::default(),
        })
    }

    pub fn with_schedules(mut self, schedules: Vec<Schedule>) -> Self {
        if !schedules.is_empty() {
            self.schedules = schedules;
        }
        self
    }

    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    pub fn worker_counts(&self) -> &[usize] {
        &self.worker_counts
    }

    pub fn worker_ladder(max_workers: usize) -> Vec<usize> {
        let mut ladder: Vec<usize> = std::iter::successors(Some(1usize), |w| w.checked_mul(2))
            .take_while(|&w| w <= max_workers)
            .collect();
        if ladder.last() != Some(&max_workers) {
            ladder.push(max_workers);
        }
        ladder
    }

    /// Run every combination, calling `on_row` as each measurement completes.
    ///
    /// Every run must report the same count; a mismatch is an error.
    pub fn run(&self, mut on_row: impl FnMut(&ScalingRow)) -> Result<Vec<ScalingRow>> {
        let mut rows = Vec::with_capacity(self.schedules.len() * self.worker_counts.len());
        let mut expected: Option<u64> = None;

        for &schedule in &self.schedules {
            let mut baseline: Option<f64> = None;

            for &workers in &self.worker_counts {
                let counter = PrimeCounter::new()
                    .with_workers(workers)
                    .with_schedule(schedule)
                    .with_accumulation(self.accumulation);
                let report = sweep(&counter, self.limit)?;

                match expected {
                    Some(count) if count != report.count => bail!(
                        "count mismatch: {} with {} workers found {} primes, earlier runs found {}",
                        report.resolved_schedule,
                        workers,
                        report.count,
                        count
                    ),
                    _ => expected = Some(report.count),
                }

                let elapsed = report.elapsed_seconds;
                let base = *baseline.get_or_insert(elapsed);
                let speedup = if elapsed > 0.0 { base / elapsed } else { 1.0 };

                let row = ScalingRow {
                    schedule: report.resolved_schedule,
                    workers_requested: workers,
                    workers_used: report.workers_used,
                    count: report.count,
                    elapsed_seconds: elapsed,
                    speedup,
                    efficiency: speedup / report.workers_used as f64,
                };
                on_row(&row);
                rows.push(row);
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_report() {
        let counter = PrimeCounter::new()
            .with_workers(2)
            .with_schedule(SchedulePolicy::Guided);
        let report = sweep(&counter, 100).unwrap();

        assert_eq!(report.count, 25);
        assert_eq!(report.limit, 100);
        assert_eq!(report.schedule, SchedulePolicy::Guided);
        assert_eq!(report.resolved_schedule, "guided");
        assert!(report.elapsed_seconds >= 0.0);
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_report_serializes_labels() {
        let counter = PrimeCounter::new()
            .with_workers(1)
            .with_accumulation(Accumulation::SharedAtomic);
        let report = sweep(&counter, 10).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["count"], 4);
        assert_eq!(json["schedule"], "static");
        assert_eq!(json["accumulation"], "atomic");
        assert_eq!(json["workers_used"], 1);
    }

    #[test]
    fn test_zero_elapsed_throughput() {
        let tally = Tally {
            count: 0,
            workers_used: 1,
            workers_requested: 1,
            schedule: Schedule::default(),
        };
        let report = SweepReport::new(2, Schedule::default(), Accumulation::LocalReduce, tally, Duration::ZERO);
        assert_eq!(report.throughput, 0.0);
    }

    #[test]
    fn test_worker_ladder() {
        assert_eq!(ScalingStudy::worker_ladder(1), vec![1]);
        assert_eq!(ScalingStudy::worker_ladder(8), vec![1, 2, 4, 8]);
        assert_eq!(ScalingStudy::worker_ladder(6), vec![1, 2, 4, 6]);
    }

    #[test]
    fn test_scaling_study_rows() {
        let study = ScalingStudy::new(20_000, 4).unwrap();
        let mut seen = 0;
        let rows = study.run(|_| seen += 1).unwrap();

        assert_eq!(rows.len(), 9);
        assert_eq!(seen, 9);
        assert!(rows.iter().all(|row| row.count == 2_262));
        assert!(rows.iter().step_by(3).all(|row| row.workers_requested == 1));
    }

    #[test]
    fn test_scaling_study_rejects_bad_input() {
        assert!(ScalingStudy::new(1, 4).is_err());
        assert!(ScalingStudy::new(100, 0).is_err());
    }
}

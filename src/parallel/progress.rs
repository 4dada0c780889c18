use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live progress for one sweep with per-worker chunk counts
#[derive(Clone)]
pub struct SweepProgress {
    bar: ProgressBar,
    chunks_per_worker: Arc<Vec<AtomicUsize>>,
    update_every: u64,
    last_drawn: Arc<AtomicU64>,
}

impl SweepProgress {
    /// Progress bar drawn to stderr
    pub fn new(total: u64, workers: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "🔢 [{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {human_pos}/{human_len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        Self::with_bar(bar, total, workers)
    }

    /// Collects counts without drawing anything
    pub fn hidden(total: u64, workers: usize) -> Self {
        Self::with_bar(ProgressBar::hidden(), total, workers)
    }

    fn with_bar(bar: ProgressBar, total: u64, workers: usize) -> Self {
        let chunks_per_worker = (0..workers.max(1)).map(|_| AtomicUsize::new(0)).collect();
        Self {
            bar,
            chunks_per_worker: Arc::new(chunks_per_worker),
            // Roughly 200 redraws over the whole sweep
            update_every: (total / 200).max(1),
            last_drawn: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Callback for [`PrimeCounter::with_progress`](super::PrimeCounter::with_progress)
    pub fn callback(&self) -> impl Fn(u64, u64, usize) + Send + Sync + 'static {
        let progress = self.clone();
        move |done, total, worker_id| progress.record(done, total, worker_id)
    }

    fn record(&self, done: u64, total: u64, worker_id: usize) {
        if let Some(count) = self.chunks_per_worker.get(worker_id) {
            count.fetch_add(1, Ordering::Relaxed);
        }

        let last = self.last_drawn.load(Ordering::Relaxed);
        if done == total || done.saturating_sub(last) >= self.update_every {
            self.last_drawn.fetch_max(done, Ordering::Relaxed);
            self.bar.set_position(done);
            self.bar.set_message(format!("[worker-{worker_id}]"));
        }
    }

    /// Chunks completed by each worker so far
    pub fn chunks_per_worker(&self) -> Vec<usize> {
        self.chunks_per_worker
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect()
    }

    /// Clear the bar and return the per-worker chunk counts
    pub fn finish(&self) -> Vec<usize> {
        self.bar.finish_and_clear();
        self.chunks_per_worker()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{PrimeCounter, Schedule, SchedulePolicy};

    #[test]
    fn test_hidden_progress_counts_chunks() {
        let progress = SweepProgress::hidden(9_998, 4);
        let tally = PrimeCounter::new()
            .with_workers(4)
            .with_schedule(Schedule::new(SchedulePolicy::Dynamic).with_chunk_size(100))
            .with_progress(progress.callback())
            .count(10_000)
            .unwrap();
        assert_eq!(tally.count, 1_229);

        let chunks = progress.finish();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.iter().sum::<usize>(), 100);
    }

    #[test]
    fn test_unknown_worker_is_ignored() {
        let progress = SweepProgress::hidden(10, 1);
        let callback = progress.callback();
        callback(5, 10, 7);
        callback(10, 10, 0);
        assert_eq!(progress.chunks_per_worker(), vec![1]);
    }
}

use anyhow::{Result, ensure};
use std::sync::atomic::{AtomicU64, Ordering};

/// The half-open range `[2, limit)` swept for primes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRange {
    end: u64,
}

impl SweepRange {
    pub const START: u64 = 2;

    /// Validate `limit` before any work is dispatched.
    pub fn new(limit: u64) -> Result<Self> {
        ensure!(
            limit >= Self::START,
            "invalid range: limit must be an integer greater than 1 (got {limit})"
        );
        Ok(Self { end: limit })
    }

    pub fn start(&self) -> u64 {
        Self::START
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of integers tested
    pub fn len(&self) -> u64 {
        self.end - Self::START
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A contiguous slice `[start, end)` of the range handed out as one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: u64,
    pub end: u64,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Block `index` of `parts` near-equal blocks. The first `len % parts` blocks carry
/// one extra integer.
pub fn static_block(range: SweepRange, parts: usize, index: usize) -> Chunk {
    debug_assert!(parts > 0 && index < parts);
    let parts = parts as u64;
    let index = index as u64;
    let base = range.len() / parts;
    let extra = range.len() % parts;

    let start = range.start() + index * base + index.min(extra);
    let size = base + u64::from(index < extra);
    Chunk {
        start,
        end: start + size,
    }
}

/// All blocks of a static split, in order
pub fn static_blocks(range: SweepRange, parts: usize) -> Vec<Chunk> {
    (0..parts).map(|index| static_block(range, parts, index)).collect()
}

/// Chunks of `size` dealt round-robin: chunk `k` belongs to worker `k % workers`.
pub fn round_robin_chunks(
    range: SweepRange,
    size: u64,
    workers: usize,
    worker: usize,
) -> impl Iterator<Item = Chunk> {
    debug_assert!(size > 0 && workers > 0);
    let end = range.end();
    let first = range.start().checked_add(worker as u64 * size);
    let stride = (workers as u64).saturating_mul(size);

    std::iter::successors(first, move |&start| start.checked_add(stride))
        .take_while(move |&start| start < end)
        .map(move |start| Chunk {
            start,
            end: start.saturating_add(size).min(end),
        })
}

#[derive(Debug, Clone, Copy)]
enum ChunkSizing {
    Fixed(u64),
    Guided { workers: u64, min: u64 },
}

/// Shared queue of chunks for the `dynamic` and `guided` policies.
///
/// The queue is an atomic cursor over the range. A claim advances the cursor with a
/// compare-and-swap, so every integer lands in exactly one claimed chunk.
#[derive(Debug)]
pub struct ChunkQueue {
    next: AtomicU64,
    end: u64,
    sizing: ChunkSizing,
}

impl ChunkQueue {
    /// Every claim takes `chunk_size` integers (the last one may be shorter).
    pub fn dynamic(range: SweepRange, chunk_size: u64) -> Self {
        Self {
            next: AtomicU64::new(range.start()),
            end: range.end(),
            sizing: ChunkSizing::Fixed(chunk_size.max(1)),
        }
    }

    /// Each claim takes `ceil(remaining / workers)` integers, never fewer than
    /// `min_chunk` unless that is all that is left.
    pub fn guided(range: SweepRange, workers: usize, min_chunk: u64) -> Self {
        Self {
            next: AtomicU64::new(range.start()),
            end: range.end(),
            sizing: ChunkSizing::Guided {
                workers: workers.max(1) as u64,
                min: min_chunk.max(1),
            },
        }
    }

    fn size_for(&self, remaining: u64) -> u64 {
        let size = match self.sizing {
            ChunkSizing::Fixed(size) => size,
            ChunkSizing::Guided { workers, min } => remaining.div_ceil(workers).max(min),
        };
        size.min(remaining)
    }

    /// Claim the next unclaimed chunk, or `None` once the range is exhausted.
    pub fn claim(&self) -> Option<Chunk> {
        // Chunks are disjoint index ranges; nothing else is published through the
        // cursor, so relaxed ordering is enough.
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            if current >= self.end {
                return None;
            }
            let stop = current + self.size_for(self.end - current);
            match self.next.compare_exchange_weak(
                current,
                stop,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(Chunk {
                        start: current,
                        end: stop,
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Integers not yet claimed
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.next.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn assert_exact_cover(range: SweepRange, mut chunks: Vec<Chunk>) {
        chunks.sort_by_key(|c| c.start);
        let mut cursor = range.start();
        for chunk in &chunks {
            assert_eq!(chunk.start, cursor, "gap or overlap at {cursor}");
            assert!(chunk.end >= chunk.start);
            cursor = chunk.end;
        }
        assert_eq!(cursor, range.end());
    }

    #[test]
    fn test_range_validation() {
        assert!(SweepRange::new(0).is_err());
        assert!(SweepRange::new(1).is_err());
        let empty = SweepRange::new(2).unwrap();
        assert!(empty.is_empty());
        assert_eq!(SweepRange::new(100).unwrap().len(), 98);
    }

    #[test]
    fn test_static_blocks_are_balanced() {
        let range = SweepRange::new(1_000_003).unwrap();
        for parts in [1, 2, 3, 7, 8, 64] {
            let blocks = static_blocks(range, parts);
            let sizes: Vec<u64> = blocks.iter().map(Chunk::len).collect();
            let max = *sizes.iter().max().unwrap();
            let min = *sizes.iter().min().unwrap();
            assert!(max - min <= 1, "parts={parts}: {sizes:?}");
            assert_exact_cover(range, blocks);
        }
    }

    #[test]
    fn test_static_blocks_with_more_parts_than_items() {
        let range = SweepRange::new(5).unwrap();
        let blocks = static_blocks(range, 8);
        assert_eq!(blocks.iter().filter(|b| !b.is_empty()).count(), 3);
        assert_exact_cover(range, blocks);
    }

    #[test]
    fn test_round_robin_covers_range() {
        let range = SweepRange::new(1_000).unwrap();
        let workers = 3;
        let chunks: Vec<Chunk> = (0..workers)
            .flat_map(|w| round_robin_chunks(range, 64, workers, w))
            .collect();
        assert_exact_cover(range, chunks);

        let first: Vec<Chunk> = round_robin_chunks(range, 64, workers, 1).take(2).collect();
        assert_eq!(first[0], Chunk { start: 66, end: 130 });
        assert_eq!(first[1], Chunk { start: 258, end: 322 });
    }

    #[test]
    fn test_round_robin_near_u64_max() {
        let range = SweepRange::new(u64::MAX).unwrap();
        let last = round_robin_chunks(range, u64::MAX / 2, 2, 1).last().unwrap();
        assert_eq!(last.end, u64::MAX);
    }

    #[test]
    fn test_dynamic_queue_claims() {
        let range = SweepRange::new(25).unwrap();
        let queue = ChunkQueue::dynamic(range, 10);
        assert_eq!(queue.claim(), Some(Chunk { start: 2, end: 12 }));
        assert_eq!(queue.claim(), Some(Chunk { start: 12, end: 22 }));
        assert_eq!(queue.claim(), Some(Chunk { start: 22, end: 25 }));
        assert_eq!(queue.claim(), None);
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_guided_chunks_shrink() {
        let range = SweepRange::new(10_002).unwrap();
        let queue = ChunkQueue::guided(range, 4, 16);
        let mut sizes = Vec::new();
        let mut chunks = Vec::new();
        while let Some(chunk) = queue.claim() {
            sizes.push(chunk.len());
            chunks.push(chunk);
        }
        assert_eq!(sizes[0], 2_500);
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]), "{sizes:?}");
        // Only the final claim may go below the minimum
        assert!(sizes[..sizes.len() - 1].iter().all(|&s| s >= 16));
        assert_exact_cover(range, chunks);
    }

    #[test]
    fn test_concurrent_claims_are_disjoint() {
        let range = SweepRange::new(200_000).unwrap();
        for queue in [ChunkQueue::dynamic(range, 7), ChunkQueue::guided(range, 8, 3)] {
            let claimed = Mutex::new(Vec::new());
            crossbeam::thread::scope(|s| {
                for _ in 0..8 {
                    s.spawn(|_| {
                        let mut local = Vec::new();
                        while let Some(chunk) = queue.claim() {
                            local.push(chunk);
                        }
                        claimed.lock().unwrap().extend(local);
                    });
                }
            })
            .unwrap();
            assert_exact_cover(range, claimed.into_inner().unwrap());
        }
    }
}

//! Fixed-bucket latency histogram.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free histogram over microsecond durations.
///
/// Each bucket counts observations at or below its boundary that did not fit
/// an earlier bucket; values above the last boundary land in the last bucket.
pub struct Histogram {
    /// Bucket boundaries in microseconds, ascending.
    buckets: Vec<u64>,
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Histogram with boundaries suited to migration steps.
    ///
    /// Buckets: 1ms, 10ms, 100ms, 500ms, 1s, 5s, 30s, 1m, 5m
    pub fn step_latency() -> Self {
        Self::with_buckets(vec![
            1_000,
            10_000,
            100_000,
            500_000,
            1_000_000,
            5_000_000,
            30_000_000,
            60_000_000,
            300_000_000,
        ])
    }

    /// Histogram with custom ascending boundaries.
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Record a value in microseconds.
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value_us, Ordering::Relaxed);

        let idx = self
            .buckets
            .iter()
            .position(|&boundary| value_us <= boundary)
            .unwrap_or_else(|| self.buckets.len().saturating_sub(1));
        if let Some(bucket) = self.counts.get(idx) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total count of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observed values.
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Maximum observed value.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Average value, zero when empty.
    pub fn avg(&self) -> u64 {
        match self.count() {
            0 => 0,
            n => self.sum() / n,
        }
    }

    /// Approximate percentile (0.99 for P99): the upper boundary of the
    /// bucket holding the target rank.
    pub fn percentile(&self, p: f64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }

        let target = (total as f64 * p).ceil() as u64;
        let mut cumulative = 0u64;
        for (boundary, count) in self.buckets.iter().zip(&self.counts) {
            cumulative += count.load(Ordering::Relaxed);
            if cumulative >= target {
                return *boundary;
            }
        }
        self.buckets.last().copied().unwrap_or(0)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    /// `(boundary, count)` pairs for every bucket.
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.buckets
            .iter()
            .zip(&self.counts)
            .map(|(&boundary, count)| (boundary, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::step_latency()
    }
}

use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::Mutex;

// ─── Configuration ───────────────────────────────────────────────

/// Observations older than this no longer contribute to quantiles
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Number of overlapping windows the max age is split into
pub const DEFAULT_AGE_BUCKETS: usize = 5;

/// Values are stored in microseconds, 0 → 24 h
const HIST_HIGH_MICROS: u64 = 24 * 60 * 60 * 1_000_000;

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// A quantile to report together with its tolerated error
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub quantile: f64,
    pub error: f64,
}

impl Objective {
    pub const fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }
}

/// 0.5, 0.9 and 0.95 within 0.01; 0.99 within 0.001
pub const DEFAULT_OBJECTIVES: [Objective; 4] = [
    Objective::new(0.5, 0.01),
    Objective::new(0.9, 0.01),
    Objective::new(0.95, 0.01),
    Objective::new(0.99, 0.001),
];

/// Point-in-time view of a [`DecayingSummary`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    /// `(quantile, value)` per objective; `NaN` when the window is empty
    pub quantiles: Vec<(f64, f64)>,

    /// Sum of every observation since creation
    pub sum: f64,

    /// Number of observations since creation
    pub count: u64,
}

// ─── Summary ─────────────────────────────────────────────────────

/// Thread-safe, time-decaying quantile estimator.
///
/// Every observation goes into all age buckets. The head bucket is the one
/// that has been accumulating longest and answers quantile queries; once it is
/// `max_age` old it is cleared and the next bucket becomes the head. Quantiles
/// therefore cover between `max_age - max_age / age_buckets` and `max_age` of
/// history. `sum` and `count` never decay.
pub struct DecayingSummary {
    objectives: Vec<Objective>,
    bucket_width: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    buckets: Vec<AgeBucket>,
    head: usize,
    head_expires: Instant,
    sum: f64,
    count: u64,
}

impl DecayingSummary {
    pub fn new(objectives: &[Objective], max_age: Duration, age_buckets: usize) -> Self {
        Self::new_at(objectives, max_age, age_buckets, Instant::now())
    }

    /// Create a summary whose first rotation is measured from `now`.
    pub fn new_at(
        objectives: &[Objective],
        max_age: Duration,
        age_buckets: usize,
        now: Instant,
    ) -> Self {
        let age_buckets = age_buckets.max(1);
        let bucket_width = max_age / age_buckets as u32;
        let sigfig = significant_figures(objectives);

        let buckets = (0..age_buckets).map(|_| AgeBucket::new(sigfig)).collect();

        Self {
            objectives: objectives.to_vec(),
            bucket_width,
            inner: Mutex::new(Inner {
                buckets,
                head: 0,
                head_expires: now + bucket_width,
                sum: 0.0,
                count: 0,
            }),
        }
    }

    /// Record a value in seconds.
    pub fn observe(&self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    pub fn observe_at(&self, value: f64, now: Instant) {
        let mut inner = self.inner.lock();
        inner.rotate(now, self.bucket_width);

        let micros = to_micros(value);
        for bucket in &mut inner.buckets {
            bucket.record(micros);
        }

        inner.sum += value;
        inner.count += 1;
    }

    pub fn snapshot(&self) -> SummarySnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> SummarySnapshot {
        let mut inner = self.inner.lock();
        inner.rotate(now, self.bucket_width);

        let head = &inner.buckets[inner.head];
        let quantiles = self
            .objectives
            .iter()
            .map(|objective| {
                let value = match head.value_at_quantile(objective.quantile) {
                    Some(micros) => micros as f64 / MICROS_PER_SEC,
                    None => f64::NAN,
                };
                (objective.quantile, value)
            })
            .collect();

        SummarySnapshot {
            quantiles,
            sum: inner.sum,
            count: inner.count,
        }
    }
}

/// One overlapping window of observations.
struct AgeBucket {
    histogram: Histogram<u64>,

    /// Exact extremes, `None` while empty
    range: Option<(u64, u64)>,
}

impl AgeBucket {
    fn new(sigfig: u8) -> Self {
        Self {
            histogram: Histogram::new_with_max(HIST_HIGH_MICROS, sigfig)
                .expect("histogram bounds are valid for 1-5 significant figures"),
            range: None,
        }
    }

    fn record(&mut self, micros: u64) {
        self.histogram.saturating_record(micros);
        self.range = Some(match self.range {
            Some((min, max)) => (min.min(micros), max.max(micros)),
            None => (micros, micros),
        });
    }

    /// Histogram estimate kept inside the observed range, since the
    /// histogram reports the top of a value's bucket.
    fn value_at_quantile(&self, quantile: f64) -> Option<u64> {
        let (min, max) = self.range?;
        Some(self.histogram.value_at_quantile(quantile).clamp(min, max))
    }

    fn reset(&mut self) {
        self.histogram.reset();
        self.range = None;
    }
}

impl Inner {
    fn rotate(&mut self, now: Instant, bucket_width: Duration) {
        if now < self.head_expires {
            return;
        }

        let window = bucket_width * self.buckets.len() as u32;
        if now.duration_since(self.head_expires) >= window {
            // idle for longer than the whole window, nothing survives
            self.buckets.iter_mut().for_each(|bucket| bucket.reset());
            self.head_expires = now + bucket_width;
            return;
        }

        while now >= self.head_expires {
            self.buckets[self.head].reset();
            self.head = (self.head + 1) % self.buckets.len();
            self.head_expires += bucket_width;
        }
    }
}

/// Relative value precision needed to stay within the tightest objective error.
fn significant_figures(objectives: &[Objective]) -> u8 {
    let tightest = objectives
        .iter()
        .map(|objective| objective.error)
        .filter(|error| *error > 0.0)
        .fold(0.01, f64::min);

    (-tightest.log10() - 1e-9).ceil().clamp(1.0, 5.0) as u8
}

fn to_micros(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * MICROS_PER_SEC).round() as u64
    } else {
        0
    }
}

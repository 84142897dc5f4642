//! Aggregates folded from client results
//!
//! The metrics server keeps exactly two aggregates and no individual results:
//!
//! - a cumulative counter of failed requests across all clients
//! - a decaying summary of masquerade delays (0.5, 0.9, 0.95, 0.99 over the last hour)
//!
//! A [`ResultAggregator`] is created once at startup and shared by all request
//! handlers; it is safe to update from any number of tasks at once. Each
//! aggregator owns its own registry, so several can live in one process.

pub mod family;
pub mod summary;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus::{Counter, Encoder, Registry, TextEncoder};

use crate::ProbeResult;

use family::SummaryCollector;
use summary::{
    DEFAULT_AGE_BUCKETS, DEFAULT_MAX_AGE, DEFAULT_OBJECTIVES, DecayingSummary, SummarySnapshot,
};

pub const FAILED_REQUESTS_NAME: &str = "egw_scale_test_failed_requests_total";

pub const FAILED_REQUESTS_HELP: &str =
    "The total number of failed requests a client made when trying to access the external target";

pub const MASQUERADE_DELAY_NAME: &str = "egw_scale_test_masquerade_delay_seconds";

pub const MASQUERADE_DELAY_HELP: &str =
    "The number of seconds between a client pod starting and hitting the external target";

/// Current value of both aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSnapshot {
    pub failed_requests_total: u64,
    pub masquerade_delay: SummarySnapshot,
}

/// Failure counter plus masquerade delay summary
pub struct ResultAggregator {
    registry: Registry,
    failed_requests: Counter,
    masquerade_delay: Arc<DecayingSummary>,

    /// Held while a result is folded in and while both aggregates are read
    update: Mutex<()>,
}

impl ResultAggregator {
    pub fn new() -> prometheus::Result<Self> {
        Self::with_max_age(DEFAULT_MAX_AGE)
    }

    pub fn with_max_age(max_age: Duration) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let failed_requests = Counter::new(FAILED_REQUESTS_NAME, FAILED_REQUESTS_HELP)?;
        registry.register(Box::new(failed_requests.clone()))?;

        let masquerade_delay = Arc::new(DecayingSummary::new(
            &DEFAULT_OBJECTIVES,
            max_age,
            DEFAULT_AGE_BUCKETS,
        ));
        registry.register(Box::new(SummaryCollector::new(
            MASQUERADE_DELAY_NAME,
            MASQUERADE_DELAY_HELP,
            masquerade_delay.clone(),
        )?))?;

        Ok(Self {
            registry,
            failed_requests,
            masquerade_delay,
            update: Mutex::new(()),
        })
    }

    /// Fold one result into both aggregates.
    ///
    /// Readers never see one aggregate updated without the other.
    pub fn record(&self, result: &ProbeResult) {
        let _guard = self.update.lock();
        // float accumulation saturates instead of wrapping
        self.failed_requests.inc_by(result.num_failed_requests as f64);
        self.masquerade_delay.observe(result.masquerade_delay_seconds);
    }

    /// Counter value, saturating at `u64::MAX`.
    pub fn failed_requests_total(&self) -> u64 {
        self.failed_requests.get() as u64
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        let _guard = self.update.lock();
        AggregateSnapshot {
            failed_requests_total: self.failed_requests_total(),
            masquerade_delay: self.masquerade_delay.snapshot(),
        }
    }

    /// Content type of [`ResultAggregator::render`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Render both aggregates in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let families = {
            let _guard = self.update.lock();
            self.registry.gather()
        };

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

//! Shared state passed to the metrics server handlers

use std::sync::Arc;

use crate::metrics::ResultAggregator;

/// Cheap to clone; every clone points at the same aggregator
#[derive(Clone)]
pub struct CollectorState {
    pub aggregator: Arc<ResultAggregator>,
}

impl CollectorState {
    pub fn new(aggregator: Arc<ResultAggregator>) -> Self {
        Self { aggregator }
    }
}

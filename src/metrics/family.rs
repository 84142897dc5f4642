//! Registry adapter for [`DecayingSummary`]

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::{Metric, MetricFamily, MetricType, Quantile, Summary};

use super::summary::DecayingSummary;

/// Exposes a shared [`DecayingSummary`] as a single summary family.
pub struct SummaryCollector {
    desc: Desc,
    summary: Arc<DecayingSummary>,
}

impl SummaryCollector {
    pub fn new(
        name: &str,
        help: &str,
        summary: Arc<DecayingSummary>,
    ) -> prometheus::Result<Self> {
        let desc = Desc::new(name.to_string(), help.to_string(), vec![], HashMap::new())?;
        Ok(Self { desc, summary })
    }
}

impl Collector for SummaryCollector {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.summary.snapshot();

        let mut summary = Summary::default();
        summary.set_sample_count(snapshot.count);
        summary.set_sample_sum(snapshot.sum);
        for (quantile, value) in snapshot.quantiles {
            let mut sample = Quantile::default();
            sample.set_quantile(quantile);
            sample.set_value(value);
            summary.mut_quantile().push(sample);
        }

        let mut metric = Metric::default();
        metric.set_summary(summary);

        let mut family = MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        family.mut_metric().push(metric);

        vec![family]
    }
}

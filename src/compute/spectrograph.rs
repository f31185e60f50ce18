use indexmap::IndexMap;

use crate::color::{make_color_scales, BLUE_TO_PURPLE};
use crate::compute::accumulator::{FoldContext, TotalsStep};
use crate::compute::chart::{HistogramBucket, SpectrographSummary};
use crate::query::group_key;

/// Histogram totals per group, summarized for the totals table.
#[derive(Debug)]
pub struct SpectrographAccumulator {
    min: Option<f64>,
    max: Option<f64>,
    groups_to_values: IndexMap<String, Vec<Option<Vec<HistogramBucket>>>>,
}

impl SpectrographAccumulator {
    pub fn new(_ctx: &FoldContext<'_>) -> Self {
        Self {
            min: None,
            max: None,
            groups_to_values: IndexMap::new(),
        }
    }

    pub fn accumulate(mut self, ctx: &FoldContext<'_>, step: &TotalsStep<'_>) -> Self {
        let Some(mut buckets) = step.value(ctx.agg_index).and_then(HistogramBucket::parse_list) else {
            return self;
        };
        buckets.truncate(ctx.options.max_heatmap_buckets);

        for bucket in &buckets {
            if bucket.count == 0.0 {
                continue;
            }
            self.min = Some(self.min.map_or(bucket.count, |min| min.min(bucket.count)));
            self.max = Some(self.max.map_or(bucket.count, |max| max.max(bucket.count)));
        }

        let key = group_key(step.entry_group, ctx.group_by);
        let per_query = self
            .groups_to_values
            .entry(key)
            .or_insert_with(|| vec![None; ctx.query_count]);
        per_query[step.query_index] = Some(buckets);

        self
    }

    pub fn summarize(self, ctx: &FoldContext<'_>) -> SpectrographSummary {
        SpectrographSummary {
            aggregation: ctx.aggregation.clone(),
            color_scales: make_color_scales(self.min, self.max, BLUE_TO_PURPLE),
            default_color: BLUE_TO_PURPLE[BLUE_TO_PURPLE.len() - 1].to_string(),
            groups_to_values: self.groups_to_values,
        }
    }
}

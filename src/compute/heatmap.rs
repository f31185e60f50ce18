use indexmap::IndexMap;
use tracing::warn;

use crate::color::{make_color_scales, BLUE_TO_PURPLE};
use crate::compute::accumulator::{FoldContext, IntervalStep};
use crate::compute::chart::{ChartData, ChartInfo, HeatMapChart, HistogramBucket, ValueRange};
use crate::query::group_key;

/// Histogram over time: per group, a `[interval][bucket]` grid of counts.
///
/// Only the primary query is drawn. The `""` group holds the sum of all groups.
#[derive(Debug)]
pub struct HeatMapAccumulator {
    bucket_count: usize,
    group_series: IndexMap<String, Vec<Vec<f64>>>,
    group_meta: IndexMap<String, ValueRange>,
    labels: Vec<i64>,
    buckets: Vec<HistogramBucket>,
    alerts: Option<Vec<String>>,
    empty: bool,
}

impl HeatMapAccumulator {
    /// `None` unless the aggregation's argument is a bucket count.
    pub fn new(ctx: &FoldContext<'_>) -> Option<Self> {
        let requested = ctx.aggregation.numeric_argument()?;
        let bucket_count = (requested.max(0.0).trunc() as usize).min(ctx.options.max_heatmap_buckets);

        let alerts = if bucket_count as f64 == requested {
            None
        } else {
            let shown = if bucket_count == 1 {
                "one bucket".to_string()
            } else {
                format!("{} buckets", bucket_count)
            };
            let alert = format!("{} is shown with only {}.", ctx.title(), shown);
            warn!("{}", alert);
            Some(vec![alert])
        };

        let mut group_series = IndexMap::new();
        group_series.insert(String::new(), empty_grid(ctx.interval_count, bucket_count));

        Some(Self {
            bucket_count,
            group_series,
            group_meta: IndexMap::new(),
            labels: Vec::with_capacity(ctx.interval_count),
            buckets: Vec::new(),
            alerts,
            empty: true,
        })
    }

    pub fn accumulate(mut self, ctx: &FoldContext<'_>, step: &IntervalStep<'_>) -> Self {
        if step.query_index != 0 {
            return self;
        }
        self.labels.push(step.time);

        for entry_group in step.interval.groups() {
            let Some(agg) = entry_group.aggregation(ctx.agg_index) else {
                continue;
            };
            let Some(values) = HistogramBucket::parse_list(&agg.value) else {
                continue;
            };
            self.empty = false;
            let key = group_key(entry_group, ctx.group_by);

            for (position, bucket) in values.iter().enumerate().take(self.bucket_count) {
                self.add(&key, ctx, step.interval_index, position, bucket.count);
                if !key.is_empty() {
                    self.add("", ctx, step.interval_index, position, bucket.count);
                }
            }

            if self.buckets.is_empty() {
                self.buckets = values.into_iter().take(self.bucket_count).collect();
            }
        }

        self
    }

    fn add(&mut self, key: &str, ctx: &FoldContext<'_>, interval: usize, position: usize, count: f64) {
        let bucket_count = self.bucket_count;
        let series = self
            .group_series
            .entry(key.to_string())
            .or_insert_with(|| empty_grid(ctx.interval_count, bucket_count));

        let cell = &mut series[interval][position];
        *cell += count;
        let value = *cell;

        // Zeros render blank, so they never enter the range.
        if value == 0.0 {
            return;
        }
        self.group_meta
            .entry(key.to_string())
            .and_modify(|meta| {
                meta.min = meta.min.min(value);
                meta.max = meta.max.max(value);
            })
            .or_insert(ValueRange { min: value, max: value });
    }

    pub fn chart(self, ctx: &FoldContext<'_>) -> ChartInfo {
        // Groups that only ever saw zeros get the blank bucket alone.
        let group_color_scales = self
            .group_series
            .keys()
            .map(|key| {
                let meta = self.group_meta.get(key);
                (
                    key.clone(),
                    make_color_scales(meta.map(|m| m.min), meta.map(|m| m.max), BLUE_TO_PURPLE),
                )
            })
            .collect();

        ChartInfo {
            id: ctx.chart_id(),
            aggregation: ctx.aggregation.clone(),
            title: ctx.title(),
            empty: ctx.is_empty(self.empty),
            alerts: self.alerts,
            chart: ChartData::HeatMap(HeatMapChart {
                group_color_scales,
                group_series: self.group_series,
                group_meta: self.group_meta,
                labels: self.labels,
                buckets: self.buckets,
            }),
        }
    }
}

fn empty_grid(intervals: usize, buckets: usize) -> Vec<Vec<f64>> {
    vec![vec![0.0; buckets]; intervals]
}

use indexmap::IndexMap;

use crate::compute::accumulator::{FoldContext, IntervalStep};
use crate::compute::chart::{ChartData, ChartInfo, LineChart, LineSeries};
use crate::query::group_key;

/// Per group, per query, one point per interval.
pub(crate) type SeriesData = IndexMap<String, Vec<Vec<Option<f64>>>>;

/// Time series for scalar ops (count, avg, sum, ...).
#[derive(Debug)]
pub struct LineAccumulator {
    times: Vec<i64>,
    series_data: SeriesData,
    empty_value: Option<f64>,
    empty: bool,
    min: Option<f64>,
    max: Option<f64>,
}

impl LineAccumulator {
    pub fn new(ctx: &FoldContext<'_>) -> Self {
        Self {
            times: Vec::with_capacity(ctx.interval_count),
            series_data: SeriesData::new(),
            empty_value: ctx.display_null.empty_value(&ctx.aggregation.op),
            empty: true,
            min: None,
            max: None,
        }
    }

    pub fn accumulate(mut self, ctx: &FoldContext<'_>, step: &IntervalStep<'_>) -> Self {
        if step.query_index == 0 {
            self.times.push(step.time);
        }

        for entry_group in step.interval.groups() {
            let Some(agg) = entry_group.aggregation(ctx.agg_index) else {
                continue;
            };
            if !agg.value.is_null() {
                self.empty = false;
            }

            let key = group_key(entry_group, ctx.group_by);
            if !ctx.colors.contains_key(&key) {
                continue;
            }

            let empty_value = self.empty_value;
            let series = self
                .series_data
                .entry(key)
                .or_insert_with(|| vec![vec![empty_value; ctx.interval_count]; ctx.query_count]);

            let point = agg.value.as_f64();
            if let Some(value) = point {
                self.min = Some(self.min.map_or(value, |min| min.min(value)));
                self.max = Some(self.max.map_or(value, |max| max.max(value)));
            }
            series[step.query_index][step.interval_index] = point.or(empty_value);
        }

        self
    }

    pub fn chart(self, ctx: &FoldContext<'_>) -> ChartInfo {
        let (series, against_series) = split_series(self.series_data, ctx);

        ChartInfo {
            id: ctx.chart_id(),
            aggregation: ctx.aggregation.clone(),
            title: ctx.title(),
            empty: ctx.is_empty(self.empty),
            alerts: None,
            chart: ChartData::Line(LineChart {
                times: self.times,
                series,
                against_series,
                min: self.min,
                max: self.max,
            }),
        }
    }
}

/// Primary query lines first, comparison lines dashed.
pub(crate) fn split_series(series_data: SeriesData, ctx: &FoldContext<'_>) -> (Vec<LineSeries>, Vec<LineSeries>) {
    let mut series = Vec::new();
    let mut against_series = Vec::new();

    for (key, per_query) in series_data {
        let color = ctx.colors.get(&key).map(|colors| colors.dark.clone());

        for (query_index, data) in per_query.into_iter().enumerate() {
            let line = LineSeries {
                name: key.clone(),
                color: color.clone(),
                dashed: query_index != 0,
                data,
            };
            if query_index == 0 {
                series.push(line);
            } else {
                against_series.push(line);
            }
        }
    }

    (series, against_series)
}

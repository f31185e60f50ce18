use serde_json::Value;

use crate::color::{generate_color_contrast, PURPLE};
use crate::compute::accumulator::{FoldContext, IntervalStep};
use crate::compute::chart::{BarSeries, ChartData, ChartInfo, LineChart, LineSeries, PercentilesChart};
use crate::compute::line::{split_series, SeriesData};
use crate::format::format_percentile;
use crate::query::{group_key, DisplayNull};

/// How much lighter comparison lines are drawn than the primary bars.
const AGAINST_LIGHTEN_RATIO: f64 = 0.3;

/// A percentile value may come back as a list or, for a single percentile, a scalar.
fn percentile_values(value: &Value) -> Vec<Option<f64>> {
    match value {
        Value::Array(items) => items.iter().map(Value::as_f64).collect(),
        other => vec![other.as_f64()],
    }
}

/// Ungrouped percentiles: stacked bars for the primary query, dashed lines for comparisons.
#[derive(Debug)]
pub struct PercentilesAccumulator {
    percentiles: Vec<f64>,
    /// `[query][percentile][interval]`
    series_data: Vec<Vec<Vec<Option<f64>>>>,
    times: Vec<i64>,
    max: Option<f64>,
    empty: bool,
}

impl PercentilesAccumulator {
    pub fn new(ctx: &FoldContext<'_>) -> Option<Self> {
        let percentiles = ctx.aggregation.percentiles()?;
        let series_data = vec![vec![vec![None; ctx.interval_count]; percentiles.len()]; ctx.query_count];

        Some(Self {
            percentiles,
            series_data,
            times: Vec::with_capacity(ctx.interval_count),
            max: None,
            empty: true,
        })
    }

    pub fn accumulate(mut self, ctx: &FoldContext<'_>, step: &IntervalStep<'_>) -> Self {
        if step.query_index == 0 {
            self.times.push(step.time);
        }

        // Without grouping there is a single group per interval.
        let Some(agg) = step
            .interval
            .groups()
            .first()
            .and_then(|group| group.aggregation(ctx.agg_index))
        else {
            return self;
        };
        if agg.value.is_null() {
            return self;
        }

        self.empty = false;
        let per_percentile = &mut self.series_data[step.query_index];

        for (index, value) in percentile_values(&agg.value).into_iter().enumerate() {
            let Some(slot) = per_percentile.get_mut(index) else {
                break;
            };
            slot[step.interval_index] = value;
            if let Some(value) = value {
                self.max = Some(self.max.map_or(value, |max| max.max(value)));
            }
        }

        self
    }

    pub fn chart(self, ctx: &FoldContext<'_>) -> ChartInfo {
        let mut bars = Vec::new();
        let mut lines = Vec::new();

        for (query_index, per_percentile) in self.series_data.into_iter().enumerate() {
            for (index, data) in per_percentile.into_iter().enumerate() {
                let color = generate_color_contrast(PURPLE, index);
                let name = format_percentile(self.percentiles[index]);

                if query_index == 0 {
                    // Stacked bars draw back to front.
                    bars.insert(
                        0,
                        BarSeries {
                            name,
                            color: color.to_css(),
                            data,
                        },
                    );
                } else {
                    lines.push(LineSeries {
                        name,
                        color: Some(color.lighten_by_ratio(AGAINST_LIGHTEN_RATIO).to_css()),
                        dashed: true,
                        data,
                    });
                }
            }
        }

        ChartInfo {
            id: ctx.chart_id(),
            aggregation: ctx.aggregation.clone(),
            title: ctx.title(),
            empty: ctx.is_empty(self.empty),
            alerts: None,
            chart: ChartData::Percentiles(PercentilesChart {
                bars,
                lines,
                max: self.max.unwrap_or(0.0),
                times: self.times,
            }),
        }
    }
}

/// Grouped percentiles: one line chart per requested percentile.
#[derive(Debug)]
pub struct GroupedPercentilesAccumulator {
    percentiles: Vec<f64>,
    /// One group-keyed series set per percentile.
    series_data: Vec<SeriesData>,
    times: Vec<i64>,
    empty_value: Option<f64>,
    empty: bool,
    min: Option<f64>,
    max: Option<f64>,
}

impl GroupedPercentilesAccumulator {
    pub fn new(ctx: &FoldContext<'_>) -> Option<Self> {
        let percentiles = ctx.aggregation.percentiles()?;
        let series_data = vec![SeriesData::new(); percentiles.len()];
        // Only an explicit `zero` fills gaps here; percentiles are never counts.
        let empty_value = match ctx.display_null {
            DisplayNull::Zero => Some(0.0),
            _ => None,
        };

        Some(Self {
            percentiles,
            series_data,
            times: Vec::with_capacity(ctx.interval_count),
            empty_value,
            empty: true,
            min: None,
            max: None,
        })
    }

    pub fn accumulate(mut self, ctx: &FoldContext<'_>, step: &IntervalStep<'_>) -> Self {
        if step.query_index == 0 {
            self.times.push(step.time);
        }

        for entry_group in step.interval.groups() {
            let Some(agg) = entry_group.aggregation(ctx.agg_index) else {
                continue;
            };
            if agg.value.is_null() {
                continue;
            }
            self.empty = false;

            let key = group_key(entry_group, ctx.group_by);
            if !ctx.colors.contains_key(&key) {
                continue;
            }

            for (index, value) in percentile_values(&agg.value).into_iter().enumerate() {
                let Some(by_group) = self.series_data.get_mut(index) else {
                    break;
                };
                let empty_value = self.empty_value;
                let series = by_group
                    .entry(key.clone())
                    .or_insert_with(|| vec![vec![empty_value; ctx.interval_count]; ctx.query_count]);

                series[step.query_index][step.interval_index] = value;
                if let Some(value) = value {
                    self.min = Some(self.min.map_or(value, |min| min.min(value)));
                    self.max = Some(self.max.map_or(value, |max| max.max(value)));
                }
            }
        }

        self
    }

    pub fn charts(self, ctx: &FoldContext<'_>) -> Vec<ChartInfo> {
        let id = ctx.chart_id();
        let empty = ctx.is_empty(self.empty);

        self.series_data
            .into_iter()
            .enumerate()
            .map(|(index, series_data)| {
                let (series, against_series) = split_series(series_data, ctx);

                ChartInfo {
                    id: format!("{}-{}", id, index),
                    aggregation: ctx.aggregation.clone(),
                    title: format!(
                        "{}({})",
                        format_percentile(self.percentiles[index]),
                        ctx.aggregation.field
                    ),
                    empty,
                    alerts: None,
                    chart: ChartData::Line(LineChart {
                        times: self.times.clone(),
                        series,
                        against_series,
                        min: self.min,
                        max: self.max,
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percentile_values_accepts_scalars() {
        assert_eq!(percentile_values(&json!([1, 2.5])), vec![Some(1.0), Some(2.5)]);
        assert_eq!(percentile_values(&json!(7)), vec![Some(7.0)]);
        assert_eq!(percentile_values(&json!([null, "x"])), vec![None, None]);
    }
}

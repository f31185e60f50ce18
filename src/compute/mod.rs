//! Result computation engine: turns one query result, and optionally a
//! comparison ("against") result, into chart models, a totals table and colors.

mod accumulator;
pub mod chart;
mod heatmap;
mod line;
mod percentiles;
mod spectrograph;
mod topk;
pub mod totals;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::color::{calculate_colors, ChartColors};
use crate::format::{fields_meta_to_value_formatters, FieldValueFormatters};
use crate::query::{Aggregation, DisplayNull, EntryGroup, EntryRow, Interval, QueryOptions, QueryRequest, QueryResult, Status};

use accumulator::{AggregationSlot, FoldContext, IntervalStep, TotalsStep, Visualizations};

pub use chart::{
    AggregationSummary, BarSeries, ChartData, ChartInfo, HeatMapChart, HistogramBucket, KeyCountValues, LineChart,
    LineSeries, PercentilesChart, SpectrographSummary, TopkChart, ValueRange,
};
pub use topk::UNGRAPHED_GROUP_COLOR;
pub use totals::{top_result_groups, totals_rows, TotalInfo};

/// Groups per result that get colors and line series.
pub const MAX_GRAPHED_GROUPS: usize = 25;
/// Largest histogram drawn, in buckets.
pub const MAX_HEATMAP_BUCKETS: usize = 50;

/// Uid used when the caller does not supply one.
pub const DEFAULT_RESULT_ID: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeOptions {
    pub max_graphed_groups: usize,
    pub max_heatmap_buckets: usize,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self {
            max_graphed_groups: MAX_GRAPHED_GROUPS,
            max_heatmap_buckets: MAX_HEATMAP_BUCKETS,
        }
    }
}

/// Everything a renderer needs for one query run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedQueryResults {
    pub query_aggs: Vec<Aggregation>,
    pub aggregation_charts: Vec<ChartInfo>,
    pub aggregation_summaries: Vec<AggregationSummary>,
    pub colors: ChartColors,
    pub dataset_id: Option<String>,
    pub end_time: String,
    pub groups: Vec<String>,
    pub id: String,
    pub has_results: bool,
    pub last_run: DateTime<Utc>,
    pub matches: Vec<EntryRow>,
    pub resolution: String,
    pub start_time: String,
    pub status: Status,
    pub totals: Vec<TotalInfo>,
    pub query_options: QueryOptions,
    pub field_value_formatters: FieldValueFormatters,
}

impl ComputedQueryResults {
    pub fn chart(&self, id: &str) -> Option<&ChartInfo> {
        self.aggregation_charts.iter().find(|chart| chart.id == id)
    }
}

/// Computes chart models for a primary result and an optional comparison result.
///
/// `against` is ignored without a primary result. The uid defaults to `"1"`
/// and the run is stamped with the current time.
pub fn compute_results(
    result: Option<&QueryResult>,
    against: Option<&QueryResult>,
    uid: Option<&str>,
    extra_options: Option<&QueryOptions>,
    seed: Option<u64>,
) -> Option<ComputedQueryResults> {
    let primary = result?;
    let results: Vec<QueryResult> = std::iter::once(primary).chain(against).cloned().collect();

    compute_query_results(
        &results,
        Utc::now(),
        uid.unwrap_or(DEFAULT_RESULT_ID),
        extra_options,
        seed,
    )
}

/// Computes chart models with the default group and bucket caps.
///
/// `results[0]` is the primary query; any further results are comparisons.
/// Returns `None` when there is nothing to compute.
pub fn compute_query_results(
    results: &[QueryResult],
    last_run: DateTime<Utc>,
    id: &str,
    extra_options: Option<&QueryOptions>,
    seed: Option<u64>,
) -> Option<ComputedQueryResults> {
    compute_query_results_with(results, last_run, id, extra_options, seed, &ComputeOptions::default())
}

pub fn compute_query_results_with(
    results: &[QueryResult],
    last_run: DateTime<Utc>,
    id: &str,
    extra_options: Option<&QueryOptions>,
    seed: Option<u64>,
    options: &ComputeOptions,
) -> Option<ComputedQueryResults> {
    let primary = results.first()?;
    let query = &primary.query;

    let (query_aggs, resolution, group_by) = match query {
        QueryRequest::Structured(structured) => (
            structured.aggregations.clone(),
            structured.resolution.clone(),
            structured.group_by.clone(),
        ),
        QueryRequest::Apl(_) => (Vec::new(), String::new(), None),
    };
    let group_by = group_by.as_deref();

    let all_totals: Vec<&[EntryGroup]> = results.iter().map(QueryResult::totals).collect();
    let rows = totals_rows(&all_totals, query_aggs.len(), group_by);

    let reported_totals: Vec<Option<&[EntryGroup]>> =
        results.iter().map(|r| r.buckets.totals.as_deref()).collect();
    let top_groups = top_result_groups(&reported_totals, options.max_graphed_groups, group_by);
    let colors = calculate_colors(&top_groups, seed);

    let mut query_options = query.query_options().cloned().unwrap_or_default();
    if let Some(extra) = extra_options {
        query_options.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    let all_series: Vec<&[Interval]> = results.iter().map(QueryResult::series).collect();
    let visualizations = calculate_visualizations(
        &all_totals,
        &all_series,
        &colors,
        &query_aggs,
        group_by,
        DisplayNull::from_options(&query_options),
        options,
    );

    let mut field_value_formatters = FieldValueFormatters::new();
    for result in results {
        if let Some(fields) = &result.fields_meta {
            field_value_formatters.extend(fields_meta_to_value_formatters(fields));
        }
    }

    let has_results = visualizations.charts.iter().any(|chart| !chart.empty)
        || !primary.matches.is_empty()
        || !rows.is_empty();

    debug!(
        "Computed {} charts, {} totals rows and {} colors for result {}",
        visualizations.charts.len(),
        rows.len(),
        colors.len(),
        id
    );

    Some(ComputedQueryResults {
        query_aggs,
        aggregation_charts: visualizations.charts,
        aggregation_summaries: visualizations.summaries,
        colors,
        dataset_id: primary.dataset_id.clone(),
        end_time: query.end_time().to_string(),
        groups: group_by.map(<[String]>::to_vec).unwrap_or_default(),
        id: id.to_string(),
        has_results,
        last_run,
        matches: primary.matches.clone(),
        resolution,
        start_time: query.start_time().to_string(),
        status: primary.status.clone(),
        totals: rows,
        query_options,
        field_value_formatters,
    })
}

/// Folds totals, then intervals, into one accumulator pair per aggregation.
///
/// Queries are iterated outermost and aggregations innermost. The interval
/// count is taken from the primary query; comparison intervals past it are
/// dropped.
fn calculate_visualizations(
    all_totals: &[&[EntryGroup]],
    all_series: &[&[Interval]],
    colors: &ChartColors,
    query_aggs: &[Aggregation],
    group_by: Option<&[String]>,
    display_null: DisplayNull,
    options: &ComputeOptions,
) -> Visualizations {
    let query_count = all_totals.len();
    let interval_count = all_series.first().map_or(0, |series| series.len());

    let mut slots: Vec<AggregationSlot<'_>> = query_aggs
        .iter()
        .enumerate()
        .map(|(agg_index, aggregation)| {
            AggregationSlot::new(FoldContext {
                aggregation,
                agg_index,
                colors,
                group_by,
                query_count,
                interval_count,
                display_null,
                options,
            })
        })
        .collect();

    for (query_index, entry_groups) in all_totals.iter().enumerate() {
        for entry_group in entry_groups.iter() {
            let step = TotalsStep {
                query_index,
                entry_group,
            };
            for slot in slots.iter_mut() {
                slot.fold_totals(&step);
            }
        }
    }

    for (query_index, intervals) in all_series.iter().enumerate() {
        for (interval_index, interval) in intervals.iter().take(interval_count).enumerate() {
            let step = IntervalStep {
                query_index,
                interval_index,
                interval,
                time: interval_time(interval),
            };
            for slot in slots.iter_mut() {
                slot.fold_interval(&step);
            }
        }
    }

    let mut out = Visualizations {
        charts: Vec::new(),
        summaries: query_aggs
            .iter()
            .map(|aggregation| AggregationSummary::Plain {
                aggregation: aggregation.clone(),
            })
            .collect(),
    };
    for slot in slots {
        slot.finish(&mut out);
    }
    out
}

fn interval_time(interval: &Interval) -> i64 {
    interval.start_millis().unwrap_or_else(|| {
        warn!("Unparseable interval start time {:?}, using 0", interval.start_time);
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(hour: u32) -> String {
        format!("2021-03-01T{:02}:00:00Z", hour)
    }

    fn result(value: serde_json::Value) -> QueryResult {
        QueryResult::from_value(value).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2021-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn grouped_count_result() -> QueryResult {
        result(json!({
            "query": {
                "aggregations": [{"op": "count", "field": ""}],
                "groupBy": ["host"],
                "resolution": "1h",
                "startTime": at(0),
                "endTime": at(2)
            },
            "buckets": {
                "totals": [
                    {"group": {"host": "a"}, "aggregations": [{"op": "count", "value": 5}]},
                    {"group": {"host": "b"}, "aggregations": [{"op": "count", "value": 2}]}
                ],
                "series": [
                    {"startTime": at(0), "endTime": at(1), "groups": [
                        {"group": {"host": "a"}, "aggregations": [{"op": "count", "value": 3}]},
                        {"group": {"host": "b"}, "aggregations": [{"op": "count", "value": 2}]}
                    ]},
                    {"startTime": at(1), "endTime": at(2), "groups": [
                        {"group": {"host": "a"}, "aggregations": [{"op": "count", "value": 2}]}
                    ]}
                ]
            }
        }))
    }

    #[test]
    fn test_empty_results_yield_none() {
        assert!(compute_query_results(&[], fixed_now(), "1", None, None).is_none());
        assert!(compute_results(None, Some(&grouped_count_result()), None, None, None).is_none());
    }

    #[test]
    fn test_line_chart_from_grouped_counts() {
        let computed = compute_query_results(&[grouped_count_result()], fixed_now(), "r", None, None).unwrap();

        assert_eq!(computed.groups, vec!["host"]);
        assert_eq!(computed.resolution, "1h");
        assert!(computed.has_results);
        assert_eq!(computed.colors.keys().collect::<Vec<_>>(), vec!["", "a", "b"]);

        let chart = &computed.aggregation_charts[0];
        assert_eq!(chart.kind(), "Line");
        assert_eq!(chart.title, "Count");
        assert_eq!(chart.id, r#"{"op":"count","field":""}"#);
        assert!(!chart.empty);

        let line = chart.as_line().unwrap();
        assert_eq!(line.times.len(), 2);
        assert_eq!(line.series.len(), 2);
        assert_eq!(line.series[0].name, "a");
        assert_eq!(line.series[0].data, vec![Some(3.0), Some(2.0)]);
        // No displayNull option: gaps stay null.
        assert_eq!(line.series[1].data, vec![Some(2.0), None]);
        assert_eq!(line.series[0].color.as_deref(), Some(computed.colors["a"].dark.as_str()));
        assert_eq!(line.min, Some(2.0));
        assert_eq!(line.max, Some(3.0));
    }

    #[test]
    fn test_extra_options_override_query_options() {
        let mut extra = QueryOptions::new();
        extra.insert("displayNull".to_string(), json!("zero"));

        let computed =
            compute_query_results(&[grouped_count_result()], fixed_now(), "r", Some(&extra), None).unwrap();

        assert_eq!(computed.query_options["displayNull"], json!("zero"));
        let line = computed.aggregation_charts[0].as_line().unwrap();
        assert_eq!(line.series[1].data, vec![Some(2.0), Some(0.0)]);
    }

    #[test]
    fn test_single_interval_is_empty() {
        let mut single = grouped_count_result();
        if let Some(series) = single.buckets.series.as_mut() {
            series.truncate(1);
        }

        let computed = compute_query_results(&[single], fixed_now(), "r", None, None).unwrap();
        assert!(computed.aggregation_charts[0].empty);
        // Totals rows still count as results.
        assert!(computed.has_results);
    }

    #[test]
    fn test_groups_outside_color_domain_are_not_graphed() {
        let options = ComputeOptions {
            max_graphed_groups: 1,
            ..ComputeOptions::default()
        };
        let computed =
            compute_query_results_with(&[grouped_count_result()], fixed_now(), "r", None, None, &options).unwrap();

        let line = computed.aggregation_charts[0].as_line().unwrap();
        assert_eq!(line.series.len(), 1);
        assert_eq!(line.series[0].name, "a");
        assert!(!computed.colors.contains_key("b"));
    }

    #[test]
    fn test_apl_result_has_no_charts() {
        let computed = compute_query_results(
            &[result(json!({"query": {"apl": "logs | count"}}))],
            fixed_now(),
            "r",
            None,
            None,
        )
        .unwrap();

        assert!(computed.query_aggs.is_empty());
        assert!(computed.aggregation_charts.is_empty());
        assert!(!computed.has_results);
        assert_eq!(computed.colors.len(), 1);
    }

    #[test]
    fn test_interval_time_falls_back_to_zero() {
        let interval = Interval {
            start_time: "soon".to_string(),
            ..Interval::default()
        };
        assert_eq!(interval_time(&interval), 0);
    }
}

//! Renderer-facing chart models produced by the computation engine.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::color::ColorScale;
use crate::query::Aggregation;

/// One finished chart for an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub id: String,
    pub aggregation: Aggregation,
    pub title: String,
    /// Nothing was folded in, or there are fewer than two time points.
    pub empty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<String>>,
    #[serde(flatten)]
    pub chart: ChartData,
}

impl ChartInfo {
    pub fn kind(&self) -> &'static str {
        match self.chart {
            ChartData::Line(_) => "Line",
            ChartData::Percentiles(_) => "Percentiles",
            ChartData::HeatMap(_) => "HeatMap",
            ChartData::Topk(_) => "Topk",
        }
    }

    pub fn as_line(&self) -> Option<&LineChart> {
        match &self.chart {
            ChartData::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_percentiles(&self) -> Option<&PercentilesChart> {
        match &self.chart {
            ChartData::Percentiles(chart) => Some(chart),
            _ => None,
        }
    }

    pub fn as_heat_map(&self) -> Option<&HeatMapChart> {
        match &self.chart {
            ChartData::HeatMap(chart) => Some(chart),
            _ => None,
        }
    }

    pub fn as_topk(&self) -> Option<&TopkChart> {
        match &self.chart {
            ChartData::Topk(chart) => Some(chart),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ChartData {
    Line(LineChart),
    Percentiles(PercentilesChart),
    HeatMap(HeatMapChart),
    Topk(TopkChart),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSeries {
    pub name: String,
    pub color: Option<String>,
    pub dashed: bool,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub name: String,
    pub color: String,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChart {
    /// Interval start times of the primary query, epoch milliseconds.
    pub times: Vec<i64>,
    pub series: Vec<LineSeries>,
    pub against_series: Vec<LineSeries>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentilesChart {
    /// Primary query, largest percentile first.
    pub bars: Vec<BarSeries>,
    /// Comparison queries, dashed.
    pub lines: Vec<LineSeries>,
    pub max: f64,
    pub times: Vec<i64>,
}

/// One histogram bucket as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramBucket {
    pub from: f64,
    pub to: f64,
    pub count: f64,
}

impl HistogramBucket {
    /// Reads a histogram value, keeping positions: entries that are not buckets read as empty ones.
    pub fn parse_list(value: &Value) -> Option<Vec<HistogramBucket>> {
        let items = value.as_array()?;
        Some(
            items
                .iter()
                .map(|item| serde_json::from_value(item.clone()).unwrap_or_default())
                .collect(),
        )
    }
}

/// Observed non-zero range of a heat-map group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatMapChart {
    pub group_color_scales: IndexMap<String, Vec<ColorScale>>,
    /// Per group, `[interval][bucket]` counts. `""` sums every group.
    pub group_series: IndexMap<String, Vec<Vec<f64>>>,
    pub group_meta: IndexMap<String, ValueRange>,
    pub labels: Vec<i64>,
    pub buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCountValues {
    pub key: Value,
    /// Adjusted count per query.
    pub count: Vec<Option<f64>>,
}

impl KeyCountValues {
    pub(crate) fn max_count(&self) -> f64 {
        self.count
            .iter()
            .map(|count| count.unwrap_or(0.0))
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopkChart {
    pub groups: Vec<String>,
    pub group_key_to_group: IndexMap<String, Map<String, Value>>,
    pub group_colors: IndexMap<String, String>,
    pub group_values: IndexMap<String, Vec<KeyCountValues>>,
    pub has_against: bool,
    pub has_groups: bool,
    pub max_count_value: f64,
}

/// Non-chart visual metadata for an aggregation, index aligned with the query's aggregations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregationSummary {
    Spectrograph(SpectrographSummary),
    Plain { aggregation: Aggregation },
}

impl AggregationSummary {
    pub fn aggregation(&self) -> &Aggregation {
        match self {
            AggregationSummary::Spectrograph(summary) => &summary.aggregation,
            AggregationSummary::Plain { aggregation } => aggregation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrographSummary {
    pub aggregation: Aggregation,
    pub color_scales: Vec<ColorScale>,
    pub default_color: String,
    /// Per group, one bucket list per query.
    pub groups_to_values: IndexMap<String, Vec<Option<Vec<HistogramBucket>>>>,
}

//! Input data model: one executed query's response as delivered by the query backend.

pub mod group_key;

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

use crate::error::{SeriesVizError, SeriesVizResult};

pub use group_key::{group_key, key_part};

/// Free-form query options echoed back with the computed results.
pub type QueryOptions = IndexMap<String, Value>;

/// Reads a string that the backend may send as `null`; `null` becomes `""`.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AggregationOp {
    Count,
    Distinct,
    Sum,
    Avg,
    Min,
    Max,
    Stdev,
    Variance,
    Topk,
    Percentiles,
    Histogram,
    Argmin,
    Argmax,
    Other(String),
}

impl AggregationOp {
    pub fn as_str(&self) -> &str {
        match self {
            AggregationOp::Count => "count",
            AggregationOp::Distinct => "distinct",
            AggregationOp::Sum => "sum",
            AggregationOp::Avg => "avg",
            AggregationOp::Min => "min",
            AggregationOp::Max => "max",
            AggregationOp::Stdev => "stdev",
            AggregationOp::Variance => "variance",
            AggregationOp::Topk => "topk",
            AggregationOp::Percentiles => "percentiles",
            AggregationOp::Histogram => "histogram",
            AggregationOp::Argmin => "argmin",
            AggregationOp::Argmax => "argmax",
            AggregationOp::Other(op) => op,
        }
    }

    /// Ops whose missing values read as zero under the `auto` null policy.
    pub fn counts_events(&self) -> bool {
        matches!(self, AggregationOp::Count | AggregationOp::Distinct)
    }
}

impl From<String> for AggregationOp {
    fn from(op: String) -> Self {
        match op.as_str() {
            "count" => AggregationOp::Count,
            "distinct" => AggregationOp::Distinct,
            "sum" => AggregationOp::Sum,
            "avg" => AggregationOp::Avg,
            "min" => AggregationOp::Min,
            "max" => AggregationOp::Max,
            "stdev" => AggregationOp::Stdev,
            "variance" => AggregationOp::Variance,
            "topk" => AggregationOp::Topk,
            "percentiles" => AggregationOp::Percentiles,
            "histogram" => AggregationOp::Histogram,
            "argmin" => AggregationOp::Argmin,
            "argmax" => AggregationOp::Argmax,
            _ => AggregationOp::Other(op),
        }
    }
}

impl From<AggregationOp> for String {
    fn from(op: AggregationOp) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for AggregationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How missing points are drawn in line charts, read from the `displayNull` query option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayNull {
    /// Zero for counting ops, gaps otherwise.
    Auto,
    Zero,
    #[default]
    Null,
    Span,
}

impl DisplayNull {
    pub const OPTION_KEY: &'static str = "displayNull";

    /// Unset or unrecognised values behave like `null`.
    pub fn from_options(options: &QueryOptions) -> Self {
        options
            .get(Self::OPTION_KEY)
            .and_then(Value::as_str)
            .and_then(|text| text.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayNull::Auto => "auto",
            DisplayNull::Zero => "zero",
            DisplayNull::Null => "null",
            DisplayNull::Span => "span",
        }
    }

    /// Value recorded for a missing point of an `op` line series.
    pub fn empty_value(&self, op: &AggregationOp) -> Option<f64> {
        match self {
            DisplayNull::Zero => Some(0.0),
            DisplayNull::Auto if op.counts_events() => Some(0.0),
            _ => None,
        }
    }
}

impl std::str::FromStr for DisplayNull {
    type Err = SeriesVizError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "auto" => Ok(DisplayNull::Auto),
            "zero" => Ok(DisplayNull::Zero),
            "null" => Ok(DisplayNull::Null),
            "span" => Ok(DisplayNull::Span),
            other => Err(SeriesVizError::InvalidInput {
                message: format!("unknown displayNull mode: {}", other),
            }),
        }
    }
}

impl fmt::Display for DisplayNull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub op: AggregationOp,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<Value>,
}

impl Aggregation {
    pub fn new(op: AggregationOp, field: &str) -> Self {
        Self {
            op,
            field: field.to_string(),
            alias: None,
            argument: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_argument(mut self, argument: Value) -> Self {
        self.argument = Some(argument);
        self
    }

    /// Requested percentiles; `None` unless the argument is a non-empty list of numbers.
    pub fn percentiles(&self) -> Option<Vec<f64>> {
        let items = self.argument.as_ref()?.as_array()?;
        if items.is_empty() {
            return None;
        }
        items.iter().map(Value::as_f64).collect()
    }

    /// Numeric argument (histogram bucket count, top-k limit).
    pub fn numeric_argument(&self) -> Option<f64> {
        self.argument.as_ref()?.as_f64()
    }

    /// Canonical JSON of the aggregation; doubles as the chart id.
    pub fn to_id(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.op.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<Aggregation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resolution: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub start_time: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_options: Option<QueryOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_fields: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AplQuery {
    #[serde(default)]
    pub apl: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_options: Option<QueryOptions>,
}

/// The request echoed in a result. Any object carrying an `apl` key is an APL request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryRequest {
    Apl(AplQuery),
    Structured(StructuredQuery),
}

impl<'de> Deserialize<'de> for QueryRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let is_apl = value
            .as_object()
            .is_some_and(|object| object.contains_key("apl"));

        if is_apl {
            serde_json::from_value(value)
                .map(QueryRequest::Apl)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(QueryRequest::Structured)
                .map_err(D::Error::custom)
        }
    }
}

impl Default for QueryRequest {
    fn default() -> Self {
        QueryRequest::Structured(StructuredQuery::default())
    }
}

impl QueryRequest {
    pub fn is_apl(&self) -> bool {
        matches!(self, QueryRequest::Apl(_))
    }

    pub fn start_time(&self) -> &str {
        match self {
            QueryRequest::Structured(q) => &q.start_time,
            QueryRequest::Apl(q) => q.start_time.as_deref().unwrap_or(""),
        }
    }

    pub fn end_time(&self) -> &str {
        match self {
            QueryRequest::Structured(q) => &q.end_time,
            QueryRequest::Apl(q) => q.end_time.as_deref().unwrap_or(""),
        }
    }

    pub fn query_options(&self) -> Option<&QueryOptions> {
        match self {
            QueryRequest::Structured(q) => q.query_options.as_ref(),
            QueryRequest::Apl(q) => q.query_options.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryGroupAgg {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub op: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub group: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Vec<EntryGroupAgg>>,
}

impl EntryGroup {
    pub fn aggregation(&self, index: usize) -> Option<&EntryGroupAgg> {
        self.aggregations.as_ref()?.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub start_time: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<EntryGroup>>,
}

impl Interval {
    pub fn groups(&self) -> &[EntryGroup] {
        self.groups.as_deref().unwrap_or(&[])
    }

    /// Interval start as epoch milliseconds.
    pub fn start_millis(&self) -> Option<i64> {
        parse_timestamp_millis(&self.start_time)
    }
}

/// Parses RFC 3339, or a zone-less ISO timestamp taken as UTC, into epoch milliseconds.
pub fn parse_timestamp_millis(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeseries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<Interval>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<EntryGroup>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Status {
    pub blocks_examined: u64,
    pub cache_status: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    pub elapsed_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_estimate: Option<bool>,
    pub is_partial: bool,
    pub max_block_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Value>>,
    pub min_block_time: String,
    pub num_groups: u64,
    pub rows_examined: u64,
    pub rows_matched: u64,
}

/// One raw matched event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryRow {
    #[serde(rename = "_rowId")]
    pub row_id: String,
    #[serde(rename = "_time")]
    pub time: String,
    #[serde(rename = "_sysTime", skip_serializing_if = "Option::is_none")]
    pub sys_time: Option<String>,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub unit: String,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DatasetField {
    pub fn new(name: &str, field_type: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            unit: unit.to_string(),
            ..Self::default()
        }
    }
}

/// One executed query's response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub buckets: Timeseries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub matches: Vec<EntryRow>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub query: QueryRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields_meta: Option<Vec<DatasetField>>,
}

impl QueryResult {
    pub fn from_json_str(json: &str) -> SeriesVizResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> SeriesVizResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn load(path: impl AsRef<Path>) -> SeriesVizResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;

        if json.trim().is_empty() {
            return Err(SeriesVizError::InvalidInput {
                message: format!("{} is empty", path.display()),
            });
        }

        Self::from_json_str(&json)
    }

    pub fn totals(&self) -> &[EntryGroup] {
        self.buckets.totals.as_deref().unwrap_or(&[])
    }

    pub fn series(&self) -> &[Interval] {
        self.buckets.series.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aggregation_op_round_trips_unknown_ops() {
        let agg: Aggregation = serde_json::from_value(json!({"op": "makeset", "field": "x"})).unwrap();
        assert_eq!(agg.op, AggregationOp::Other("makeset".to_string()));
        assert_eq!(agg.to_id(), r#"{"op":"makeset","field":"x"}"#);
    }

    #[test]
    fn test_null_strings_read_as_empty() {
        let result = QueryResult::from_value(json!({
            "query": {
                "aggregations": [{"op": "count", "field": null}],
                "resolution": null,
                "startTime": null
            },
            "buckets": {"series": [{"startTime": null, "endTime": null, "groups": [
                {"group": {}, "aggregations": [{"op": null, "value": 1}]}
            ]}]}
        }))
        .unwrap();

        let QueryRequest::Structured(query) = &result.query else {
            panic!("expected a structured query");
        };
        assert_eq!(query.aggregations[0].field, "");
        assert_eq!(query.resolution, "");
        assert_eq!(result.series()[0].start_time, "");
        assert_eq!(result.series()[0].groups()[0].aggregations.as_ref().unwrap()[0].op, "");
    }

    #[test]
    fn test_aggregation_percentiles_argument() {
        let agg = Aggregation::new(AggregationOp::Percentiles, "duration")
            .with_argument(json!([50, 95, 99.9]));
        assert_eq!(agg.percentiles(), Some(vec![50.0, 95.0, 99.9]));

        let empty = Aggregation::new(AggregationOp::Percentiles, "duration").with_argument(json!([]));
        assert_eq!(empty.percentiles(), None);

        let scalar = Aggregation::new(AggregationOp::Percentiles, "duration").with_argument(json!(95));
        assert_eq!(scalar.percentiles(), None);
    }

    #[test]
    fn test_display_null_from_options() {
        let mut options = QueryOptions::new();
        assert_eq!(DisplayNull::from_options(&options), DisplayNull::Null);

        options.insert("displayNull".to_string(), json!("auto"));
        let mode = DisplayNull::from_options(&options);
        assert_eq!(mode, DisplayNull::Auto);
        assert_eq!(mode.empty_value(&AggregationOp::Count), Some(0.0));
        assert_eq!(mode.empty_value(&AggregationOp::Avg), None);

        options.insert("displayNull".to_string(), json!("sideways"));
        assert_eq!(DisplayNull::from_options(&options), DisplayNull::Null);
        assert!("sideways".parse::<DisplayNull>().is_err());
    }

    #[test]
    fn test_query_request_detects_apl() {
        let apl: QueryRequest = serde_json::from_value(json!({"apl": ""})).unwrap();
        assert!(apl.is_apl());
        assert_eq!(apl.start_time(), "");

        let structured: QueryRequest = serde_json::from_value(json!({
            "aggregations": [{"op": "count", "field": ""}],
            "groupBy": ["host"],
            "resolution": "auto",
            "startTime": "2021-01-01T00:00:00Z",
            "endTime": "2021-01-01T01:00:00Z"
        }))
        .unwrap();
        assert!(!structured.is_apl());
        assert_eq!(structured.start_time(), "2021-01-01T00:00:00Z");
    }

    #[test]
    fn test_parse_timestamp_millis() {
        assert_eq!(parse_timestamp_millis("1970-01-01T00:00:01Z"), Some(1000));
        assert_eq!(parse_timestamp_millis("1970-01-01T00:00:01.500"), Some(1500));
        assert_eq!(parse_timestamp_millis("yesterday"), None);
    }

    #[test]
    fn test_query_result_from_minimal_json() {
        let result = QueryResult::from_json_str(r#"{"query": {"apl": "x | count"}}"#).unwrap();
        assert!(result.totals().is_empty());
        assert!(result.series().is_empty());
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_query_result_rejects_malformed_json() {
        assert!(QueryResult::from_json_str("{not json").is_err());
    }
}

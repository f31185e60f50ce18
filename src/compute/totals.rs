use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::query::{group_key, EntryGroup, EntryGroupAgg};

/// One row of the totals table: a group and its aggregation values across queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalInfo {
    pub id: String,
    /// Group values, with anything but strings and numbers JSON-encoded.
    pub group: Map<String, Value>,
    /// `[aggregation][query]`; `None` where a query had no value.
    pub aggs: Vec<Option<Vec<Option<EntryGroupAgg>>>>,
}

/// Builds the totals table, one row per group key in first-seen order.
pub fn totals_rows(all_totals: &[&[EntryGroup]], agg_count: usize, group_by: Option<&[String]>) -> Vec<TotalInfo> {
    let query_count = all_totals.len();
    let mut rows: IndexMap<String, TotalInfo> = IndexMap::new();

    for (query_index, entry_groups) in all_totals.iter().enumerate() {
        for entry_group in entry_groups.iter() {
            let key = group_key(entry_group, group_by);

            let row = rows.entry(key.clone()).or_insert_with(|| TotalInfo {
                id: key,
                group: stringify_group(&entry_group.group),
                aggs: vec![None; agg_count],
            });

            let aggregations = entry_group.aggregations.as_deref().unwrap_or(&[]);
            for (agg_index, agg) in aggregations.iter().enumerate() {
                if row.aggs.len() <= agg_index {
                    row.aggs.resize(agg_index + 1, None);
                }
                let values = row.aggs[agg_index].get_or_insert_with(|| vec![None; query_count]);
                values[query_index] = Some(agg.clone());
            }
        }
    }

    rows.into_values().collect()
}

fn stringify_group(group: &Map<String, Value>) -> Map<String, Value> {
    group
        .iter()
        .map(|(field, value)| {
            let value = match value {
                Value::String(_) | Value::Number(_) => value.clone(),
                other => Value::String(other.to_string()),
            };
            (field.clone(), value)
        })
        .collect()
}

/// Group keys eligible for colors and line series: the first `limit` totals
/// rows of each result, in order, duplicates kept.
pub fn top_result_groups(all_totals: &[Option<&[EntryGroup]>], limit: usize, group_by: Option<&[String]>) -> Vec<String> {
    all_totals
        .iter()
        .flatten()
        .flat_map(|totals| totals.iter().take(limit))
        .map(|entry_group| group_key(entry_group, group_by))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(group: Value, aggs: Value) -> EntryGroup {
        serde_json::from_value(json!({"group": group, "aggregations": aggs})).unwrap()
    }

    #[test]
    fn test_totals_rows_merge_queries_by_key() {
        let primary = vec![
            entry(json!({"host": "a"}), json!([{"op": "count", "value": 3}])),
            entry(json!({"host": "b"}), json!([{"op": "count", "value": 1}])),
        ];
        let against = vec![entry(json!({"host": "b"}), json!([{"op": "count", "value": 7}]))];
        let by = vec!["host".to_string()];

        let rows = totals_rows(&[&primary[..], &against[..]], 1, Some(by.as_slice()));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "a");
        assert_eq!(rows[1].id, "b");

        let b_counts = rows[1].aggs[0].as_ref().unwrap();
        assert_eq!(b_counts[0].as_ref().unwrap().value, json!(1));
        assert_eq!(b_counts[1].as_ref().unwrap().value, json!(7));

        let a_counts = rows[0].aggs[0].as_ref().unwrap();
        assert!(a_counts[1].is_none());
    }

    #[test]
    fn test_totals_rows_stringify_structured_group_values() {
        let primary = vec![entry(json!({"tags": ["x"], "ok": true, "n": 2}), json!([]))];
        let rows = totals_rows(&[&primary[..]], 0, None);

        assert_eq!(rows[0].group["tags"], json!("[\"x\"]"));
        assert_eq!(rows[0].group["ok"], json!("true"));
        assert_eq!(rows[0].group["n"], json!(2));
        assert!(rows[0].aggs.is_empty());
    }

    #[test]
    fn test_top_result_groups_limits_each_result() {
        let primary: Vec<EntryGroup> = (0..30)
            .map(|i| entry(json!({"host": format!("h{}", i)}), json!([])))
            .collect();
        let against = vec![entry(json!({"host": "h29"}), json!([]))];
        let by = vec!["host".to_string()];

        let keys = top_result_groups(&[Some(&primary[..]), None, Some(&against[..])], 25, Some(by.as_slice()));

        assert_eq!(keys.len(), 26);
        assert_eq!(keys[24], "h24");
        assert_eq!(keys[25], "h29");
    }
}

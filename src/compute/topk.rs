use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::compute::accumulator::{FoldContext, TotalsStep};
use crate::compute::chart::{ChartData, ChartInfo, KeyCountValues, TopkChart};
use crate::query::group_key;

/// Background for groups that were not assigned a color.
pub const UNGRAPHED_GROUP_COLOR: &str = "#f0f2f5";

/// One entry of a top-k value list.
#[derive(Debug, Clone, Deserialize)]
struct TopkValue {
    #[serde(default)]
    key: Value,
    #[serde(default)]
    count: f64,
    #[serde(default)]
    error: f64,
}

impl TopkValue {
    /// Top-k counts are approximate upper bounds; subtracting the reported
    /// error gives the guaranteed count.
    fn adjusted_count(&self) -> f64 {
        self.count - self.error
    }
}

#[derive(Debug)]
pub struct TopkAccumulator {
    groups: Vec<String>,
    group_key_to_group: IndexMap<String, Map<String, Value>>,
    group_colors: IndexMap<String, String>,
    group_values: IndexMap<String, Vec<KeyCountValues>>,
    max_count_value: f64,
    empty: bool,
}

impl TopkAccumulator {
    pub fn new(_ctx: &FoldContext<'_>) -> Self {
        Self {
            groups: Vec::new(),
            group_key_to_group: IndexMap::new(),
            group_colors: IndexMap::new(),
            group_values: IndexMap::new(),
            max_count_value: 0.0,
            empty: true,
        }
    }

    pub fn accumulate(mut self, ctx: &FoldContext<'_>, step: &TotalsStep<'_>) -> Self {
        let Some(Value::Array(items)) = step.value(ctx.agg_index) else {
            return self;
        };
        let key = group_key(step.entry_group, ctx.group_by);

        if !self.group_key_to_group.contains_key(&key) {
            self.groups.push(key.clone());
            self.group_key_to_group
                .insert(key.clone(), step.entry_group.group.clone());
        }

        let color = ctx
            .colors
            .get(&key)
            .map(|colors| colors.light.clone())
            .unwrap_or_else(|| UNGRAPHED_GROUP_COLOR.to_string());
        self.group_colors.insert(key.clone(), color);

        let values = self.group_values.entry(key).or_default();

        for item in items {
            let Ok(topk) = serde_json::from_value::<TopkValue>(item.clone()) else {
                continue;
            };
            let position = match values.iter().position(|kc| kc.key == topk.key) {
                Some(position) => position,
                None => {
                    values.push(KeyCountValues {
                        key: topk.key.clone(),
                        count: vec![None; ctx.query_count],
                    });
                    values.len() - 1
                }
            };

            let adjusted = topk.adjusted_count();
            values[position].count[step.query_index] = Some(adjusted);
            self.max_count_value = self.max_count_value.max(adjusted);
            self.empty = false;
        }

        self
    }

    pub fn chart(mut self, ctx: &FoldContext<'_>) -> ChartInfo {
        // Stable, so equal counts keep first-seen order.
        for values in self.group_values.values_mut() {
            values.sort_by(|a, b| b.max_count().partial_cmp(&a.max_count()).unwrap_or(Ordering::Equal));
        }

        ChartInfo {
            id: ctx.chart_id(),
            aggregation: ctx.aggregation.clone(),
            title: ctx.title(),
            empty: ctx.is_empty(self.empty),
            alerts: None,
            chart: ChartData::Topk(TopkChart {
                groups: self.groups,
                group_key_to_group: self.group_key_to_group,
                group_colors: self.group_colors,
                group_values: self.group_values,
                has_against: ctx.query_count > 1,
                has_groups: ctx.has_groups(),
                max_count_value: self.max_count_value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topk_value_subtracts_error() {
        let value: TopkValue = serde_json::from_value(json!({"key": "a", "count": 10, "error": 2})).unwrap();
        assert_eq!(value.adjusted_count(), 8.0);

        let exact: TopkValue = serde_json::from_value(json!({"key": "b", "count": 3})).unwrap();
        assert_eq!(exact.adjusted_count(), 3.0);
    }
}

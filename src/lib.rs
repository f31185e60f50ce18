pub mod color;
pub mod compute;
pub mod error;
pub mod format;
pub mod query;
pub mod ticks;

use chrono::Utc;
use tracing::debug;

use error::{SeriesVizError, SeriesVizResult};

pub use color::{calculate_colors, ChartColors, GroupColors};
pub use compute::{
    compute_query_results, compute_query_results_with, compute_results, ChartInfo, ComputeOptions,
    ComputedQueryResults,
};
pub use query::{group_key, Aggregation, AggregationOp, DisplayNull, QueryOptions, QueryResult};
pub use ticks::get_splits;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesVizConfig {
    /// Null policy applied when a query does not set `displayNull` itself.
    pub display_null: Option<DisplayNull>,
    pub max_graphed_groups: usize,
    pub max_heatmap_buckets: usize,
    pub tick_min_space: f64,
}

impl Default for SeriesVizConfig {
    fn default() -> Self {
        Self {
            display_null: None,
            max_graphed_groups: compute::MAX_GRAPHED_GROUPS,
            max_heatmap_buckets: compute::MAX_HEATMAP_BUCKETS,
            tick_min_space: ticks::DEFAULT_TICK_MIN_SPACE,
        }
    }
}

impl SeriesVizConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(display_null) = std::env::var("SERIESVIZ_DISPLAY_NULL") {
            config.display_null = display_null.parse().ok();
        }

        if let Ok(max_groups) = std::env::var("SERIESVIZ_MAX_GRAPHED_GROUPS") {
            config.max_graphed_groups = max_groups.parse().unwrap_or(compute::MAX_GRAPHED_GROUPS);
        }

        if let Ok(max_buckets) = std::env::var("SERIESVIZ_MAX_HEATMAP_BUCKETS") {
            config.max_heatmap_buckets = max_buckets.parse().unwrap_or(compute::MAX_HEATMAP_BUCKETS);
        }

        if let Ok(min_space) = std::env::var("SERIESVIZ_TICK_MIN_SPACE") {
            config.tick_min_space = min_space.parse().unwrap_or(ticks::DEFAULT_TICK_MIN_SPACE);
        }

        config
    }

    pub fn validate(&self) -> SeriesVizResult<()> {
        if self.max_graphed_groups == 0 {
            return Err(SeriesVizError::Config {
                message: "max graphed groups must be at least 1".to_string(),
            });
        }
        if self.max_heatmap_buckets == 0 {
            return Err(SeriesVizError::Config {
                message: "max heat map buckets must be at least 1".to_string(),
            });
        }
        if !(self.tick_min_space.is_finite() && self.tick_min_space > 0.0) {
            return Err(SeriesVizError::Config {
                message: format!("tick min space must be positive, got {}", self.tick_min_space),
            });
        }
        Ok(())
    }

    pub fn compute_options(&self) -> ComputeOptions {
        ComputeOptions {
            max_graphed_groups: self.max_graphed_groups,
            max_heatmap_buckets: self.max_heatmap_buckets,
        }
    }
}

/// Configured entry point for computing chart models.
pub struct ChartEngine {
    config: SeriesVizConfig,
}

impl ChartEngine {
    pub fn new(config: SeriesVizConfig) -> SeriesVizResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SeriesVizConfig {
        &self.config
    }

    /// Computes a primary result, optionally against a comparison result.
    pub fn compute(
        &self,
        primary: &QueryResult,
        against: Option<&QueryResult>,
        uid: Option<&str>,
        seed: Option<u64>,
    ) -> Option<ComputedQueryResults> {
        self.compute_with_options(primary, against, uid, &QueryOptions::new(), seed)
    }

    /// Like [`ChartEngine::compute`], with caller options overriding the query's own.
    pub fn compute_with_options(
        &self,
        primary: &QueryResult,
        against: Option<&QueryResult>,
        uid: Option<&str>,
        extra_options: &QueryOptions,
        seed: Option<u64>,
    ) -> Option<ComputedQueryResults> {
        let mut extra = extra_options.clone();

        let query_sets_display_null = primary
            .query
            .query_options()
            .is_some_and(|options| options.contains_key(DisplayNull::OPTION_KEY));
        if let Some(display_null) = self.config.display_null {
            if !query_sets_display_null && !extra.contains_key(DisplayNull::OPTION_KEY) {
                extra.insert(
                    DisplayNull::OPTION_KEY.to_string(),
                    serde_json::Value::String(display_null.to_string()),
                );
            }
        }

        let results: Vec<QueryResult> = std::iter::once(primary).chain(against).cloned().collect();
        debug!("Computing {} query results", results.len());

        compute_query_results_with(
            &results,
            Utc::now(),
            uid.unwrap_or(compute::DEFAULT_RESULT_ID),
            Some(&extra),
            seed,
            &self.config.compute_options(),
        )
    }

    /// Axis ticks using the configured minimum spacing.
    pub fn splits(&self, min: f64, max: f64, dim: f64) -> Option<Vec<f64>> {
        get_splits(min, max, dim, self.config.tick_min_space)
    }
}

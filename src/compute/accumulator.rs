//! Accumulator registry and fold plumbing.
//!
//! Each aggregation gets at most one totals accumulator and one series
//! accumulator. They are created lazily on the first row or interval that
//! reaches them, threaded by value through every fold step and consumed by
//! `finish`.

use tracing::debug;

use crate::color::ChartColors;
use crate::compute::chart::{AggregationSummary, ChartInfo};
use crate::compute::heatmap::HeatMapAccumulator;
use crate::compute::line::LineAccumulator;
use crate::compute::percentiles::{GroupedPercentilesAccumulator, PercentilesAccumulator};
use crate::compute::spectrograph::SpectrographAccumulator;
use crate::compute::topk::TopkAccumulator;
use crate::compute::ComputeOptions;
use crate::format::format_aggregation_chart_title;
use crate::query::{Aggregation, AggregationOp, DisplayNull, EntryGroup, Interval};

/// Everything an accumulator may read about its aggregation and the run.
#[derive(Debug, Clone, Copy)]
pub struct FoldContext<'a> {
    pub aggregation: &'a Aggregation,
    pub agg_index: usize,
    pub colors: &'a ChartColors,
    pub group_by: Option<&'a [String]>,
    pub query_count: usize,
    pub interval_count: usize,
    pub display_null: DisplayNull,
    pub options: &'a ComputeOptions,
}

impl FoldContext<'_> {
    pub fn has_groups(&self) -> bool {
        self.group_by.is_some_and(|fields| !fields.is_empty())
    }

    pub fn chart_id(&self) -> String {
        self.aggregation.to_id()
    }

    pub fn title(&self) -> String {
        format_aggregation_chart_title(self.aggregation)
    }

    /// Single-point series cannot show a trend and count as empty.
    pub fn is_empty(&self, nothing_folded: bool) -> bool {
        nothing_folded || self.interval_count < 2
    }
}

/// One totals row of one query.
#[derive(Debug, Clone, Copy)]
pub struct TotalsStep<'a> {
    pub query_index: usize,
    pub entry_group: &'a EntryGroup,
}

impl TotalsStep<'_> {
    pub fn value(&self, agg_index: usize) -> Option<&serde_json::Value> {
        self.entry_group.aggregation(agg_index).map(|agg| &agg.value)
    }
}

/// One interval of one query.
#[derive(Debug, Clone, Copy)]
pub struct IntervalStep<'a> {
    pub query_index: usize,
    pub interval_index: usize,
    pub interval: &'a Interval,
    /// Interval start, epoch milliseconds.
    pub time: i64,
}

/// Finished output of all aggregations.
#[derive(Debug, Default)]
pub struct Visualizations {
    pub charts: Vec<ChartInfo>,
    pub summaries: Vec<AggregationSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsKind {
    Spectrograph,
    Topk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Line,
    Percentiles,
    GroupedPercentiles,
    HeatMap,
}

/// Which accumulators an aggregation op feeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registration {
    pub totals: Option<TotalsKind>,
    pub series: Option<SeriesKind>,
}

/// Maps an op to its accumulators. Ops without an entry produce no chart.
pub fn register(op: &AggregationOp, grouped: bool) -> Registration {
    match op {
        AggregationOp::Histogram => Registration {
            totals: Some(TotalsKind::Spectrograph),
            series: Some(SeriesKind::HeatMap),
        },
        AggregationOp::Count
        | AggregationOp::Distinct
        | AggregationOp::Sum
        | AggregationOp::Avg
        | AggregationOp::Min
        | AggregationOp::Max
        | AggregationOp::Stdev
        | AggregationOp::Variance => Registration {
            totals: None,
            series: Some(SeriesKind::Line),
        },
        AggregationOp::Percentiles if grouped => Registration {
            totals: None,
            series: Some(SeriesKind::GroupedPercentiles),
        },
        AggregationOp::Percentiles => Registration {
            totals: None,
            series: Some(SeriesKind::Percentiles),
        },
        AggregationOp::Topk => Registration {
            totals: Some(TotalsKind::Topk),
            series: None,
        },
        other => {
            debug!("No chart for aggregation op {}", other);
            Registration::default()
        }
    }
}

#[derive(Debug)]
pub enum TotalsAccumulator {
    Spectrograph(SpectrographAccumulator),
    Topk(TopkAccumulator),
}

impl TotalsKind {
    pub fn create(self, ctx: &FoldContext<'_>) -> Option<TotalsAccumulator> {
        match self {
            TotalsKind::Spectrograph => Some(TotalsAccumulator::Spectrograph(SpectrographAccumulator::new(ctx))),
            TotalsKind::Topk => Some(TotalsAccumulator::Topk(TopkAccumulator::new(ctx))),
        }
    }
}

impl TotalsAccumulator {
    pub fn fold(self, ctx: &FoldContext<'_>, step: &TotalsStep<'_>) -> Self {
        match self {
            TotalsAccumulator::Spectrograph(acc) => TotalsAccumulator::Spectrograph(acc.accumulate(ctx, step)),
            TotalsAccumulator::Topk(acc) => TotalsAccumulator::Topk(acc.accumulate(ctx, step)),
        }
    }

    pub fn finish(self, ctx: &FoldContext<'_>, out: &mut Visualizations) {
        match self {
            TotalsAccumulator::Spectrograph(acc) => {
                out.summaries[ctx.agg_index] = AggregationSummary::Spectrograph(acc.summarize(ctx));
            }
            TotalsAccumulator::Topk(acc) => out.charts.push(acc.chart(ctx)),
        }
    }
}

#[derive(Debug)]
pub enum SeriesAccumulator {
    Line(LineAccumulator),
    Percentiles(PercentilesAccumulator),
    GroupedPercentiles(GroupedPercentilesAccumulator),
    HeatMap(HeatMapAccumulator),
}

impl SeriesKind {
    /// `None` when the aggregation's argument does not suit the chart.
    pub fn create(self, ctx: &FoldContext<'_>) -> Option<SeriesAccumulator> {
        match self {
            SeriesKind::Line => Some(SeriesAccumulator::Line(LineAccumulator::new(ctx))),
            SeriesKind::Percentiles => PercentilesAccumulator::new(ctx).map(SeriesAccumulator::Percentiles),
            SeriesKind::GroupedPercentiles => {
                GroupedPercentilesAccumulator::new(ctx).map(SeriesAccumulator::GroupedPercentiles)
            }
            SeriesKind::HeatMap => HeatMapAccumulator::new(ctx).map(SeriesAccumulator::HeatMap),
        }
    }
}

impl SeriesAccumulator {
    pub fn fold(self, ctx: &FoldContext<'_>, step: &IntervalStep<'_>) -> Self {
        match self {
            SeriesAccumulator::Line(acc) => SeriesAccumulator::Line(acc.accumulate(ctx, step)),
            SeriesAccumulator::Percentiles(acc) => SeriesAccumulator::Percentiles(acc.accumulate(ctx, step)),
            SeriesAccumulator::GroupedPercentiles(acc) => {
                SeriesAccumulator::GroupedPercentiles(acc.accumulate(ctx, step))
            }
            SeriesAccumulator::HeatMap(acc) => SeriesAccumulator::HeatMap(acc.accumulate(ctx, step)),
        }
    }

    pub fn finish(self, ctx: &FoldContext<'_>, out: &mut Visualizations) {
        match self {
            SeriesAccumulator::Line(acc) => out.charts.push(acc.chart(ctx)),
            SeriesAccumulator::Percentiles(acc) => out.charts.push(acc.chart(ctx)),
            SeriesAccumulator::GroupedPercentiles(acc) => out.charts.extend(acc.charts(ctx)),
            SeriesAccumulator::HeatMap(acc) => out.charts.push(acc.chart(ctx)),
        }
    }
}

/// Per-aggregation fold state.
#[derive(Debug)]
pub struct AggregationSlot<'a> {
    pub ctx: FoldContext<'a>,
    pub registration: Registration,
    totals: Option<TotalsAccumulator>,
    series: Option<SeriesAccumulator>,
}

impl<'a> AggregationSlot<'a> {
    pub fn new(ctx: FoldContext<'a>) -> Self {
        let registration = register(&ctx.aggregation.op, ctx.has_groups());
        Self {
            ctx,
            registration,
            totals: None,
            series: None,
        }
    }

    pub fn fold_totals(&mut self, step: &TotalsStep<'_>) {
        let Some(kind) = self.registration.totals else {
            return;
        };
        let current = match self.totals.take() {
            Some(acc) => Some(acc),
            None => kind.create(&self.ctx),
        };
        self.totals = current.map(|acc| acc.fold(&self.ctx, step));
    }

    pub fn fold_interval(&mut self, step: &IntervalStep<'_>) {
        let Some(kind) = self.registration.series else {
            return;
        };
        let current = match self.series.take() {
            Some(acc) => Some(acc),
            None => kind.create(&self.ctx),
        };
        self.series = current.map(|acc| acc.fold(&self.ctx, step));
    }

    /// Totals output first, then series output.
    pub fn finish(self, out: &mut Visualizations) {
        if let Some(totals) = self.totals {
            totals.finish(&self.ctx, out);
        }
        if let Some(series) = self.series {
            series.finish(&self.ctx, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_charted_ops() {
        let histogram = register(&AggregationOp::Histogram, false);
        assert_eq!(histogram.totals, Some(TotalsKind::Spectrograph));
        assert_eq!(histogram.series, Some(SeriesKind::HeatMap));

        for op in [
            AggregationOp::Count,
            AggregationOp::Distinct,
            AggregationOp::Sum,
            AggregationOp::Avg,
            AggregationOp::Min,
            AggregationOp::Max,
            AggregationOp::Stdev,
            AggregationOp::Variance,
        ] {
            assert_eq!(register(&op, true).series, Some(SeriesKind::Line));
        }

        assert_eq!(register(&AggregationOp::Percentiles, false).series, Some(SeriesKind::Percentiles));
        assert_eq!(
            register(&AggregationOp::Percentiles, true).series,
            Some(SeriesKind::GroupedPercentiles)
        );
        assert_eq!(register(&AggregationOp::Topk, false).totals, Some(TotalsKind::Topk));
    }

    #[test]
    fn test_registry_skips_unknown_ops() {
        assert_eq!(register(&AggregationOp::Argmin, false), Registration::default());
        assert_eq!(
            register(&AggregationOp::Other("makeset".to_string()), false),
            Registration::default()
        );
    }
}

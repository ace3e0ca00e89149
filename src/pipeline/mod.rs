//! Stage orchestration, monthly aggregation and run metrics.

mod metrics;
mod stages;
mod temporal;

pub use metrics::{Metrics, MetricsSnapshot};
pub use stages::{Pipeline, PipelineReport};
pub use temporal::{MonthlyComposite, TemporalAggregator, TemporalReducer, TimeSeries, TimeSeriesEntry, MONTH_LABELS};

//! Presentation of reduced statistics: palettes, legends and charts.
//!
//! Everything here is a pure transform of already-reduced numbers and never
//! calls back into the platform.

mod chart;
mod legend;
mod palette;

pub use chart::{
    class_slices, histogram_bins, ChartData, ChartKind, ChartOptions, ChartRow, ChartSpec, ClassSlice, HistogramBin,
    MonthlyStyle, SeriesStyle,
};
pub use legend::{
    format_number, linear_breaks, Breaks, ContinuousLegend, LabelStyle, Legend, LegendEntry, Sampling, M2_PER_HECTARE,
};
pub use palette::{parse_palette, Color};

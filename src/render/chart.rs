//! Chart selection from reduced statistics.
//!
//! The chart type follows the shape of the data: class areas become a donut,
//! one monthly measure a column or line chart, two measures a dual-line chart,
//! and a histogram a column chart.

use super::legend::M2_PER_HECTARE;
use super::palette::{parse_palette, Color};
use crate::error::LegendError;
use crate::pipeline::TimeSeries;
use crate::platform::Statistics;
use crate::transform::ClassificationScheme;
use serde::{Deserialize, Serialize};

/// One class of a class breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSlice {
    pub class: i64,
    pub name: String,
    pub color: Color,
    pub hectares: f64,
}

impl ClassSlice {
    /// `"<name> (<ha> ha)"`
    pub fn label(&self) -> String {
        format!("{} ({:.2} ha)", self.name, self.hectares)
    }
}

/// Classes present in the statistics, in class order, with areas in hectares.
///
/// Classes outside the scheme are named `Class <n>` and drawn grey.
pub fn class_slices(scheme: &ClassificationScheme, stats: &Statistics) -> Result<Vec<ClassSlice>, LegendError> {
    let colors = parse_palette(&scheme.colors)?;
    Ok(stats
        .classes()
        .map(|(class, m2)| {
            let idx = usize::try_from(class - 1).ok();
            let name = scheme
                .name(class)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Class {}", class));
            let color = idx
                .and_then(|i| colors.get(i).copied())
                .unwrap_or(Color::rgb(0x80, 0x80, 0x80));
            ClassSlice {
                class,
                name,
                color,
                hectares: m2 / M2_PER_HECTARE,
            }
        })
        .collect())
}

/// One histogram bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub count: f64,
}

/// Rebuild bins from histogram statistics (`<band>_min`, `<band>_max`, bin counts).
pub fn histogram_bins(stats: &Statistics, band: &str) -> Vec<HistogramBin> {
    let (Some(min), Some(max)) = (stats.band(&format!("{}_min", band)), stats.band(&format!("{}_max", band))) else {
        return Vec::new();
    };
    let counts: Vec<(usize, f64)> = stats.bins().collect();
    let width = (max - min) / counts.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(idx, count)| HistogramBin {
            lo: min + width * idx as f64,
            hi: min + width * (idx + 1) as f64,
            count,
        })
        .collect()
}

/// Reduced data handed to the chart selector.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    ClassBreakdown(Vec<ClassSlice>),
    Monthly(TimeSeries),
    Histogram(Vec<HistogramBin>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Pie,
    Column,
    Line,
    DualLine,
}

/// Chart type for a single monthly measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyStyle {
    #[default]
    Column,
    Line,
}

/// Styling of one plotted series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStyle {
    /// Legend name
    pub name: String,
    pub color: Color,
    #[serde(default)]
    pub line_width: Option<u32>,
    #[serde(default)]
    pub point_size: Option<u32>,
}

/// Chart options from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    pub title: String,

    #[serde(default)]
    pub h_axis: Option<String>,

    #[serde(default)]
    pub v_axis: Option<String>,

    /// Fixed vertical axis [min, max]
    #[serde(default)]
    pub v_range: Option<[f64; 2]>,

    #[serde(default)]
    pub monthly_style: MonthlyStyle,

    #[serde(default)]
    pub series: Vec<SeriesStyle>,

    /// Donut hole fraction for pie charts
    #[serde(default = "default_pie_hole")]
    pub pie_hole: f64,
}

fn default_pie_hole() -> f64 {
    0.4
}

/// One chart row: an x label and one value per column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

/// A fully specified chart, ready for a display sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub h_axis: Option<String>,
    pub v_axis: Option<String>,
    pub v_range: Option<[f64; 2]>,
    pub columns: Vec<String>,
    pub rows: Vec<ChartRow>,
    pub series: Vec<SeriesStyle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slice_colors: Vec<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pie_hole: Option<f64>,
}

impl ChartSpec {
    /// Pick the chart type for `data` and lay out its rows.
    pub fn select(data: &ChartData, options: &ChartOptions) -> Self {
        let mut spec = Self {
            kind: ChartKind::Column,
            title: options.title.clone(),
            h_axis: options.h_axis.clone(),
            v_axis: options.v_axis.clone(),
            v_range: options.v_range,
            columns: Vec::new(),
            rows: Vec::new(),
            series: options.series.clone(),
            slice_colors: Vec::new(),
            pie_hole: None,
        };

        match data {
            ChartData::ClassBreakdown(slices) => {
                spec.kind = ChartKind::Pie;
                spec.columns = vec!["Area (ha)".to_string()];
                spec.rows = slices
                    .iter()
                    .map(|s| ChartRow {
                        label: s.label(),
                        values: vec![Some(s.hectares)],
                    })
                    .collect();
                spec.slice_colors = slices.iter().map(|s| s.color).collect();
                spec.pie_hole = Some(options.pie_hole);
            }
            ChartData::Monthly(series) => {
                spec.kind = match (series.series.len(), options.monthly_style) {
                    (n, _) if n >= 2 => ChartKind::DualLine,
                    (_, MonthlyStyle::Column) => ChartKind::Column,
                    (_, MonthlyStyle::Line) => ChartKind::Line,
                };
                spec.columns = series.series.clone();
                spec.rows = series
                    .entries
                    .iter()
                    .map(|e| ChartRow {
                        label: e.label.clone(),
                        values: series
                            .series
                            .iter()
                            .map(|s| e.values.get(s).copied().flatten())
                            .collect(),
                    })
                    .collect();
            }
            ChartData::Histogram(bins) => {
                spec.kind = ChartKind::Column;
                spec.columns = vec!["Count".to_string()];
                spec.rows = bins
                    .iter()
                    .map(|b| ChartRow {
                        label: format!("{:.0}-{:.0}", b.lo, b.hi),
                        values: vec![Some(b.count)],
                    })
                    .collect();
            }
        }

        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StatKey;

    fn options() -> ChartOptions {
        ChartOptions {
            title: "t".to_string(),
            h_axis: Some("Month".to_string()),
            v_axis: None,
            v_range: None,
            monthly_style: MonthlyStyle::Column,
            series: vec![],
            pie_hole: 0.4,
        }
    }

    fn scheme() -> ClassificationScheme {
        ClassificationScheme {
            names: vec!["Water".into(), "Trees".into(), "Crops".into()],
            colors: vec!["#1A5BAB".into(), "#358221".into(), "#FFDB5C".into()],
            from: vec![1, 2, 5],
            to: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_class_breakdown_is_donut() {
        let stats: Statistics = vec![(StatKey::Class(3), 20_000.0), (StatKey::Class(1), 5_000.0)]
            .into_iter()
            .collect();
        let slices = class_slices(&scheme(), &stats).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].name, "Water");
        assert_eq!(slices[1].color, Color::parse("#FFDB5C").unwrap());

        let chart = ChartSpec::select(&ChartData::ClassBreakdown(slices), &options());
        assert_eq!(chart.kind, ChartKind::Pie);
        assert_eq!(chart.pie_hole, Some(0.4));
        assert_eq!(chart.rows[0].label, "Water (0.50 ha)");
        assert_eq!(chart.rows[1].label, "Crops (2.00 ha)");
        assert_eq!(chart.slice_colors.len(), 2);
    }

    #[test]
    fn test_unknown_class_slice() {
        let stats: Statistics = vec![(StatKey::Class(11), 1.0)].into_iter().collect();
        let slices = class_slices(&scheme(), &stats).unwrap();
        assert_eq!(slices[0].name, "Class 11");
    }

    #[test]
    fn test_single_measure_column_or_line() {
        let mut series = TimeSeries::new(vec!["precipitation".to_string()]);
        series.set(7, "precipitation", Some(600.0));
        let data = ChartData::Monthly(series);

        let column = ChartSpec::select(&data, &options());
        assert_eq!(column.kind, ChartKind::Column);
        assert_eq!(column.rows.len(), 12);
        assert_eq!(column.rows[6].label, "Jul");
        assert_eq!(column.rows[6].values, vec![Some(600.0)]);
        assert_eq!(column.rows[0].values, vec![None]);

        let mut line_options = options();
        line_options.monthly_style = MonthlyStyle::Line;
        assert_eq!(ChartSpec::select(&data, &line_options).kind, ChartKind::Line);
    }

    #[test]
    fn test_two_measures_dual_line() {
        let series = TimeSeries::new(vec!["day_temp".to_string(), "night_temp".to_string()]);
        let chart = ChartSpec::select(&ChartData::Monthly(series), &options());
        assert_eq!(chart.kind, ChartKind::DualLine);
        assert_eq!(chart.columns, vec!["day_temp", "night_temp"]);
        assert_eq!(chart.rows[0].values.len(), 2);
    }

    #[test]
    fn test_histogram_bins() {
        let mut stats = Statistics::new();
        stats.insert(StatKey::Band("DSM_min".to_string()), 0.0);
        stats.insert(StatKey::Band("DSM_max".to_string()), 100.0);
        stats.insert(StatKey::Bin(0), 3.0);
        stats.insert(StatKey::Bin(1), 7.0);

        let bins = histogram_bins(&stats, "DSM");
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[1].lo, 50.0);
        assert_eq!(bins[1].hi, 100.0);

        let chart = ChartSpec::select(&ChartData::Histogram(bins), &options());
        assert_eq!(chart.kind, ChartKind::Column);
        assert_eq!(chart.rows[0].label, "0-50");
        assert_eq!(chart.rows[1].values, vec![Some(7.0)]);
    }

    #[test]
    fn test_histogram_bins_missing_range() {
        assert!(histogram_bins(&Statistics::new(), "DSM").is_empty());
    }
}

//! Configuration for an area-of-interest statistics run.

use crate::display::{MarkerStyle, OutlineStyle};
use crate::pipeline::TemporalReducer;
use crate::platform::{Comparison, QualityFilter, Reducer, SourceSelector};
use crate::region::Region;
use crate::render::{
    Breaks, ChartOptions, Color, ContinuousLegend, LabelStyle, MonthlyStyle, Sampling, SeriesStyle,
};
use crate::transform::{BandTransform, ClassificationScheme, Composite, Unmapped};
use anyhow::{bail, Context};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Run name, used in logs and the report
    pub name: String,

    /// Study area
    pub study_area: StudyAreaConfig,

    /// Source collection and filters
    pub source: SourceConfig,

    /// Band transforms, applied in order to every source image
    #[serde(default)]
    pub transform: Vec<BandTransform>,

    /// How the whole collection is composited into the summary image
    #[serde(default = "default_composite")]
    pub composite: Composite,

    /// Optional monthly time series
    #[serde(default)]
    pub temporal: Option<TemporalConfig>,

    /// Region reduction of the summary image
    pub reduction: ReductionConfig,

    /// Map, legend, chart and console output
    pub display: DisplayConfig,

    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Center point and buffer radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyAreaConfig {
    pub latitude: f64,
    pub longitude: f64,

    /// Buffer radius in meters
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,

    /// Map zoom level
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

impl StudyAreaConfig {
    pub fn region(&self) -> Region {
        Region::resolve(self.latitude, self.longitude, self.radius_m)
    }
}

/// Which images to fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Collection identifier
    pub collection: String,

    /// First day included (no date filter when absent)
    #[serde(default)]
    pub start: Option<NaiveDate>,

    /// First day excluded
    #[serde(default)]
    pub end: Option<NaiveDate>,

    /// Optional image property predicate
    #[serde(default)]
    pub quality: Option<QualityFilter>,

    /// Bands to fetch (all if empty)
    #[serde(default)]
    pub bands: Vec<String>,
}

impl SourceConfig {
    /// Selector restricted to the region bounds.
    pub fn selector(&self, region: &Region) -> SourceSelector {
        SourceSelector {
            collection: self.collection.clone(),
            start: self.start,
            end: self.end,
            bounds: Some(region.bounds),
            quality: self.quality.clone(),
            bands: self.bands.clone(),
        }
    }
}

/// Monthly time series configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Per-month collection reduction
    pub reducer: TemporalReducer,

    /// Analysis year, used for the date filter and monthly time stamps
    pub year: i32,

    /// Series to extract, one per band
    pub series: Vec<SeriesConfig>,
}

/// One monthly series: the band reduced and the name it is reported under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    pub band: String,
    pub name: String,
}

/// Summary reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionConfig {
    pub reducer: Reducer,

    /// Nominal scale in meters
    pub scale_m: f64,

    /// Pixel ceiling per reduction
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,

    /// Optional histogram of one band
    #[serde(default)]
    pub histogram: Option<HistogramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramConfig {
    pub band: String,

    #[serde(default = "default_bins")]
    pub bins: usize,
}

/// Map, legend, chart and console output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Raster layers, drawn in order
    pub layers: Vec<LayerConfig>,

    /// Visualization shared by the raster layers
    pub vis: VisConfig,

    pub legend: LegendConfig,

    pub chart: ChartOptions,

    /// Console lines printed after the run
    #[serde(default)]
    pub console: Vec<ConsoleLine>,

    #[serde(default = "default_outline_name")]
    pub outline_name: String,

    #[serde(default)]
    pub outline: OutlineStyle,

    #[serde(default = "default_marker_name")]
    pub marker_name: String,

    #[serde(default)]
    pub marker: MarkerStyle,
}

/// A raster layer. `{year}` in the name is replaced by the analysis year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    pub band: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisConfig {
    pub range: RangeConfig,
    pub palette: Vec<Color>,
}

/// Visualization and legend range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeConfig {
    Fixed { min: f64, max: f64 },
    /// `<band>_min` and `<band>_max` of the summary statistics
    Statistics { band: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegendConfig {
    Categorical {
        title: String,
        scheme: ClassificationScheme,
        /// Append class areas to the labels
        #[serde(default)]
        show_areas: bool,
    },
    Continuous(ContinuousLegend),
}

/// A line printed to the console. `{year}` is replaced by the analysis year.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsoleLine {
    /// `"<label>: <value> <unit>"` from a summary statistic
    Statistic {
        label: String,
        key: String,
        #[serde(default = "default_decimals")]
        decimals: usize,
        #[serde(default)]
        unit: Option<String>,
    },
    /// The label, then one line per class with its area in hectares
    ClassAreas { label: String },
    Text { text: String },
}

/// Processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Monthly reductions in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of Tokio worker threads
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Rayon thread pool size for CPU-bound work
    #[serde(default)]
    pub rayon_threads: Option<usize>,

    /// Print a metrics summary after the run
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Optional path to save metrics JSON after run completes
    #[serde(default)]
    pub metrics_output_path: Option<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            worker_threads: None,
            rayon_threads: None,
            enable_metrics: true,
            metrics_output_path: None,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Optional path for the JSON run report
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // Try YAML first (it's a superset of JSON)
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// The analysis year: the temporal year, else the year of the source start date.
    pub fn analysis_year(&self) -> Option<i32> {
        self.temporal
            .as_ref()
            .map(|t| t.year)
            .or_else(|| self.source.start.map(|d| d.year()))
    }

    /// Move the analysis to `year`: the source date range (if any) becomes that
    /// calendar year and monthly composites are stamped with it.
    pub fn set_year(&mut self, year: i32) -> anyhow::Result<()> {
        if self.source.start.is_some() || self.source.end.is_some() {
            self.source.start = Some(year_start(year)?);
            self.source.end = Some(year_start(year + 1)?);
        }
        if let Some(temporal) = self.temporal.as_mut() {
            temporal.year = year;
        }
        Ok(())
    }

    /// The analysis year window `[Jan 1, Jan 1 of the next year)`, when monthly
    /// aggregation is on.
    fn year_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let year = self.temporal.as_ref()?.year;
        Some((year_start(year).ok()?, year_start(year + 1).ok()?))
    }

    /// Source selector for `region`. With monthly aggregation the date window is
    /// the analysis year, so months are filtered and stamped with the same year.
    pub fn selector(&self, region: &Region) -> SourceSelector {
        let mut selector = self.source.selector(region);
        if let Some((start, end)) = self.year_window() {
            selector.start = Some(start);
            selector.end = Some(end);
        }
        selector
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let area = &self.study_area;
        if !(-90.0..=90.0).contains(&area.latitude) {
            bail!("Latitude must be in [-90, 90], got {}", area.latitude);
        }
        if !(-180.0..=180.0).contains(&area.longitude) {
            bail!("Longitude must be in [-180, 180], got {}", area.longitude);
        }
        if !(area.radius_m > 0.0) {
            bail!("Radius must be > 0");
        }

        if self.source.collection.is_empty() {
            bail!("Source collection must be set");
        }
        if let (Some(start), Some(end)) = (self.source.start, self.source.end) {
            if start >= end {
                bail!("Source start {} must be before end {}", start, end);
            }
        }

        for transform in &self.transform {
            if let BandTransform::Remap { from, to, .. } = transform {
                if from.len() != to.len() {
                    bail!("Remap has {} source codes but {} targets", from.len(), to.len());
                }
            }
        }

        if !(self.reduction.scale_m > 0.0) || !self.reduction.scale_m.is_finite() {
            bail!("Reduction scale must be > 0");
        }
        if self.reduction.max_pixels == 0 {
            bail!("max_pixels must be > 0");
        }
        if let Some(histogram) = &self.reduction.histogram {
            if histogram.bins == 0 {
                bail!("Histogram needs at least one bin");
            }
        }

        if let Some(temporal) = &self.temporal {
            if temporal.series.is_empty() {
                bail!("Temporal aggregation needs at least one series");
            }
            let Some((start, end)) = self.year_window() else {
                bail!("Invalid analysis year {}", temporal.year);
            };
            let explicit = (self.source.start, self.source.end);
            if explicit != (None, None) && explicit != (Some(start), Some(end)) {
                bail!(
                    "Source window {:?}..{:?} does not match analysis year {} ({}..{})",
                    self.source.start,
                    self.source.end,
                    temporal.year,
                    start,
                    end
                );
            }
        }

        let display = &self.display;
        if display.vis.palette.is_empty() {
            bail!("Visualization palette must not be empty");
        }
        if let RangeConfig::Fixed { min, max } = display.vis.range {
            if min >= max {
                bail!("Visualization range is empty: min {} >= max {}", min, max);
            }
        }

        match &display.legend {
            LegendConfig::Categorical { scheme, .. } => {
                scheme.validate().context("Invalid classification scheme")?;
            }
            LegendConfig::Continuous(spec) => match &spec.breaks {
                Breaks::Linear { steps } if *steps == 0 => bail!("Legend needs at least one step"),
                Breaks::Explicit { values } if values.len() < 2 => {
                    bail!("Explicit legend breaks need at least two values")
                }
                _ => {}
            },
        }

        if matches!(self.reduction.reducer, Reducer::AreaByClass { .. })
            && !matches!(display.legend, LegendConfig::Categorical { .. })
        {
            bail!("Class area reduction requires a categorical legend");
        }

        if self.processing.concurrency == 0 {
            bail!("Concurrency must be > 0");
        }
        Ok(())
    }
}

fn year_start(year: i32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1).with_context(|| format!("Invalid year {}", year))
}

// Default value functions for serde
fn default_radius_m() -> f64 { 5000.0 }
fn default_zoom() -> u8 { 12 }
fn default_max_pixels() -> u64 { 1_000_000_000 }
fn default_composite() -> Composite { Composite::Mosaic }
fn default_bins() -> usize { 20 }
fn default_decimals() -> usize { 2 }
fn default_concurrency() -> usize { 4 }
fn default_true() -> bool { true }
fn default_outline_name() -> String { "Study Area".to_string() }
fn default_marker_name() -> String { "Site Location".to_string() }

/// Built-in product configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    LandCover,
    Elevation,
    Precipitation,
    Ndvi,
    LandSurfaceTemperature,
}

/// Default study area center.
pub const DEFAULT_LATITUDE: f64 = 18.5941667;
pub const DEFAULT_LONGITUDE: f64 = 73.3675;

/// Default analysis year of the presets.
pub const DEFAULT_YEAR: i32 = 2023;

const ESRI_LULC_COLLECTION: &str = "projects/sat-io/open-datasets/landcover/ESRI_Global-LULC_10m_TS";

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::LandCover,
        Preset::Elevation,
        Preset::Precipitation,
        Preset::Ndvi,
        Preset::LandSurfaceTemperature,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LandCover => "land-cover",
            Self::Elevation => "elevation",
            Self::Precipitation => "precipitation",
            Self::Ndvi => "ndvi",
            Self::LandSurfaceTemperature => "land-surface-temperature",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LandCover => "ESRI 10m land cover classes with area per class",
            Self::Elevation => "ALOS 30m elevation range and distribution",
            Self::Precipitation => "CHIRPS daily precipitation, monthly totals",
            Self::Ndvi => "Sentinel-2 NDVI, monthly means",
            Self::LandSurfaceTemperature => "MODIS day/night land surface temperature, monthly means",
        }
    }

    /// The ESRI land cover classification.
    pub fn land_cover_scheme() -> ClassificationScheme {
        ClassificationScheme {
            names: strings(&[
                "Water",
                "Trees",
                "Flooded Vegetation",
                "Crops",
                "Built Area",
                "Bare Ground",
                "Snow/Ice",
                "Clouds",
                "Rangeland",
            ]),
            colors: strings(&[
                "#1A5BAB", "#358221", "#87D19E", "#FFDB5C", "#ED022A", "#EDE9E4", "#F2FAFF", "#C8C8C8", "#C6AD8D",
            ]),
            from: vec![1, 2, 4, 5, 7, 8, 9, 10, 11],
            to: (1..=9).collect(),
        }
    }

    /// Build the configuration for this preset.
    pub fn config(&self) -> Config {
        let year_range = (year_start(DEFAULT_YEAR).ok(), year_start(DEFAULT_YEAR + 1).ok());
        let study_area = StudyAreaConfig {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            radius_m: default_radius_m(),
            zoom: default_zoom(),
        };

        let base = |source: SourceConfig, reduction: ReductionConfig, display: DisplayConfig| Config {
            name: self.name().to_string(),
            study_area: study_area.clone(),
            source,
            transform: Vec::new(),
            composite: Composite::Mosaic,
            temporal: None,
            reduction,
            display,
            processing: ProcessingConfig::default(),
            output: OutputConfig::default(),
        };

        match self {
            Self::LandCover => {
                let scheme = Self::land_cover_scheme();
                let mut config = base(
                    SourceConfig {
                        collection: ESRI_LULC_COLLECTION.to_string(),
                        start: year_range.0,
                        end: year_range.1,
                        quality: None,
                        bands: strings(&["b1"]),
                    },
                    ReductionConfig {
                        reducer: Reducer::AreaByClass {
                            class_band: "classification".to_string(),
                        },
                        scale_m: 10.0,
                        max_pixels: default_max_pixels(),
                        histogram: None,
                    },
                    DisplayConfig {
                        layers: vec![layer("{year} LULC 10m", "classification")],
                        vis: VisConfig {
                            range: RangeConfig::Fixed { min: 1.0, max: 9.0 },
                            palette: colors(&scheme.colors),
                        },
                        legend: LegendConfig::Categorical {
                            title: "Land Cover Class".to_string(),
                            scheme: scheme.clone(),
                            show_areas: false,
                        },
                        chart: chart_options("Land Cover Distribution", None, None),
                        console: vec![ConsoleLine::ClassAreas {
                            label: "Land Cover Areas (hectares):".to_string(),
                        }],
                        ..display_defaults()
                    },
                );
                config.transform = vec![scheme.transform("b1", "classification", Unmapped::Mask)];
                config
            }

            Self::Elevation => {
                let mut config = base(
                    SourceConfig {
                        collection: "JAXA/ALOS/AW3D30/V3_2".to_string(),
                        start: None,
                        end: None,
                        quality: None,
                        bands: strings(&["DSM"]),
                    },
                    ReductionConfig {
                        reducer: Reducer::MinMax,
                        scale_m: 30.0,
                        max_pixels: default_max_pixels(),
                        histogram: Some(HistogramConfig {
                            band: "DSM".to_string(),
                            bins: default_bins(),
                        }),
                    },
                    DisplayConfig {
                        layers: vec![layer("Elevation", "DSM")],
                        vis: VisConfig {
                            range: RangeConfig::Statistics {
                                band: "DSM".to_string(),
                            },
                            palette: colors(&[
                                "#006147", "#107A2F", "#4C9A25", "#92B91C", "#C7D514", "#FFED0F", "#FFC30B",
                                "#FF9B08", "#FF6405", "#FF0002",
                            ]),
                        },
                        legend: LegendConfig::Continuous(ContinuousLegend {
                            title: "Elevation (m)\n{min} - {max}".to_string(),
                            breaks: Breaks::Linear { steps: 5 },
                            sampling: Sampling::Spread,
                            labels: LabelStyle::Value { include_max: true },
                            unit: Some("m".to_string()),
                        }),
                        chart: chart_options("Elevation Distribution", Some("Elevation (m)"), Some("Count")),
                        console: vec![
                            statistic("Minimum Elevation", "DSM_min", 2, Some("m")),
                            statistic("Maximum Elevation", "DSM_max", 2, Some("m")),
                        ],
                        ..display_defaults()
                    },
                );
                config.transform = vec![BandTransform::Identity {
                    bands: strings(&["DSM"]),
                }];
                config
            }

            Self::Precipitation => {
                let mut chart = chart_options(
                    "Monthly Precipitation {year}",
                    Some("Month"),
                    Some("Precipitation (mm)"),
                );
                chart.monthly_style = MonthlyStyle::Column;
                chart.series = vec![series_style("precipitation", "#0066CC", None, None)];

                let mut config = base(
                    SourceConfig {
                        collection: "UCSB-CHG/CHIRPS/DAILY".to_string(),
                        start: year_range.0,
                        end: year_range.1,
                        quality: None,
                        bands: strings(&["precipitation"]),
                    },
                    mean_reduction(5000.0),
                    DisplayConfig {
                        layers: vec![layer("Annual Precipitation {year}", "precipitation")],
                        vis: VisConfig {
                            range: RangeConfig::Fixed { min: 0.0, max: 500.0 },
                            palette: colors(&[
                                "#FFFFFF", "#D2EFF7", "#96CCE2", "#5BA4D4", "#3E8EC4", "#2E6FAD", "#1C4C96",
                                "#0C2C7E", "#041451",
                            ]),
                        },
                        legend: LegendConfig::Continuous(ContinuousLegend {
                            title: "Annual Precipitation (mm)".to_string(),
                            breaks: Breaks::Linear { steps: 5 },
                            sampling: Sampling::Sequential,
                            labels: LabelStyle::Interval {
                                separator: " - ".to_string(),
                                decimals: None,
                            },
                            unit: Some("mm".to_string()),
                        }),
                        chart,
                        console: vec![statistic(
                            "Total Annual Precipitation",
                            "precipitation",
                            2,
                            Some("mm"),
                        )],
                        ..display_defaults()
                    },
                );
                config.composite = Composite::Sum;
                config.temporal = Some(TemporalConfig {
                    reducer: TemporalReducer::Sum,
                    year: DEFAULT_YEAR,
                    series: vec![series("precipitation", "precipitation")],
                });
                config
            }

            Self::Ndvi => {
                let mut chart = chart_options("Monthly NDVI {year}", Some("Month"), Some("NDVI"));
                chart.monthly_style = MonthlyStyle::Line;
                chart.v_range = Some([-1.0, 1.0]);
                chart.series = vec![series_style("NDVI", "#0F8755", Some(2), Some(5))];

                let palette = colors(&[
                    "#d73027", "#f46d43", "#fdae61", "#fee08b", "#ffffbf", "#d9ef8b", "#a6d96a", "#66bd63", "#1a9850",
                ]);

                let mut config = base(
                    SourceConfig {
                        collection: "COPERNICUS/S2_SR".to_string(),
                        start: year_range.0,
                        end: year_range.1,
                        quality: Some(QualityFilter {
                            property: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
                            op: Comparison::Lt,
                            threshold: 20.0,
                        }),
                        bands: strings(&["B4", "B8"]),
                    },
                    mean_reduction(10.0),
                    DisplayConfig {
                        layers: vec![layer("Annual Mean NDVI {year}", "NDVI")],
                        vis: VisConfig {
                            range: RangeConfig::Fixed { min: -0.2, max: 0.8 },
                            palette,
                        },
                        legend: LegendConfig::Continuous(ContinuousLegend {
                            title: "NDVI Values\n(Vegetation Index)".to_string(),
                            breaks: Breaks::Explicit {
                                values: vec![-0.2, 0.0, 0.2, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
                            },
                            sampling: Sampling::Sequential,
                            labels: LabelStyle::Interval {
                                separator: " to ".to_string(),
                                decimals: Some(1),
                            },
                            unit: None,
                        }),
                        chart,
                        console: vec![statistic("Mean Annual NDVI", "NDVI", 3, None)],
                        ..display_defaults()
                    },
                );
                config.transform = vec![BandTransform::NormalizedDifference {
                    band_a: "B8".to_string(),
                    band_b: "B4".to_string(),
                    output: "NDVI".to_string(),
                }];
                config.composite = Composite::Mean;
                config.temporal = Some(TemporalConfig {
                    reducer: TemporalReducer::Mean,
                    year: DEFAULT_YEAR,
                    series: vec![series("NDVI", "NDVI")],
                });
                config
            }

            Self::LandSurfaceTemperature => {
                let bands = strings(&["LST_Day_1km", "LST_Night_1km"]);
                let mut chart = chart_options(
                    "Monthly Average Land Surface Temperature {year}",
                    Some("Month"),
                    Some("Temperature (°C)"),
                );
                chart.monthly_style = MonthlyStyle::Line;
                chart.series = vec![
                    series_style("Day Temperature", "#FF4E4E", Some(2), Some(6)),
                    series_style("Night Temperature", "#4286F4", Some(2), Some(6)),
                ];

                let mut config = base(
                    SourceConfig {
                        collection: "MODIS/061/MOD11A1".to_string(),
                        start: year_range.0,
                        end: year_range.1,
                        quality: None,
                        bands: bands.clone(),
                    },
                    mean_reduction(1000.0),
                    DisplayConfig {
                        layers: vec![
                            layer("Mean Day Temperature {year}", "LST_Day_1km"),
                            layer("Mean Night Temperature {year}", "LST_Night_1km"),
                        ],
                        vis: VisConfig {
                            range: RangeConfig::Fixed { min: 0.0, max: 40.0 },
                            palette: colors(&[
                                "040274", "040281", "0502a3", "0502b8", "0502ce", "0502e6", "0602ff", "235cb1",
                                "307ef3", "269db1", "30c8e2", "32d3ef", "3be285", "3ff38f", "86e26f", "3ae237",
                                "b5e22e", "d6e21f", "fff705", "ffd611", "ffb613", "ff8b13", "ff6e08", "ff500d",
                                "ff0000",
                            ]),
                        },
                        legend: LegendConfig::Continuous(ContinuousLegend {
                            title: "Temperature (°C)".to_string(),
                            breaks: Breaks::Linear { steps: 4 },
                            sampling: Sampling::Spread,
                            labels: LabelStyle::Interval {
                                separator: " - ".to_string(),
                                decimals: None,
                            },
                            unit: Some("°C".to_string()),
                        }),
                        chart,
                        console: vec![
                            statistic("Mean Annual Day Temperature", "LST_Day_1km", 2, Some("°C")),
                            statistic("Mean Annual Night Temperature", "LST_Night_1km", 2, Some("°C")),
                            ConsoleLine::Text {
                                text: "Note: Values shown are monthly averages for {year}".to_string(),
                            },
                        ],
                        ..display_defaults()
                    },
                );
                config.transform = vec![BandTransform::Linear {
                    bands,
                    scale: 0.02,
                    offset: -273.15,
                }];
                config.composite = Composite::Mean;
                config.temporal = Some(TemporalConfig {
                    reducer: TemporalReducer::Mean,
                    year: DEFAULT_YEAR,
                    series: vec![series("LST_Day_1km", "day_temp"), series("LST_Night_1km", "night_temp")],
                });
                config
            }
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Parse preset palette literals. A typo in a built-in preset panics.
fn colors<S: AsRef<str>>(items: &[S]) -> Vec<Color> {
    items.iter().map(|c| preset_color(c.as_ref())).collect()
}

fn preset_color(hex: &str) -> Color {
    Color::parse(hex).unwrap_or_else(|e| panic!("invalid preset colour {:?}: {}", hex, e))
}

fn layer(name: &str, band: &str) -> LayerConfig {
    LayerConfig {
        name: name.to_string(),
        band: band.to_string(),
    }
}

fn series(band: &str, name: &str) -> SeriesConfig {
    SeriesConfig {
        band: band.to_string(),
        name: name.to_string(),
    }
}

fn series_style(name: &str, color: &str, line_width: Option<u32>, point_size: Option<u32>) -> SeriesStyle {
    SeriesStyle {
        name: name.to_string(),
        color: preset_color(color),
        line_width,
        point_size,
    }
}

fn statistic(label: &str, key: &str, decimals: usize, unit: Option<&str>) -> ConsoleLine {
    ConsoleLine::Statistic {
        label: label.to_string(),
        key: key.to_string(),
        decimals,
        unit: unit.map(str::to_string),
    }
}

fn mean_reduction(scale_m: f64) -> ReductionConfig {
    ReductionConfig {
        reducer: Reducer::Mean,
        scale_m,
        max_pixels: default_max_pixels(),
        histogram: None,
    }
}

fn chart_options(title: &str, h_axis: Option<&str>, v_axis: Option<&str>) -> ChartOptions {
    ChartOptions {
        title: title.to_string(),
        h_axis: h_axis.map(str::to_string),
        v_axis: v_axis.map(str::to_string),
        v_range: None,
        monthly_style: MonthlyStyle::Column,
        series: Vec::new(),
        pie_hole: 0.4,
    }
}

fn display_defaults() -> DisplayConfig {
    DisplayConfig {
        layers: Vec::new(),
        vis: VisConfig {
            range: RangeConfig::Fixed { min: 0.0, max: 1.0 },
            palette: Vec::new(),
        },
        legend: LegendConfig::Continuous(ContinuousLegend {
            title: String::new(),
            breaks: Breaks::Linear { steps: 1 },
            sampling: Sampling::Sequential,
            labels: LabelStyle::Value { include_max: false },
            unit: None,
        }),
        chart: chart_options("", None, None),
        console: Vec::new(),
        outline_name: default_outline_name(),
        outline: OutlineStyle::default(),
        marker_name: default_marker_name(),
        marker: MarkerStyle::default(),
    }
}

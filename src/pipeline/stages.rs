//! Pipeline orchestration.
//!
//! One run walks the stages strictly in order:
//!
//! ```text
//! region ─▶ source ─▶ band transform ─▶ monthly buckets ─▶ reduce ─▶ legend/chart ─▶ display
//! ```
//!
//! Monthly reductions are the only fan-out. They are issued through a bounded,
//! order-preserving stream so month 1 always lands first.

use super::metrics::{Metrics, MetricsSnapshot};
use super::temporal::{MonthlyComposite, TemporalAggregator, TimeSeries};
use crate::config::{Config, ConsoleLine, LegendConfig, RangeConfig, TemporalConfig};
use crate::display::{DisplaySink, Layer, MapView, VisParams};
use crate::platform::{ImageCollection, ImageryPlatform, ReduceRequest, Reducer, Statistics};
use crate::raster::{GridSpec, Raster};
use crate::region::Region;
use crate::render::{class_slices, histogram_bins, ChartData, ChartSpec, ClassSlice, HistogramBin, Legend};
use crate::transform::composite;
use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub name: String,
    pub region: Region,
    pub year: Option<i32>,
    /// Images that survived source selection
    pub image_count: usize,
    /// Summary reduction of the composite product
    pub summary: Statistics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub histogram: Vec<HistogramBin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<TimeSeries>,
    pub legend: Legend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    pub map: MapView,
    pub console: Vec<String>,
    pub metrics: MetricsSnapshot,
}

impl PipelineReport {
    /// Save the report as pretty JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Report saved to {}", path.display());
        Ok(())
    }
}

/// Output of the CPU-bound transform stage.
struct Products {
    collection: ImageCollection,
    product: Raster,
    months: Vec<MonthlyComposite>,
}

/// One configured run against a platform.
pub struct Pipeline<P: ImageryPlatform> {
    platform: Arc<P>,
    config: Arc<Config>,
    metrics: Arc<Metrics>,
}

impl<P: ImageryPlatform> Pipeline<P> {
    pub fn new(platform: Arc<P>, config: Config, metrics: Arc<Metrics>) -> Self {
        Self {
            platform,
            config: Arc::new(config),
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage and hand the results to `sink`.
    pub async fn run<S: DisplaySink>(&self, sink: &mut S) -> Result<PipelineReport> {
        let config = &self.config;
        let year = config.analysis_year();

        // Region
        let region = config.study_area.region();
        tracing::info!(
            "[{}] Region: center ({:.6}, {:.6}), radius {} m, bounds [{:.5}, {:.5}, {:.5}, {:.5}]",
            config.name,
            region.latitude,
            region.longitude,
            region.radius_m,
            region.bounds[0],
            region.bounds[1],
            region.bounds[2],
            region.bounds[3]
        );

        // Source
        let selector = config.selector(&region);
        let fetch_start = Instant::now();
        let collection = self.platform.fetch_collection(&selector).await?;
        self.metrics.add_fetch_time(fetch_start.elapsed());
        tracing::info!("[{}] Selected {} images from {}", config.name, collection.len(), selector.collection);
        if collection.is_empty() {
            tracing::warn!("[{}] No images matched, statistics will report no data", config.name);
        }

        // Band transform, composite and monthly buckets
        let transform_start = Instant::now();
        let products = {
            let config = config.clone();
            let region = region.clone();
            tokio::task::spawn_blocking(move || build_products(&config, collection, &region)).await??
        };
        self.metrics.add_transform_time(transform_start.elapsed());
        let image_count = products.collection.len();

        // Reduce
        let summary = self.reduce(&products.product, &region, config.reduction.reducer.clone()).await?;
        tracing::info!("[{}] Summary: {} statistics", config.name, summary.len());

        let histogram = match &config.reduction.histogram {
            Some(h) => {
                let reducer = Reducer::Histogram {
                    band: h.band.clone(),
                    bins: h.bins,
                };
                let stats = self.reduce(&products.product, &region, reducer).await?;
                histogram_bins(&stats, &h.band)
            }
            None => Vec::new(),
        };

        let series = match &config.temporal {
            Some(temporal) => Some(self.monthly_series(temporal, &products.months, &region).await?),
            None => None,
        };

        // Legend and chart
        let range = resolve_range(&config.display.vis.range, &summary);
        let legend = self.build_legend(&summary, range)?;
        let slices = match &config.display.legend {
            LegendConfig::Categorical { scheme, .. } => Some(class_slices(scheme, &summary)?),
            LegendConfig::Continuous(_) => None,
        };
        let chart = self.build_chart(series.as_ref(), slices.as_deref(), &histogram, year);

        // Display
        let map = self.build_map(&region, range, legend.clone(), year);
        let console = self.console_lines(&summary, slices.as_deref(), year);

        sink.show_map(&map)?;
        if let Some(chart) = &chart {
            sink.show_chart(chart)?;
        }
        for line in &console {
            sink.print_line(line)?;
        }

        Ok(PipelineReport {
            name: config.name.clone(),
            region,
            year,
            image_count,
            summary,
            histogram,
            series,
            legend,
            chart,
            map,
            console,
            metrics: self.metrics.snapshot(),
        })
    }

    async fn reduce(&self, image: &Raster, region: &Region, reducer: Reducer) -> Result<Statistics> {
        let request = ReduceRequest {
            region: region.clone(),
            reducer,
            scale_m: self.config.reduction.scale_m,
            max_pixels: self.config.reduction.max_pixels,
        };
        Ok(self.platform.reduce_region(image, &request).await?)
    }

    /// Reduce every non-empty month to one mean per series.
    async fn monthly_series(
        &self,
        temporal: &TemporalConfig,
        months: &[MonthlyComposite],
        region: &Region,
    ) -> Result<TimeSeries> {
        let mut series = TimeSeries::new(temporal.series.iter().map(|s| s.name.clone()).collect());
        let request = ReduceRequest {
            region: region.clone(),
            reducer: Reducer::Mean,
            scale_m: self.config.reduction.scale_m,
            max_pixels: self.config.reduction.max_pixels,
        };

        for month in months.iter().filter(|m| m.raster.bands.is_empty()) {
            tracing::warn!("Month {:02} has no images", month.month);
            self.metrics.add_empty_month();
        }

        let request = &request;
        let results: Vec<(u32, Statistics)> = stream::iter(months.iter().filter(|m| !m.raster.bands.is_empty()))
            .map(|month| async move {
                let stats = self.platform.reduce_region(&month.raster, request).await?;
                tracing::debug!("Month {:02}: {} images, {} statistics", month.month, month.image_count, stats.len());
                Ok::<_, anyhow::Error>((month.month, stats))
            })
            .buffered(self.config.processing.concurrency.max(1))
            .try_collect()
            .await?;

        for (month, stats) in results {
            for s in &temporal.series {
                series.set(month, &s.name, stats.band(&s.band));
            }
        }
        Ok(series)
    }

    fn build_legend(&self, summary: &Statistics, range: Option<(f64, f64)>) -> Result<Legend> {
        let display = &self.config.display;
        let legend = match &display.legend {
            LegendConfig::Categorical {
                title,
                scheme,
                show_areas,
            } => Legend::categorical(title.clone(), scheme, show_areas.then_some(summary))?,
            LegendConfig::Continuous(spec) => match range {
                Some((min, max)) => Legend::continuous(spec, &display.vis.palette, min, max)?,
                None => {
                    tracing::warn!("No range for legend '{}', rendering it empty", spec.title);
                    let title: Vec<&str> = spec.title.lines().filter(|l| !l.contains('{')).collect();
                    Legend::empty(title.join("\n"))
                }
            },
        };
        Ok(legend)
    }

    fn build_chart(
        &self,
        series: Option<&TimeSeries>,
        slices: Option<&[ClassSlice]>,
        histogram: &[HistogramBin],
        year: Option<i32>,
    ) -> Option<ChartSpec> {
        let data = if let Some(series) = series {
            ChartData::Monthly(series.clone())
        } else if let (Some(slices), Reducer::AreaByClass { .. }) = (slices, &self.config.reduction.reducer) {
            ChartData::ClassBreakdown(slices.to_vec())
        } else if self.config.reduction.histogram.is_some() {
            ChartData::Histogram(histogram.to_vec())
        } else {
            return None;
        };

        let mut options = self.config.display.chart.clone();
        options.title = expand_year(&options.title, year);
        Some(ChartSpec::select(&data, &options))
    }

    fn build_map(&self, region: &Region, range: Option<(f64, f64)>, legend: Legend, year: Option<i32>) -> MapView {
        let display = &self.config.display;
        let mut map = MapView::new(region, self.config.study_area.zoom);

        match range {
            Some((min, max)) => {
                for layer in &display.layers {
                    map.add_layer(Layer::Raster {
                        name: expand_year(&layer.name, year),
                        band: layer.band.clone(),
                        vis: VisParams {
                            min,
                            max,
                            palette: display.vis.palette.clone(),
                        },
                    });
                }
            }
            None => tracing::warn!("No visualization range, raster layers omitted"),
        }

        map.add_layer(Layer::Outline {
            name: display.outline_name.clone(),
            bounds: region.bounds,
            style: display.outline.clone(),
        });
        map.add_layer(Layer::Marker {
            name: display.marker_name.clone(),
            position: [region.longitude, region.latitude],
            style: display.marker.clone(),
        });
        map.add_overlay(legend);
        map
    }

    fn console_lines(&self, summary: &Statistics, slices: Option<&[ClassSlice]>, year: Option<i32>) -> Vec<String> {
        let mut lines = Vec::new();
        for line in &self.config.display.console {
            match line {
                ConsoleLine::Statistic {
                    label,
                    key,
                    decimals,
                    unit,
                } => {
                    let text = match summary.band(key).filter(|v| v.is_finite()) {
                        Some(v) => match unit {
                            Some(unit) => format!("{}: {:.*} {}", label, *decimals, v, unit),
                            None => format!("{}: {:.*}", label, *decimals, v),
                        },
                        None => format!("{}: no data", label),
                    };
                    lines.push(text);
                }
                ConsoleLine::ClassAreas { label } => {
                    lines.push(label.clone());
                    match slices {
                        Some(slices) if !slices.is_empty() => {
                            lines.extend(slices.iter().map(|s| format!("  {}: {:.2} ha", s.name, s.hectares)));
                        }
                        _ => lines.push("  no data".to_string()),
                    }
                }
                ConsoleLine::Text { text } => lines.push(expand_year(text, year)),
            }
        }
        lines
    }
}

/// Apply band transforms, composite the collection and bucket it by month.
fn build_products(config: &Config, collection: ImageCollection, region: &Region) -> Result<Products> {
    let collection = collection.try_map(|image| {
        config
            .transform
            .iter()
            .try_fold(image.clone(), |raster, transform| transform.apply(&raster))
    })?;

    let grid = target_grid(&collection, region, config.reduction.scale_m);
    tracing::debug!("Target grid {}x{} over {:?}", grid.width, grid.height, grid.bounds);

    let product = composite(&collection, config.composite, &grid)?.clip(region);

    let months = match &config.temporal {
        Some(temporal) => {
            TemporalAggregator::new(temporal.reducer, temporal.year).aggregate(&collection, &grid)?
        }
        None => Vec::new(),
    };

    Ok(Products {
        collection,
        product,
        months,
    })
}

/// The shared grid when every image has one, otherwise a grid over the region
/// at the finest native resolution (or the nominal scale when there are no images).
fn target_grid(collection: &ImageCollection, region: &Region, scale_m: f64) -> GridSpec {
    if let Some(first) = collection.images.first() {
        if collection.images.iter().all(|img| img.grid == first.grid) {
            return first.grid.clone();
        }
    }
    let native = collection
        .images
        .iter()
        .map(|img| img.grid.resolution_m())
        .fold(f64::INFINITY, f64::min);
    let resolution = if native.is_finite() && native > 0.0 { native } else { scale_m };
    GridSpec::covering(region.bounds, resolution)
}

fn resolve_range(range: &RangeConfig, summary: &Statistics) -> Option<(f64, f64)> {
    match range {
        RangeConfig::Fixed { min, max } => Some((*min, *max)),
        RangeConfig::Statistics { band } => {
            let min = summary.band(&format!("{}_min", band))?;
            let max = summary.band(&format!("{}_max", band))?;
            Some((min, max))
        }
    }
}

fn expand_year(text: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => text.replace("{year}", &year.to_string()),
        None => text.replace("{year}", "").trim().to_string(),
    }
}

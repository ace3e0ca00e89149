//! Study-area raster statistics
//!
//! Resolves a circular study area, selects imagery from a platform, derives a
//! thematic band, reduces it over the area and renders the results as a map with
//! legend, a chart and console lines.
//!
//! # Architecture
//!
//! - **Region**: center point plus buffer radius, and its bounding box
//! - **Platform**: image selection and region reduction behind [`ImageryPlatform`]
//! - **Transform**: remap, linear scaling, normalized difference and compositing
//! - **Pipeline**: stage orchestration, monthly aggregation and metrics
//! - **Render**: palettes, legends and chart selection
//! - **Display**: map composition and output sinks
//!
//! # Usage
//!
//! ```no_run
//! use aoi_stats::{run_pipeline, Catalog, Preset};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = Catalog::from_file("catalog.json".as_ref())?;
//!     let report = run_pipeline(Preset::Precipitation.config(), &catalog).await?;
//!     println!("{} images", report.image_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod platform;
pub mod raster;
pub mod region;
pub mod render;
pub mod transform;

pub use config::{Config, Preset};
pub use display::{ConsoleSink, DisplaySink, MapView, RecordingSink};
pub use error::{LegendError, PlatformError, SchemeError};
pub use pipeline::{Metrics, Pipeline, PipelineReport, TimeSeries};
pub use platform::{Catalog, ImageCollection, ImageryPlatform, MemoryPlatform, Reducer, Statistics};
pub use raster::{Band, GridSpec, Raster};
pub use region::Region;

use anyhow::Result;
use std::sync::Arc;

/// Run the full pipeline against an in-memory catalog, printing to stdout.
pub async fn run_pipeline(config: Config, catalog: &Catalog) -> Result<PipelineReport> {
    config.validate()?;

    tracing::info!("Starting pipeline '{}'", config.name);
    tracing::info!("Catalog holds {} collections", catalog.collections.len());

    let metrics = Metrics::new();
    let platform = Arc::new(MemoryPlatform::from_catalog(catalog)?.with_metrics(metrics.clone()));

    let enable_metrics = config.processing.enable_metrics;
    let metrics_path = config.processing.metrics_output_path.clone();
    let report_path = config.output.report_path.clone();

    let pipeline = Pipeline::new(platform, config, metrics.clone());
    let mut sink = ConsoleSink::stdout();
    let report = pipeline.run(&mut sink).await?;

    let snapshot = metrics.snapshot();
    tracing::info!("Pipeline complete: {}", snapshot);
    if enable_metrics {
        snapshot.print_summary();
    }
    if let Some(path) = metrics_path {
        snapshot.save_to_file(&path)?;
    }
    if let Some(path) = report_path {
        report.save_to_file(&path)?;
    }

    Ok(report)
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}

/// Initialize the Rayon thread pool used by the band kernels.
pub fn init_rayon(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}

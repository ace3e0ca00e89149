//! In-process imagery platform backed by a catalog of images.
//!
//! Used by the CLI (catalog loaded from a YAML or JSON file) and by tests (catalog
//! built in code). Reductions run on the blocking pool so the caller awaits them
//! exactly like a remote evaluation.

use super::{reduce_raster, ImageCollection, ImageryPlatform, ReduceRequest, SourceSelector, Statistics};
use crate::error::PlatformError;
use crate::pipeline::Metrics;
use crate::raster::{Band, GridSpec, Raster};
use crate::region::{intersect_bounds, Bounds};
use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Serialized catalog: collections of images with inline band data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub collections: Vec<CatalogCollection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCollection {
    /// Collection identifier
    pub id: String,

    #[serde(default)]
    pub images: Vec<CatalogImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogImage {
    /// Image identifier
    pub id: String,

    /// Acquisition date
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Scalar image properties
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,

    /// Image bounds [min_lon, min_lat, max_lon, max_lat]
    pub bounds: Bounds,

    /// Width in pixels
    pub width: usize,

    /// Height in pixels
    pub height: usize,

    /// Band name -> row-major values (height * width)
    pub bands: BTreeMap<String, Vec<f64>>,

    /// Value to treat as masked
    #[serde(default)]
    pub nodata: Option<f64>,
}

impl CatalogImage {
    fn to_raster(&self) -> Result<Raster, PlatformError> {
        let grid = GridSpec::new(self.bounds, self.width, self.height);
        let mut raster = Raster::empty(self.id.clone(), grid);
        raster.date = self.date;
        raster.properties = self.properties.clone();

        for (name, values) in &self.bands {
            let expected = self.width * self.height;
            if values.len() != expected {
                return Err(PlatformError::ShapeMismatch {
                    image: self.id.clone(),
                    band: name.clone(),
                    expected,
                    actual: values.len(),
                });
            }
            let mut data = Array2::from_shape_vec((self.height, self.width), values.clone())
                .map_err(|e| PlatformError::Catalog(e.to_string()))?;
            if let Some(nodata) = self.nodata {
                data.mapv_inplace(|v| if v == nodata { f64::NAN } else { v });
            }
            raster
                .add_band(Band::new(name.clone(), data))
                .map_err(|e| PlatformError::Catalog(e.to_string()))?;
        }

        Ok(raster)
    }
}

impl Catalog {
    /// Load a catalog from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let catalog: Catalog = match ext {
            "json" => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };
        Ok(catalog)
    }
}

/// Imagery platform over in-memory collections.
#[derive(Default)]
pub struct MemoryPlatform {
    collections: HashMap<String, Vec<Raster>>,
    metrics: Option<Arc<Metrics>>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a deserialized catalog, validating every image.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, PlatformError> {
        let mut platform = Self::new();
        for collection in &catalog.collections {
            let images = collection
                .images
                .iter()
                .map(CatalogImage::to_raster)
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!("Loaded collection {} ({} images)", collection.id, images.len());
            platform.collections.insert(collection.id.clone(), images);
        }
        Ok(platform)
    }

    /// Attach a metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register images under a collection id (appends).
    pub fn insert(&mut self, collection: impl Into<String>, images: Vec<Raster>) {
        self.collections.entry(collection.into()).or_default().extend(images);
    }

    pub fn collection_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.collections.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn select(&self, selector: &SourceSelector) -> Result<ImageCollection, PlatformError> {
        let images = self
            .collections
            .get(&selector.collection)
            .ok_or_else(|| PlatformError::UnknownCollection(selector.collection.clone()))?;

        let mut selected = Vec::new();
        let mut rejected = 0u64;
        for image in images {
            let in_range = selector.in_range(image.date);
            let in_bounds = selector
                .bounds
                .map_or(true, |b| intersect_bounds(&b, &image.grid.bounds).is_some());
            let passes_quality = selector.quality.as_ref().map_or(true, |q| q.accepts(image));

            if in_range && in_bounds && passes_quality {
                let image = if selector.bands.is_empty() {
                    image.clone()
                } else {
                    image.select(&selector.bands)
                };
                selected.push(image);
            } else {
                rejected += 1;
            }
        }

        if let Some(ref m) = self.metrics {
            m.add_images_fetched(selected.len() as u64);
            m.add_images_rejected(rejected);
        }

        tracing::debug!(
            "Selected {} of {} images from {} ({} rejected)",
            selected.len(),
            images.len(),
            selector.collection,
            rejected
        );

        Ok(ImageCollection::new(selector.collection.clone(), selected))
    }
}

impl ImageryPlatform for MemoryPlatform {
    async fn fetch_collection(&self, selector: &SourceSelector) -> Result<ImageCollection, PlatformError> {
        self.select(selector)
    }

    async fn reduce_region(&self, image: &Raster, request: &ReduceRequest) -> Result<Statistics, PlatformError> {
        let image = image.clone();
        let request = request.clone();
        let metrics = self.metrics.clone();

        // CPU-bound work in spawn_blocking
        let outcome = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let result = reduce_raster(&image, &request);
            if let Some(ref m) = metrics {
                m.add_reduce_time(start.elapsed());
            }
            result
        })
        .await
        .map_err(|e| PlatformError::Join(e.to_string()))??;

        if let Some(ref m) = self.metrics {
            m.add_reduction();
            m.add_pixels_reduced(outcome.pixels);
        }

        Ok(outcome.statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Comparison, QualityFilter, Reducer};
    use crate::region::Region;

    const CATALOG_YAML: &str = r#"
collections:
  - id: TEST/COLLECTION
    images:
      - id: a
        date: 2023-03-01
        properties: { CLOUDY_PIXEL_PERCENTAGE: 5 }
        bounds: [0.0, 0.0, 1.0, 1.0]
        width: 2
        height: 2
        nodata: -9999
        bands:
          B4: [1, 2, 3, -9999]
      - id: b
        date: 2024-01-01
        bounds: [0.0, 0.0, 1.0, 1.0]
        width: 2
        height: 2
        bands:
          B4: [1, 1, 1, 1]
"#;

    fn selector() -> SourceSelector {
        SourceSelector {
            collection: "TEST/COLLECTION".to_string(),
            start: NaiveDate::from_ymd_opt(2023, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 1),
            bounds: None,
            quality: None,
            bands: vec![],
        }
    }

    #[test]
    fn test_catalog_from_yaml() {
        let catalog: Catalog = serde_yaml::from_str(CATALOG_YAML).unwrap();
        let platform = MemoryPlatform::from_catalog(&catalog).unwrap();
        assert_eq!(platform.collection_ids(), vec!["TEST/COLLECTION"]);

        let image = &platform.collections["TEST/COLLECTION"][0];
        assert!(image.band("B4").unwrap().data[[1, 1]].is_nan());
    }

    #[test]
    fn test_catalog_shape_mismatch() {
        let yaml = CATALOG_YAML.replace("B4: [1, 1, 1, 1]", "B4: [1, 1, 1]");
        let catalog: Catalog = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(
            MemoryPlatform::from_catalog(&catalog),
            Err(PlatformError::ShapeMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_catalog_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, CATALOG_YAML).unwrap();
        let catalog = Catalog::from_file(&path).unwrap();
        assert_eq!(catalog.collections[0].images.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_filters_dates_and_quality() {
        let catalog: Catalog = serde_yaml::from_str(CATALOG_YAML).unwrap();
        let metrics = Metrics::new();
        let platform = MemoryPlatform::from_catalog(&catalog)
            .unwrap()
            .with_metrics(metrics.clone());

        let collection = platform.fetch_collection(&selector()).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.images[0].id, "a");

        let mut strict = selector();
        strict.quality = Some(QualityFilter {
            property: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
            op: Comparison::Lt,
            threshold: 1.0,
        });
        let collection = platform.fetch_collection(&strict).await.unwrap();
        assert!(collection.is_empty());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.images_fetched, 1);
        assert_eq!(snapshot.images_rejected, 3);
    }

    #[tokio::test]
    async fn test_fetch_unknown_collection() {
        let platform = MemoryPlatform::new();
        let result = platform.fetch_collection(&selector()).await;
        assert!(matches!(result, Err(PlatformError::UnknownCollection(_))));
    }

    #[tokio::test]
    async fn test_fetch_bounds_filter() {
        let catalog: Catalog = serde_yaml::from_str(CATALOG_YAML).unwrap();
        let platform = MemoryPlatform::from_catalog(&catalog).unwrap();
        let mut far = selector();
        far.bounds = Some([10.0, 10.0, 11.0, 11.0]);
        assert!(platform.fetch_collection(&far).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reduce_region_propagates_ceiling() {
        let catalog: Catalog = serde_yaml::from_str(CATALOG_YAML).unwrap();
        let platform = MemoryPlatform::from_catalog(&catalog).unwrap();
        let image = platform.collections["TEST/COLLECTION"][1].clone();

        let request = ReduceRequest {
            region: Region::resolve(0.5, 0.5, 100_000.0),
            reducer: Reducer::Mean,
            scale_m: 10.0,
            max_pixels: 1,
        };
        let result = platform.reduce_region(&image, &request).await;
        assert!(matches!(result, Err(PlatformError::TooManyPixels { .. })));
    }
}

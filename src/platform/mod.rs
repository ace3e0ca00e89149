//! Imagery platform capability: source selection and region reduction.
//!
//! The pipeline never talks to a concrete backend. It consumes two calls:
//!
//! - [`ImageryPlatform::fetch_collection`]: (collection id, date range, bounds,
//!   quality predicate) → image collection
//! - [`ImageryPlatform::reduce_region`]: (image, region, reducer, scale, pixel
//!   ceiling) → statistics, delivered once through a future
//!
//! [`MemoryPlatform`] implements both in-process.

mod memory;
mod reducer;
mod statistics;

pub use memory::{Catalog, CatalogCollection, CatalogImage, MemoryPlatform};
pub use reducer::{reduce_raster, ReductionOutcome};
pub use statistics::{StatKey, Statistics};

use crate::error::PlatformError;
use crate::raster::Raster;
use crate::region::{Bounds, Region};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Comparison used by a [`QualityFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    pub fn test(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Lt => value < threshold,
            Self::Le => value <= threshold,
            Self::Gt => value > threshold,
            Self::Ge => value >= threshold,
            Self::Eq => value == threshold,
        }
    }
}

/// Scalar predicate on an image property, e.g. `CLOUDY_PIXEL_PERCENTAGE < 20`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFilter {
    pub property: String,
    pub op: Comparison,
    pub threshold: f64,
}

impl QualityFilter {
    /// Images without the property never pass.
    pub fn accepts(&self, image: &Raster) -> bool {
        image
            .properties
            .get(&self.property)
            .is_some_and(|v| self.op.test(*v, self.threshold))
    }
}

/// Which images to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSelector {
    /// Collection identifier (e.g. `UCSB-CHG/CHIRPS/DAILY`)
    pub collection: String,

    /// First day included
    #[serde(default)]
    pub start: Option<NaiveDate>,

    /// First day excluded
    #[serde(default)]
    pub end: Option<NaiveDate>,

    /// Only images intersecting these bounds
    #[serde(default)]
    pub bounds: Option<Bounds>,

    /// Optional image property predicate
    #[serde(default)]
    pub quality: Option<QualityFilter>,

    /// Bands to keep (all if empty)
    #[serde(default)]
    pub bands: Vec<String>,
}

impl SourceSelector {
    /// Whether an acquisition date falls in `[start, end)`.
    ///
    /// Without a date range every image matches; with one, undated images never do.
    pub fn in_range(&self, date: Option<NaiveDate>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        date.is_some_and(|d| self.start.map_or(true, |s| d >= s) && self.end.map_or(true, |e| d < e))
    }
}

/// Spatial aggregation operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reducer {
    /// Sum of each band
    Sum,
    /// Mean of each band
    Mean,
    /// `<band>_min` and `<band>_max` for each band
    MinMax,
    /// Pixel area (m²) summed per class value of `class_band`
    AreaByClass { class_band: String },
    /// Pixel counts of `band` in `bins` equal-width bins between its min and max
    Histogram { band: String, bins: usize },
}

/// Everything a region reduction needs besides the image.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceRequest {
    pub region: Region,
    pub reducer: Reducer,
    /// Nominal pixel size in meters
    pub scale_m: f64,
    /// Pixel ceiling; exceeding it aborts the reduction
    pub max_pixels: u64,
}

/// An ordered list of images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageCollection {
    pub id: String,
    pub images: Vec<Raster>,
}

impl ImageCollection {
    pub fn new(id: impl Into<String>, images: Vec<Raster>) -> Self {
        Self {
            id: id.into(),
            images,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images acquired in the given calendar month (any year).
    pub fn filter_month(&self, month: u32) -> Self {
        let images = self
            .images
            .iter()
            .filter(|img| img.date.is_some_and(|d| d.month() == month))
            .cloned()
            .collect();
        Self {
            id: format!("{}[month={}]", self.id, month),
            images,
        }
    }

    /// Apply a fallible function to each image.
    pub fn try_map<F>(&self, f: F) -> anyhow::Result<Self>
    where
        F: Fn(&Raster) -> anyhow::Result<Raster>,
    {
        let images = self.images.iter().map(f).collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            id: self.id.clone(),
            images,
        })
    }

    /// Keep only the named bands in every image.
    pub fn select(&self, bands: &[String]) -> Self {
        Self {
            id: self.id.clone(),
            images: self.images.iter().map(|img| img.select(bands)).collect(),
        }
    }
}

/// Remote imagery platform contract.
///
/// Each returned future resolves exactly once. There is no retry, timeout or
/// cancellation policy at this level.
pub trait ImageryPlatform: Send + Sync {
    /// Fetch the images matching a selector.
    fn fetch_collection(
        &self,
        selector: &SourceSelector,
    ) -> impl Future<Output = Result<ImageCollection, PlatformError>> + Send;

    /// Reduce an image over a region.
    fn reduce_region(
        &self,
        image: &Raster,
        request: &ReduceRequest,
    ) -> impl Future<Output = Result<Statistics, PlatformError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GridSpec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_quality_filter() {
        let filter = QualityFilter {
            property: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
            op: Comparison::Lt,
            threshold: 20.0,
        };
        let grid = GridSpec::new([0.0, 0.0, 1.0, 1.0], 1, 1);
        let clear = Raster::empty("a", grid.clone()).with_property("CLOUDY_PIXEL_PERCENTAGE", 5.0);
        let cloudy = Raster::empty("b", grid.clone()).with_property("CLOUDY_PIXEL_PERCENTAGE", 20.0);
        let unknown = Raster::empty("c", grid);

        assert!(filter.accepts(&clear));
        assert!(!filter.accepts(&cloudy));
        assert!(!filter.accepts(&unknown));
    }

    #[test]
    fn test_selector_range_is_half_open() {
        let selector = SourceSelector {
            collection: "c".to_string(),
            start: Some(date(2023, 1, 1)),
            end: Some(date(2024, 1, 1)),
            bounds: None,
            quality: None,
            bands: vec![],
        };
        assert!(selector.in_range(Some(date(2023, 1, 1))));
        assert!(selector.in_range(Some(date(2023, 12, 31))));
        assert!(!selector.in_range(Some(date(2024, 1, 1))));
        assert!(!selector.in_range(None));
    }

    #[test]
    fn test_selector_without_range_accepts_undated() {
        let selector = SourceSelector {
            collection: "c".to_string(),
            start: None,
            end: None,
            bounds: None,
            quality: None,
            bands: vec![],
        };
        assert!(selector.in_range(None));
        assert!(selector.in_range(Some(date(2001, 6, 1))));
    }

    #[test]
    fn test_filter_month() {
        let grid = GridSpec::new([0.0, 0.0, 1.0, 1.0], 1, 1);
        let collection = ImageCollection::new(
            "c",
            vec![
                Raster::empty("jan", grid.clone()).with_date(date(2023, 1, 5)),
                Raster::empty("feb", grid.clone()).with_date(date(2023, 2, 5)),
                Raster::empty("jan2", grid.clone()).with_date(date(2022, 1, 9)),
                Raster::empty("undated", grid),
            ],
        );
        let january = collection.filter_month(1);
        assert_eq!(january.len(), 2);
        assert!(collection.filter_month(7).is_empty());
    }

    #[test]
    fn test_reducer_serde() {
        let reducer: Reducer = serde_yaml::from_str("kind: area_by_class\nclass_band: class\n").unwrap();
        assert_eq!(
            reducer,
            Reducer::AreaByClass {
                class_band: "class".to_string()
            }
        );
        let reducer: Reducer = serde_yaml::from_str("kind: min_max\n").unwrap();
        assert_eq!(reducer, Reducer::MinMax);
    }
}

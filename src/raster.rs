//! In-memory raster model.
//!
//! Rasters live on a regular WGS84 grid. Each band is a `(height, width)` array of
//! `f64` where `NaN` marks a masked pixel. Row 0 is the northern edge.

use crate::region::{Bounds, Region};
use anyhow::{bail, Result};
use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Regular lon/lat grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Grid bounds [min_lon, min_lat, max_lon, max_lat]
    pub bounds: Bounds,

    /// Width in pixels
    pub width: usize,

    /// Height in pixels
    pub height: usize,
}

impl GridSpec {
    pub fn new(bounds: Bounds, width: usize, height: usize) -> Self {
        Self { bounds, width, height }
    }

    /// Build a grid covering `bounds` at roughly `resolution_m` meters per pixel.
    pub fn covering(bounds: Bounds, resolution_m: f64) -> Self {
        let mid_lat = (bounds[1] + bounds[3]) / 2.0;
        let deg_lat = resolution_m / meters_per_degree_lat();
        let deg_lon = resolution_m / meters_per_degree_lon(mid_lat);
        let width = (((bounds[2] - bounds[0]) / deg_lon).ceil() as usize).max(1);
        let height = (((bounds[3] - bounds[1]) / deg_lat).ceil() as usize).max(1);
        Self::new(bounds, width, height)
    }

    /// Pixel width in degrees of longitude.
    pub fn pixel_width_deg(&self) -> f64 {
        (self.bounds[2] - self.bounds[0]) / self.width as f64
    }

    /// Pixel height in degrees of latitude.
    pub fn pixel_height_deg(&self) -> f64 {
        (self.bounds[3] - self.bounds[1]) / self.height as f64
    }

    /// Convert pixel coordinates to world coordinates.
    ///
    /// Takes (column, row) and returns (lon, lat). Row 0 is the northern edge.
    #[inline]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let lon = self.bounds[0] + col * self.pixel_width_deg();
        let lat = self.bounds[3] - row * self.pixel_height_deg();
        (lon, lat)
    }

    /// Convert world coordinates to pixel coordinates.
    ///
    /// Returns (column, row) as floating point for sub-pixel precision.
    #[inline]
    pub fn world_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let col = (lon - self.bounds[0]) / self.pixel_width_deg();
        let row = (self.bounds[3] - lat) / self.pixel_height_deg();
        (col, row)
    }

    /// Center of pixel (row, col) as (lon, lat).
    #[inline]
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Approximate native resolution in meters, measured at the grid's mid latitude.
    ///
    /// Uses the coarser of the two axes.
    pub fn resolution_m(&self) -> f64 {
        let mid_lat = (self.bounds[1] + self.bounds[3]) / 2.0;
        let x = self.pixel_width_deg() * meters_per_degree_lon(mid_lat);
        let y = self.pixel_height_deg() * meters_per_degree_lat();
        x.max(y)
    }

    /// Area in square meters of one pixel in `row`.
    ///
    /// Exact for a spherical Earth: `R² · Δλ · (sin φ₂ − sin φ₁)`.
    pub fn pixel_area_m2(&self, row: usize) -> f64 {
        let (_, north) = self.pixel_to_world(0.0, row as f64);
        let (_, south) = self.pixel_to_world(0.0, row as f64 + 1.0);
        let d_lon = self.pixel_width_deg().to_radians();
        EARTH_RADIUS_M * EARTH_RADIUS_M * d_lon * (north.to_radians().sin() - south.to_radians().sin()).abs()
    }

    /// Number of pixels in the grid.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn meters_per_degree_lat() -> f64 {
    EARTH_RADIUS_M * std::f64::consts::PI / 180.0
}

fn meters_per_degree_lon(lat: f64) -> f64 {
    meters_per_degree_lat() * lat.to_radians().cos()
}

/// A single named channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub data: Array2<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self { name: name.into(), data }
    }

    /// Count of unmasked pixels.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// A multi-band image on a [`GridSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Image identifier
    pub id: String,

    /// Pixel grid
    pub grid: GridSpec,

    /// Bands in order
    pub bands: Vec<Band>,

    /// Acquisition date (`system:time_start`)
    pub date: Option<NaiveDate>,

    /// Scalar image properties (e.g. `CLOUDY_PIXEL_PERCENTAGE`)
    pub properties: BTreeMap<String, f64>,
}

impl Raster {
    /// Create a band-less raster on a grid.
    pub fn empty(id: impl Into<String>, grid: GridSpec) -> Self {
        Self {
            id: id.into(),
            grid,
            bands: Vec::new(),
            date: None,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style date setter.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: f64) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Add a band, replacing any band with the same name.
    pub fn add_band(&mut self, band: Band) -> Result<()> {
        let (h, w) = band.data.dim();
        if h != self.grid.height || w != self.grid.width {
            bail!(
                "Band '{}' is {}x{} but raster '{}' grid is {}x{}",
                band.name,
                w,
                h,
                self.id,
                self.grid.width,
                self.grid.height
            );
        }
        if let Some(existing) = self.bands.iter_mut().find(|b| b.name == band.name) {
            *existing = band;
        } else {
            self.bands.push(band);
        }
        Ok(())
    }

    /// Builder-style band adder.
    pub fn with_band(mut self, band: Band) -> Result<Self> {
        self.add_band(band)?;
        Ok(self)
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.band(name).is_some()
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    /// Keep only the named bands, in the requested order. Absent names are skipped.
    pub fn select(&self, names: &[String]) -> Self {
        let bands = names
            .iter()
            .filter_map(|name| self.band(name).cloned())
            .collect();
        Self {
            bands,
            ..self.clone_meta()
        }
    }

    /// Rename a band in place. Returns false if the band is absent.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        match self.bands.iter_mut().find(|b| b.name == from) {
            Some(band) => {
                band.name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Mask every pixel whose center lies outside the region.
    pub fn clip(&self, region: &Region) -> Self {
        let mut clipped = self.clone();
        for band in &mut clipped.bands {
            for ((row, col), value) in band.data.indexed_iter_mut() {
                let (lon, lat) = self.grid.pixel_center(row, col);
                if !region.contains(lon, lat) {
                    *value = f64::NAN;
                }
            }
        }
        clipped
    }

    /// Resample onto another grid by nearest neighbour. Target pixels whose
    /// center falls outside this raster are masked.
    pub fn resample_nearest(&self, grid: &GridSpec) -> Self {
        let mut out = Self {
            grid: grid.clone(),
            ..self.clone_meta()
        };
        for band in &self.bands {
            let data = Array2::from_shape_fn((grid.height, grid.width), |(row, col)| {
                let (lon, lat) = grid.pixel_center(row, col);
                let (src_col, src_row) = self.grid.world_to_pixel(lon, lat);
                if src_col < 0.0 || src_row < 0.0 {
                    return f64::NAN;
                }
                let (src_col, src_row) = (src_col as usize, src_row as usize);
                if src_col >= self.grid.width || src_row >= self.grid.height {
                    return f64::NAN;
                }
                band.data[[src_row, src_col]]
            });
            out.bands.push(Band::new(band.name.clone(), data));
        }
        out
    }

    /// Copy everything except the band data.
    pub fn clone_meta(&self) -> Self {
        Self {
            id: self.id.clone(),
            grid: self.grid.clone(),
            bands: Vec::new(),
            date: self.date,
            properties: self.properties.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new([0.0, 0.0, 1.0, 1.0], 4, 2)
    }

    #[test]
    fn test_pixel_world_roundtrip() {
        let grid = grid();
        let (lon, lat) = grid.pixel_to_world(2.0, 1.0);
        assert!((lon - 0.5).abs() < 1e-12);
        assert!((lat - 0.5).abs() < 1e-12);
        let (col, row) = grid.world_to_pixel(lon, lat);
        assert!((col - 2.0).abs() < 1e-12);
        assert!((row - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pixel_area_shrinks_poleward() {
        let grid = GridSpec::new([0.0, 0.0, 1.0, 80.0], 1, 8);
        let equator = grid.pixel_area_m2(7);
        let polar = grid.pixel_area_m2(0);
        assert!(equator > polar);
    }

    #[test]
    fn test_pixel_area_sums_to_cell_area() {
        // One-degree cell at the equator is ~12,364 km²
        let grid = GridSpec::new([0.0, 0.0, 1.0, 1.0], 10, 10);
        let total: f64 = (0..grid.height).map(|r| grid.pixel_area_m2(r) * grid.width as f64).sum();
        assert!((total / 1e6 - 12_364.0).abs() < 20.0, "total {}", total / 1e6);
    }

    #[test]
    fn test_covering_resolution() {
        let grid = GridSpec::covering([73.32, 18.55, 73.41, 18.64], 30.0);
        assert!((grid.resolution_m() - 30.0).abs() < 1.0);
    }

    #[test]
    fn test_add_band_shape_check() {
        let mut raster = Raster::empty("r", grid());
        assert!(raster.add_band(Band::new("a", Array2::zeros((2, 4)))).is_ok());
        assert!(raster.add_band(Band::new("b", Array2::zeros((4, 2)))).is_err());
    }

    #[test]
    fn test_select_and_rename() {
        let raster = Raster::empty("r", grid())
            .with_band(Band::new("a", Array2::zeros((2, 4))))
            .unwrap()
            .with_band(Band::new("b", Array2::ones((2, 4))))
            .unwrap();

        let mut selected = raster.select(&["b".to_string(), "missing".to_string()]);
        assert_eq!(selected.band_names(), vec!["b"]);
        assert!(selected.rename("b", "c"));
        assert!(selected.has_band("c"));
        assert!(!selected.rename("zzz", "y"));
    }

    #[test]
    fn test_resample_nearest() {
        let raster = Raster::empty("r", GridSpec::new([0.0, 0.0, 2.0, 1.0], 2, 1))
            .with_band(Band::new("a", ndarray::array![[1.0, 2.0]]))
            .unwrap();
        let target = GridSpec::new([0.5, 0.0, 2.5, 1.0], 4, 1);
        let out = raster.resample_nearest(&target);
        let data = &out.band("a").unwrap().data;
        assert_eq!(data[[0, 0]], 1.0);
        assert_eq!(data[[0, 1]], 2.0);
        assert_eq!(data[[0, 2]], 2.0);
        assert!(data[[0, 3]].is_nan());
    }

    #[test]
    fn test_clip_masks_outside() {
        let region = Region::resolve(0.5, 0.5, 10_000.0);
        let raster = Raster::empty("r", GridSpec::new([0.0, 0.0, 1.0, 1.0], 10, 10))
            .with_band(Band::new("a", Array2::ones((10, 10))))
            .unwrap();
        let clipped = raster.clip(&region);
        let valid = clipped.band("a").unwrap().valid_count();
        assert!(valid > 0 && valid < 100, "valid {}", valid);
    }
}

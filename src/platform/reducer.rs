//! Region reduction kernels.
//!
//! Pixels are sampled on a lattice matching the requested nominal scale: when the
//! scale is at or below the native resolution every pixel is visited, otherwise
//! one pixel per `step x step` block stands in for the block (nearest neighbour)
//! and carries the block's area. Only samples whose center lies inside the region
//! contribute.

use super::{ReduceRequest, Reducer, StatKey, Statistics};
use crate::error::PlatformError;
use crate::raster::Raster;
use std::collections::BTreeMap;

/// Statistics plus bookkeeping about how they were computed.
#[derive(Debug, Clone)]
pub struct ReductionOutcome {
    pub statistics: Statistics,
    /// Sampled pixels inside the region
    pub pixels: u64,
    /// Scale actually used, in meters
    pub effective_scale_m: f64,
}

/// A sampled pixel: (row, col, area of the block it represents)
type Sample = (usize, usize, f64);

/// Reduce an image over a region.
///
/// Fails with [`PlatformError::TooManyPixels`] before touching any band data if
/// the sample count exceeds the pixel ceiling. Counting stops at the first sample
/// past the ceiling. Absent bands yield absent keys.
pub fn reduce_raster(image: &Raster, request: &ReduceRequest) -> Result<ReductionOutcome, PlatformError> {
    let native = image.grid.resolution_m();
    let step = if request.scale_m <= native {
        if request.scale_m < native {
            tracing::debug!(
                "Scale {}m is finer than native {:.1}m for '{}', using native grid",
                request.scale_m,
                native,
                image.id
            );
        }
        1
    } else {
        ((request.scale_m / native).round() as usize).max(1)
    };

    // Count before collecting; stop one past the ceiling.
    let ceiling = usize::try_from(request.max_pixels).unwrap_or(usize::MAX);
    let counted = lattice(image, request, step).take(ceiling.saturating_add(1)).count() as u64;
    if counted > request.max_pixels {
        return Err(PlatformError::TooManyPixels {
            pixels: counted,
            max_pixels: request.max_pixels,
        });
    }

    let samples: Vec<Sample> = lattice(image, request, step).collect();
    let pixels = samples.len() as u64;

    let statistics = match &request.reducer {
        Reducer::Sum => per_band(image, &samples, |values| {
            (!values.is_empty()).then(|| vec![(String::new(), values.iter().sum())])
        }),
        Reducer::Mean => per_band(image, &samples, |values| {
            (!values.is_empty()).then(|| vec![(String::new(), values.iter().sum::<f64>() / values.len() as f64)])
        }),
        Reducer::MinMax => per_band(image, &samples, |values| {
            let (min, max) = min_max(values)?;
            Some(vec![("_min".to_string(), min), ("_max".to_string(), max)])
        }),
        Reducer::AreaByClass { class_band } => area_by_class(image, &samples, class_band),
        Reducer::Histogram { band, bins } => histogram(image, &samples, band, *bins),
    };

    Ok(ReductionOutcome {
        statistics,
        pixels,
        effective_scale_m: native * step as f64,
    })
}

/// Walk the sampling lattice lazily, yielding blocks whose center lies inside the region.
fn lattice<'a>(image: &'a Raster, request: &'a ReduceRequest, step: usize) -> impl Iterator<Item = Sample> + 'a {
    let grid = &image.grid;
    let region = &request.region;

    (0..grid.height).step_by(step).flat_map(move |row_start| {
        let rows = step.min(grid.height - row_start);
        let row = row_start + rows / 2;
        let pixel_area = grid.pixel_area_m2(row);

        (0..grid.width).step_by(step).filter_map(move |col_start| {
            let cols = step.min(grid.width - col_start);
            let col = col_start + cols / 2;
            let (lon, lat) = grid.pixel_center(row, col);
            region
                .contains(lon, lat)
                .then(|| (row, col, pixel_area * (rows * cols) as f64))
        })
    })
}

/// Apply `reduce` to the valid sampled values of every band. Each returned
/// `(suffix, value)` becomes key `<band><suffix>`.
fn per_band<F>(image: &Raster, samples: &[Sample], reduce: F) -> Statistics
where
    F: Fn(&[f64]) -> Option<Vec<(String, f64)>>,
{
    let mut stats = Statistics::new();
    for band in &image.bands {
        let values: Vec<f64> = samples
            .iter()
            .map(|&(row, col, _)| band.data[[row, col]])
            .filter(|v| !v.is_nan())
            .collect();

        match reduce(&values) {
            Some(results) => {
                for (suffix, value) in results {
                    stats.insert(StatKey::Band(format!("{}{}", band.name, suffix)), value);
                }
            }
            None => tracing::debug!("Band '{}' of '{}' has no valid pixels in region", band.name, image.id),
        }
    }
    stats
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn area_by_class(image: &Raster, samples: &[Sample], class_band: &str) -> Statistics {
    let Some(band) = image.band(class_band) else {
        tracing::warn!("Class band '{}' absent from '{}', no areas", class_band, image.id);
        return Statistics::new();
    };

    let mut areas: BTreeMap<i64, f64> = BTreeMap::new();
    for &(row, col, area) in samples {
        let value = band.data[[row, col]];
        if value.is_nan() {
            continue;
        }
        *areas.entry(value.round() as i64).or_default() += area;
    }

    areas.into_iter().map(|(class, area)| (StatKey::Class(class), area)).collect()
}

fn histogram(image: &Raster, samples: &[Sample], band_name: &str, bins: usize) -> Statistics {
    let Some(band) = image.band(band_name) else {
        tracing::warn!("Histogram band '{}' absent from '{}'", band_name, image.id);
        return Statistics::new();
    };

    let values: Vec<f64> = samples
        .iter()
        .map(|&(row, col, _)| band.data[[row, col]])
        .filter(|v| !v.is_nan())
        .collect();

    let Some((min, max)) = min_max(&values) else {
        return Statistics::new();
    };

    let bins = bins.max(1);
    let width = (max - min) / bins as f64;
    let mut counts = vec![0.0; bins];
    for v in values {
        let idx = if width > 0.0 {
            (((v - min) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[idx] += 1.0;
    }

    let mut stats = Statistics::new();
    stats.insert(StatKey::Band(format!("{}_min", band_name)), min);
    stats.insert(StatKey::Band(format!("{}_max", band_name)), max);
    for (idx, count) in counts.into_iter().enumerate() {
        stats.insert(StatKey::Bin(idx), count);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Band, GridSpec};
    use crate::region::Region;
    use ndarray::Array2;

    /// 10x10 grid exactly covering the region around (0, 0) r=5km.
    fn setup() -> (Region, GridSpec) {
        let region = Region::resolve(0.0, 0.0, 5000.0);
        let grid = GridSpec::new(region.bounds, 10, 10);
        (region, grid)
    }

    fn request(region: &Region, reducer: Reducer, scale_m: f64) -> ReduceRequest {
        ReduceRequest {
            region: region.clone(),
            reducer,
            scale_m,
            max_pixels: 1_000_000_000,
        }
    }

    fn raster(grid: &GridSpec, name: &str, data: Array2<f64>) -> Raster {
        Raster::empty("img", grid.clone())
            .with_band(Band::new(name, data))
            .unwrap()
    }

    #[test]
    fn test_mean_and_sum() {
        let (region, grid) = setup();
        let image = raster(&grid, "v", Array2::from_elem((10, 10), 2.0));

        let mean = reduce_raster(&image, &request(&region, Reducer::Mean, 1.0)).unwrap();
        assert_eq!(mean.statistics.band("v"), Some(2.0));
        assert_eq!(mean.pixels, 100);

        let sum = reduce_raster(&image, &request(&region, Reducer::Sum, 1.0)).unwrap();
        assert_eq!(sum.statistics.band("v"), Some(200.0));
    }

    #[test]
    fn test_min_max_ignores_masked() {
        let (region, grid) = setup();
        let mut data = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f64);
        data[[0, 0]] = f64::NAN;
        data[[9, 9]] = f64::NAN;
        let image = raster(&grid, "DSM", data);

        let out = reduce_raster(&image, &request(&region, Reducer::MinMax, 1.0)).unwrap();
        assert_eq!(out.statistics.band("DSM_min"), Some(1.0));
        assert_eq!(out.statistics.band("DSM_max"), Some(98.0));
    }

    #[test]
    fn test_area_by_class_two_classes() {
        let (region, grid) = setup();
        let data = Array2::from_shape_fn((10, 10), |(r, _)| if r < 4 { 1.0 } else { 2.0 });
        let image = raster(&grid, "class", data);

        let out = reduce_raster(
            &image,
            &request(&region, Reducer::AreaByClass { class_band: "class".to_string() }, 1.0),
        )
        .unwrap();

        let classes: Vec<_> = out.statistics.classes().collect();
        assert_eq!(classes.len(), 2);

        let total_area: f64 = (0..10).map(|r| grid.pixel_area_m2(r) * 10.0).sum();
        assert!((out.statistics.class_total() - total_area).abs() < 1e-6 * total_area);
        // ~100 km² region
        assert!((total_area / 10_000.0 - 10_000.0).abs() < 50.0, "ha {}", total_area / 10_000.0);
    }

    #[test]
    fn test_pixel_ceiling_fails_fast() {
        let (region, grid) = setup();
        let image = raster(&grid, "v", Array2::ones((10, 10)));
        let mut req = request(&region, Reducer::Mean, 1.0);
        req.max_pixels = 99;

        match reduce_raster(&image, &req) {
            Err(PlatformError::TooManyPixels { pixels, max_pixels }) => {
                assert_eq!(pixels, 100);
                assert_eq!(max_pixels, 99);
            }
            other => panic!("expected TooManyPixels, got {:?}", other),
        }
    }

    #[test]
    fn test_pixel_ceiling_stops_counting_early() {
        let (region, _) = setup();
        let image = Raster::empty("huge", GridSpec::new(region.bounds, 3000, 3000));
        let mut req = request(&region, Reducer::Mean, 1.0);
        req.max_pixels = 1;

        match reduce_raster(&image, &req) {
            Err(PlatformError::TooManyPixels { pixels, max_pixels }) => {
                assert_eq!(pixels, 2);
                assert_eq!(max_pixels, 1);
            }
            other => panic!("expected TooManyPixels, got {:?}", other),
        }
    }

    #[test]
    fn test_coarse_scale_samples_blocks() {
        let (region, grid) = setup();
        let image = raster(&grid, "v", Array2::ones((10, 10)));
        // native is ~1000m; 2000m means 2x2 blocks
        let out = reduce_raster(&image, &request(&region, Reducer::Sum, 2000.0)).unwrap();
        assert_eq!(out.pixels, 25);
        assert_eq!(out.statistics.band("v"), Some(25.0));
        assert!(out.effective_scale_m > 1900.0);
    }

    #[test]
    fn test_absent_band_is_no_data() {
        let (region, grid) = setup();
        let image = Raster::empty("empty", grid);
        for reducer in [
            Reducer::Mean,
            Reducer::MinMax,
            Reducer::AreaByClass { class_band: "class".to_string() },
            Reducer::Histogram { band: "DSM".to_string(), bins: 4 },
        ] {
            let out = reduce_raster(&image, &request(&region, reducer, 10.0)).unwrap();
            assert!(out.statistics.is_empty());
        }
    }

    #[test]
    fn test_histogram_bins() {
        let (region, grid) = setup();
        let data = Array2::from_shape_fn((10, 10), |(r, _)| r as f64);
        let image = raster(&grid, "DSM", data);
        let out = reduce_raster(
            &image,
            &request(&region, Reducer::Histogram { band: "DSM".to_string(), bins: 3 }, 1.0),
        )
        .unwrap();

        let bins: Vec<_> = out.statistics.bins().collect();
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|(_, c)| c).sum::<f64>(), 100.0);
        assert_eq!(out.statistics.band("DSM_max"), Some(9.0));
    }
}

//! Reducing an image collection to a single image.

use crate::platform::ImageCollection;
use crate::raster::{Band, GridSpec, Raster};
use anyhow::Result;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Per-pixel collection reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composite {
    /// Last valid value in collection order (later images on top)
    Mosaic,
    /// Sum of valid values
    Sum,
    /// Mean of valid values
    Mean,
}

/// Accumulator for compositing images band by band.
///
/// NaN is nodata: a pixel with no valid contribution stays NaN.
#[derive(Debug)]
pub struct CompositeAccumulator {
    mode: Composite,
    grid: GridSpec,
    /// Band name -> (sum or first value, contribution count)
    bands: Vec<(String, Array2<f64>, Array2<u32>)>,
}

impl CompositeAccumulator {
    pub fn new(mode: Composite, grid: GridSpec) -> Self {
        Self {
            mode,
            grid,
            bands: Vec::new(),
        }
    }

    /// Add an image, resampling it onto the accumulator's grid if needed.
    pub fn add(&mut self, image: &Raster) -> Result<()> {
        let resampled;
        let image = if image.grid == self.grid {
            image
        } else {
            resampled = image.resample_nearest(&self.grid);
            &resampled
        };

        let shape = (self.grid.height, self.grid.width);
        for band in &image.bands {
            let idx = match self.bands.iter().position(|(name, _, _)| *name == band.name) {
                Some(idx) => idx,
                None => {
                    self.bands.push((
                        band.name.clone(),
                        Array2::from_elem(shape, f64::NAN),
                        Array2::zeros(shape),
                    ));
                    self.bands.len() - 1
                }
            };

            let mode = self.mode;
            let (_, acc, count) = &mut self.bands[idx];
            Zip::from(acc).and(count).and(&band.data).par_for_each(|a, c, &v| {
                if v.is_nan() {
                    return;
                }
                match mode {
                    Composite::Mosaic => *a = v,
                    Composite::Sum | Composite::Mean => {
                        *a = if *c == 0 { v } else { *a + v };
                    }
                }
                *c += 1;
            });
        }
        Ok(())
    }

    /// Finalize into a raster named `id`.
    pub fn finalize(self, id: impl Into<String>) -> Raster {
        let mut raster = Raster::empty(id, self.grid);
        for (name, mut acc, count) in self.bands {
            if self.mode == Composite::Mean {
                Zip::from(&mut acc).and(&count).par_for_each(|a, &c| {
                    if c > 0 {
                        *a /= c as f64;
                    }
                });
            }
            raster.bands.push(Band::new(name, acc));
        }
        raster
    }
}

/// Composite a collection into one image on `grid`.
///
/// An empty collection yields a band-less raster, so that downstream reductions
/// see "no data" rather than an error.
pub fn composite(collection: &ImageCollection, mode: Composite, grid: &GridSpec) -> Result<Raster> {
    let id = format!("{}:{:?}", collection.id, mode).to_lowercase();
    if collection.is_empty() {
        tracing::debug!("Empty collection {}, composite has no bands", collection.id);
    }

    let mut accumulator = CompositeAccumulator::new(mode, grid.clone());
    for image in &collection.images {
        accumulator.add(image)?;
    }
    Ok(accumulator.finalize(id))
}

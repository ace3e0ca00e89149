//! Per-pixel band transforms.

use crate::error::{PlatformError, SchemeError};
use crate::raster::{Band, Raster};
use anyhow::Result;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// What a remap does with codes that are not in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unmapped {
    /// Unmapped codes become masked pixels
    #[default]
    Mask,
    /// Unmapped codes keep their raw value
    PassThrough,
}

/// Pure function from input bands to an output band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BandTransform {
    /// Keep the listed bands unchanged
    Identity { bands: Vec<String> },

    /// Map raw integer codes to dense class indices
    Remap {
        band: String,
        from: Vec<i64>,
        to: Vec<i64>,
        #[serde(default)]
        unmapped: Unmapped,
        output: String,
    },

    /// `value * scale + offset` on each listed band, in place
    Linear {
        bands: Vec<String>,
        scale: f64,
        offset: f64,
    },

    /// `(a - b) / (a + b)` written to `output`
    NormalizedDifference {
        band_a: String,
        band_b: String,
        output: String,
    },
}

impl BandTransform {
    /// Bands this transform reads.
    pub fn input_bands(&self) -> Vec<String> {
        match self {
            Self::Identity { bands } | Self::Linear { bands, .. } => bands.clone(),
            Self::Remap { band, .. } => vec![band.clone()],
            Self::NormalizedDifference { band_a, band_b, .. } => vec![band_a.clone(), band_b.clone()],
        }
    }

    /// Bands present after the transform.
    pub fn output_bands(&self) -> Vec<String> {
        match self {
            Self::Identity { bands } | Self::Linear { bands, .. } => bands.clone(),
            Self::Remap { output, .. } | Self::NormalizedDifference { output, .. } => vec![output.clone()],
        }
    }

    /// Apply the transform.
    ///
    /// A raster without any bands (an empty composite) passes through untouched;
    /// a raster that has bands but lacks an input band is an error.
    pub fn apply(&self, raster: &Raster) -> Result<Raster> {
        if raster.bands.is_empty() {
            tracing::debug!("Raster '{}' has no bands, skipping transform", raster.id);
            return Ok(raster.clone());
        }

        let mut out = raster.clone_meta();
        match self {
            Self::Identity { bands } => {
                for name in bands {
                    out.add_band(band(raster, name)?.clone())?;
                }
            }
            Self::Remap {
                band: name,
                from,
                to,
                unmapped,
                output,
            } => {
                let data = remap(&band(raster, name)?.data, from, to, *unmapped);
                out.add_band(Band::new(output.clone(), data))?;
            }
            Self::Linear { bands, scale, offset } => {
                for name in bands {
                    let data = linear(&band(raster, name)?.data, *scale, *offset);
                    out.add_band(Band::new(name.clone(), data))?;
                }
            }
            Self::NormalizedDifference { band_a, band_b, output } => {
                let data = normalized_difference(&band(raster, band_a)?.data, &band(raster, band_b)?.data);
                out.add_band(Band::new(output.clone(), data))?;
            }
        }
        Ok(out)
    }
}

fn band<'a>(raster: &'a Raster, name: &str) -> Result<&'a Band, PlatformError> {
    raster.band(name).ok_or_else(|| PlatformError::MissingBand {
        band: name.to_string(),
        image: raster.id.clone(),
    })
}

/// Remap integer codes. Masked input stays masked.
pub fn remap(data: &Array2<f64>, from: &[i64], to: &[i64], unmapped: Unmapped) -> Array2<f64> {
    let table: HashMap<i64, i64> = from.iter().copied().zip(to.iter().copied()).collect();
    let mut out = Array2::from_elem(data.dim(), f64::NAN);
    Zip::from(&mut out).and(data).par_for_each(|o, &v| {
        if v.is_nan() {
            return;
        }
        *o = match table.get(&(v.round() as i64)) {
            Some(&mapped) => mapped as f64,
            None => match unmapped {
                Unmapped::Mask => f64::NAN,
                Unmapped::PassThrough => v,
            },
        };
    });
    out
}

/// `value * scale + offset`. Masked input stays masked.
pub fn linear(data: &Array2<f64>, scale: f64, offset: f64) -> Array2<f64> {
    let mut out = data.clone();
    out.par_mapv_inplace(|v| v * scale + offset);
    out
}

/// `(a - b) / (a + b)`. A zero denominator yields NaN.
pub fn normalized_difference(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::from_elem(a.dim(), f64::NAN);
    Zip::from(&mut out).and(a).and(b).par_for_each(|o, &a, &b| {
        let sum = a + b;
        if sum != 0.0 && !sum.is_nan() {
            *o = (a - b) / sum;
        }
    });
    out
}

/// Class names, colors and the remap from raw source codes to `1..=N`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScheme {
    pub names: Vec<String>,
    pub colors: Vec<String>,
    /// Raw source codes
    pub from: Vec<i64>,
    /// Dense class indices, aligned with `from`
    pub to: Vec<i64>,
}

impl ClassificationScheme {
    /// Check the scheme invariants.
    pub fn validate(&self) -> Result<(), SchemeError> {
        if self.names.is_empty() {
            return Err(SchemeError::Empty);
        }
        if self.names.len() != self.colors.len() {
            return Err(SchemeError::LengthMismatch {
                names: self.names.len(),
                colors: self.colors.len(),
            });
        }
        if self.from.len() != self.to.len() {
            return Err(SchemeError::RemapLength {
                from: self.from.len(),
                to: self.to.len(),
            });
        }
        let classes = self.names.len();
        if let Some(&value) = self.to.iter().find(|&&v| v < 1 || v as usize > classes) {
            return Err(SchemeError::RemapOutOfRange { value, classes });
        }
        let mut seen = HashSet::new();
        if let Some(&dup) = self.from.iter().find(|&&code| !seen.insert(code)) {
            return Err(SchemeError::DuplicateCode(dup));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of a 1-based class index.
    pub fn name(&self, class: i64) -> Option<&str> {
        usize::try_from(class - 1)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    /// Remap transform reading `band` and writing `output`.
    pub fn transform(&self, band: &str, output: &str, unmapped: Unmapped) -> BandTransform {
        BandTransform::Remap {
            band: band.to_string(),
            from: self.from.clone(),
            to: self.to.clone(),
            unmapped,
            output: output.to_string(),
        }
    }
}

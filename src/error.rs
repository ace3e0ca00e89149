//! Typed errors for the library layers.
//!
//! Application code works with `anyhow::Result`; these enums exist where a caller
//! needs to tell failures apart (a pixel-ceiling abort versus a bad catalog, a
//! malformed classification scheme versus a malformed palette).

use thiserror::Error;

/// Failures reported by an [`ImageryPlatform`](crate::platform::ImageryPlatform).
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// `pixels` is the count reached when the ceiling was crossed.
    #[error("Reduction exceeds maxPixels = {max_pixels} (aborted after {pixels} pixels)")]
    TooManyPixels { pixels: u64, max_pixels: u64 },

    #[error("Band '{band}' not found in image '{image}'")]
    MissingBand { band: String, image: String },

    #[error("Image '{image}' has {actual} values for band '{band}', expected {expected}")]
    ShapeMismatch {
        image: String,
        band: String,
        expected: usize,
        actual: usize,
    },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Reduction task failed: {0}")]
    Join(String),
}

/// Failures building a classification scheme.
#[derive(Error, Debug, PartialEq)]
pub enum SchemeError {
    #[error("Scheme has {names} class names but {colors} colors")]
    LengthMismatch { names: usize, colors: usize },

    #[error("Remap table has {from} source codes but {to} target codes")]
    RemapLength { from: usize, to: usize },

    #[error("Remap target {value} is outside 1..={classes}")]
    RemapOutOfRange { value: i64, classes: usize },

    #[error("Remap source code {0} appears more than once")]
    DuplicateCode(i64),

    #[error("Scheme has no classes")]
    Empty,
}

/// Failures building a legend panel.
#[derive(Error, Debug, PartialEq)]
pub enum LegendError {
    #[error("Legend has {names} labels but {colors} colors")]
    LengthMismatch { names: usize, colors: usize },

    #[error("Palette is empty")]
    EmptyPalette,

    #[error("Invalid color '{0}'")]
    InvalidColor(String),

    #[error("Legend range is empty: min {min} >= max {max}")]
    EmptyRange { min: f64, max: f64 },

    #[error("Legend needs at least one step")]
    NoSteps,
}

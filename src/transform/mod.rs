//! Data transformation: band math and collection compositing.

mod band;
mod composite;

pub use band::{linear, normalized_difference, remap, BandTransform, ClassificationScheme, Unmapped};
pub use composite::{composite, Composite, CompositeAccumulator};

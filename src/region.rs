//! Study-area geometry.
//!
//! A [`Region`] is the axis-aligned bounding box of a circular buffer around a
//! center point, the same shape the imagery platform returns for
//! `point.buffer(radius).bounds()`.
//!
//! ## Coordinate order convention:
//!
//! - Points are `(lon, lat)` in WGS84 degrees (`geo::Point` x = lon, y = lat).
//! - Bounds arrays: `[min_lon, min_lat, max_lon, max_lat]` = `[west, south, east, north]`

use geo::{ChamberlainDuquetteArea, Point, Polygon, Rect};
use std::f64::consts::FRAC_PI_2;
use serde::{Deserialize, Serialize};

/// Bounds in WGS84: [min_lon, min_lat, max_lon, max_lat]
pub type Bounds = [f64; 4];

/// Mean Earth radius in meters (IUGG), as used by `geo`'s haversine functions.
const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// Resolved analysis region. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Center latitude in degrees
    pub latitude: f64,

    /// Center longitude in degrees
    pub longitude: f64,

    /// Buffer radius in meters
    pub radius_m: f64,

    /// Bounding box of the buffer
    pub bounds: Bounds,
}

impl Region {
    /// Resolve a center coordinate and buffer radius into the bounding polygon.
    ///
    /// The box bounds the spherical cap of angular radius `radius_m / R`. Across
    /// the antimeridian the east edge is left unwrapped (it may exceed 180). When
    /// the cap reaches a pole the box spans every longitude up to that pole.
    pub fn resolve(latitude: f64, longitude: f64, radius_m: f64) -> Self {
        let angular = radius_m / MEAN_EARTH_RADIUS;
        let lat = latitude.to_radians();
        let north = lat + angular;
        let south = lat - angular;

        let bounds = if north < FRAC_PI_2 && south > -FRAC_PI_2 {
            let dlon = (angular.sin() / lat.cos()).asin().to_degrees();
            [
                longitude - dlon,
                south.to_degrees(),
                longitude + dlon,
                north.to_degrees(),
            ]
        } else {
            tracing::debug!("Buffer around ({}, {}) contains a pole", latitude, longitude);
            [
                -180.0,
                south.to_degrees().max(-90.0),
                180.0,
                north.to_degrees().min(90.0),
            ]
        };

        tracing::debug!(
            "Resolved region ({:.6}, {:.6}) r={}m -> [{:.6}, {:.6}, {:.6}, {:.6}]",
            latitude,
            longitude,
            radius_m,
            bounds[0],
            bounds[1],
            bounds[2],
            bounds[3]
        );

        Self {
            latitude,
            longitude,
            radius_m,
            bounds,
        }
    }

    /// Center as a `(lon, lat)` point.
    pub fn center(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Bounding rectangle.
    pub fn rect(&self) -> Rect<f64> {
        Rect::new(
            (self.bounds[0], self.bounds[1]),
            (self.bounds[2], self.bounds[3]),
        )
    }

    /// Closed polygon ring of the region (5 vertices, first == last).
    pub fn polygon(&self) -> Polygon<f64> {
        self.rect().to_polygon()
    }

    /// Whether a point lies strictly inside the region.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let [west, south, east, north] = self.bounds;
        west < lon && lon < east && south < lat && lat < north
    }

    /// Geodesic area of the region in square meters.
    pub fn area_m2(&self) -> f64 {
        self.polygon().chamberlain_duquette_unsigned_area()
    }
}

/// Compute the intersection of two bounds.
///
/// Returns None if there's no intersection.
pub fn intersect_bounds(a: &Bounds, b: &Bounds) -> Option<Bounds> {
    let min_x = a[0].max(b[0]);
    let min_y = a[1].max(b[1]);
    let max_x = a[2].min(b[2]);
    let max_y = a[3].min(b[3]);

    if min_x < max_x && min_y < max_y {
        Some([min_x, min_y, max_x, max_y])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_region_contains_center() {
        let region = Region::resolve(18.5941667, 73.3675, 5000.0);
        assert!(region.contains(73.3675, 18.5941667));
    }

    #[test]
    fn test_region_area_covers_disk() {
        for (lat, lon, radius) in [
            (18.5941667, 73.3675, 5000.0),
            (0.0, 0.0, 1000.0),
            (-45.0, 170.0, 250.0),
            (60.0, -20.0, 20_000.0),
            // Across the antimeridian
            (0.0, 179.99, 5000.0),
            (10.0, -179.99, 5000.0),
            // Caps reaching a pole
            (89.99, 10.0, 5000.0),
            (-89.99, -170.0, 5000.0),
        ] {
            let region = Region::resolve(lat, lon, radius);
            assert!(region.contains(lon, lat));
            assert!(
                region.area_m2() >= PI * radius * radius,
                "box area {} smaller than disk for r={}",
                region.area_m2(),
                radius
            );
        }
    }

    #[test]
    fn test_region_antimeridian_stays_local() {
        let region = Region::resolve(0.0, 179.99, 5000.0);
        assert!(region.bounds[0] < 179.99 && region.bounds[2] > 180.0);
        assert!(region.bounds[2] - region.bounds[0] < 0.1);
        // Roughly 10 km x 10 km, not a globe-spanning box
        assert!(region.area_m2() < 1.1e8, "area {}", region.area_m2());
    }

    #[test]
    fn test_region_polar_cap_reaches_pole() {
        let region = Region::resolve(89.99, 10.0, 5000.0);
        assert_eq!(region.bounds[3], 90.0);
        assert_eq!((region.bounds[0], region.bounds[2]), (-180.0, 180.0));
        assert!(region.bounds[1] < 89.99);

        let south = Region::resolve(-89.99, 10.0, 5000.0);
        assert_eq!(south.bounds[1], -90.0);
        assert!(south.contains(10.0, -89.99));
    }

    #[test]
    fn test_region_deterministic() {
        let a = Region::resolve(18.5941667, 73.3675, 5000.0);
        let b = Region::resolve(18.5941667, 73.3675, 5000.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_region_extent_5km() {
        let region = Region::resolve(18.5941667, 73.3675, 5000.0);
        // ~0.045 degrees of latitude per 5 km
        let lat_span = region.bounds[3] - region.bounds[1];
        assert!((lat_span - 0.0899).abs() < 0.001, "lat span {}", lat_span);
        // Longitude span widens with 1/cos(lat)
        let lon_span = region.bounds[2] - region.bounds[0];
        assert!(lon_span > lat_span);
    }

    #[test]
    fn test_polygon_is_closed() {
        let region = Region::resolve(10.0, 10.0, 100.0);
        let polygon = region.polygon();
        let coords: Vec<_> = polygon.exterior().coords().collect();
        assert_eq!(coords.len(), 5);
        assert_eq!(coords.first(), coords.last());
    }

    #[test]
    fn test_intersect_bounds() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 5.0, 15.0, 15.0];
        assert_eq!(intersect_bounds(&a, &b), Some([5.0, 5.0, 10.0, 10.0]));
    }

    #[test]
    fn test_intersect_bounds_no_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert!(intersect_bounds(&a, &b).is_none());
    }
}

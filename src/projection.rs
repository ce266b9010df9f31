//! Output projection.
//!
//! Telemetry coordinates arrive in a spherical Mercator projection (meters on
//! a sphere of radius 6 378 137 m), which is what the upstream map server
//! found convenient. The engine works in that planar space throughout;
//! conversion to WGS84 latitude/longitude happens only at the output
//! boundary, for the formatting layer.

use std::f64::consts::FRAC_PI_2;

use geo::{LineString, Point};

use crate::TrackPoint;

/// Sphere radius of the upstream Mercator projection, in meters.
pub const MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Convert a planar Mercator coordinate to a WGS84 point.
///
/// The returned [`Point`] is `(longitude, latitude)` in degrees.
///
/// # Example
/// ```
/// use std::f64::consts::FRAC_PI_4;
/// use track_mapper::projection::{to_lat_lng, MERCATOR_RADIUS_M};
/// use track_mapper::TrackPoint;
///
/// let p = TrackPoint::new(MERCATOR_RADIUS_M * FRAC_PI_4, 0.0);
/// let geo = to_lat_lng(&p);
/// assert!((geo.x() - 45.0).abs() < 1e-9); // longitude
/// assert!(geo.y().abs() < 1e-9); // latitude
/// ```
pub fn to_lat_lng(p: &TrackPoint) -> Point<f64> {
    let lng = (p.x / MERCATOR_RADIUS_M).to_degrees();
    let lat = (2.0 * (p.y / MERCATOR_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    Point::new(lng, lat)
}

/// Project a WGS84 point back into planar Mercator meters.
pub fn from_lat_lng(point: &Point<f64>) -> TrackPoint {
    let x = MERCATOR_RADIUS_M * point.x().to_radians();
    let y = MERCATOR_RADIUS_M
        * (std::f64::consts::FRAC_PI_4 + point.y().to_radians() / 2.0)
            .tan()
            .ln();
    TrackPoint::new(x, y)
}

/// Convert an ordered path to a WGS84 [`LineString`] for the formatting
/// layer.
pub fn path_to_line_string(path: &[TrackPoint]) -> LineString<f64> {
    path.iter().map(|p| to_lat_lng(p).0).collect()
}

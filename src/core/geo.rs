use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Latitude limit of the Mercator projection (radians), i.e. `gd(π)`.
pub const MERCATOR_MAX_LAT: f64 = 1.484_422_229_745_332_4;

/// Represents a geographical coordinate. Both components are stored in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    /// Longitude in radians, nominally in [-π, π)
    pub lon: f64,
    /// Latitude in radians, in [-π/2, π/2]
    pub lat: f64,
}

impl GeoCoord {
    /// Creates a new coordinate from radians
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Creates a new coordinate from degrees
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self::new(lon.to_radians(), lat.to_radians())
    }

    /// Returns `(lon, lat)` in degrees
    pub fn to_degrees(&self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.abs() <= FRAC_PI_2 && self.lon.abs() <= PI
    }

    /// Wraps longitude to the [-π, π) range
    pub fn wrap_lon(lon: f64) -> f64 {
        let wrapped = (lon + PI).rem_euclid(2.0 * PI) - PI;
        // rem_euclid can return exactly 2π for tiny negative inputs
        if wrapped >= PI {
            wrapped - 2.0 * PI
        } else {
            wrapped
        }
    }

    /// Clamps latitude to [-π/2, π/2]
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-FRAC_PI_2, FRAC_PI_2)
    }

    /// Unit-sphere position (x towards lon 0, z towards the north pole)
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let (sin_lat, cos_lat) = self.lat.sin_cos();
        let (sin_lon, cos_lon) = self.lon.sin_cos();
        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
    }

    /// Inverse of [`GeoCoord::to_unit_vector`]
    pub fn from_unit_vector(v: [f64; 3]) -> Self {
        let lat = v[2].clamp(-1.0, 1.0).asin();
        let lon = v[1].atan2(v[0]);
        Self::new(lon, lat)
    }
}

impl Default for GeoCoord {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Gudermannian function: Mercator y (radians) to latitude.
pub fn gd(y: f64) -> f64 {
    y.sinh().atan()
}

/// Inverse Gudermannian function: latitude to Mercator y (radians).
pub fn inverse_gd(lat: f64) -> f64 {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    lat.tan().asinh()
}

//! Day/night shading of stacked tiles.

use crate::core::constants::{NIGHT_BRIGHTNESS, SHADING_INTERPOLATION_LIMIT, TWILIGHT_ZONE};
use crate::core::geo::gd;
use crate::tiles::addressing::TileGeometry;
use crate::tiles::id::TileId;
use crate::tiles::source::TileProjection;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Sub-solar point in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SunPosition {
    pub lon: f64,
    pub lat: f64,
}

impl SunPosition {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self::new(lon.to_radians(), lat.to_radians())
    }

    /// Approximate sub-solar point for a unix timestamp (seconds).
    ///
    /// Low-precision solar coordinates, good to a fraction of a degree.
    pub fn from_unix_time(seconds: i64) -> Self {
        // days since J2000.0 (2000-01-01 12:00 UTC)
        let d = (seconds as f64 - 946_728_000.0) / 86_400.0;
        let mean_lon = (280.460 + 0.985_647_4 * d).rem_euclid(360.0);
        let anomaly = (357.528 + 0.985_600_3 * d).rem_euclid(360.0).to_radians();
        let ecliptic_lon =
            (mean_lon + 1.915 * anomaly.sin() + 0.020 * (2.0 * anomaly).sin()).to_radians();
        let obliquity = (23.439 - 0.000_000_4 * d).to_radians();

        let declination = (obliquity.sin() * ecliptic_lon.sin()).asin();
        let right_ascension = (obliquity.cos() * ecliptic_lon.sin()).atan2(ecliptic_lon.cos());
        let gmst_hours = (18.697_374_558 + 24.065_709_824_419_08 * d).rem_euclid(24.0);
        let lon = right_ascension - (gmst_hours * 15.0).to_radians();

        Self::new(crate::core::geo::GeoCoord::wrap_lon(lon), declination)
    }

    /// Brightness in [0, 1]: 1 in daylight, 0 at night, linear across the twilight band
    pub fn shading(&self, lon: f64, lat: f64) -> f64 {
        RowShading::new(self, lat).shading(self, lon)
    }
}

/// Per-row part of the haversine distance to the sub-solar point
struct RowShading {
    a: f64,
    c: f64,
}

impl RowShading {
    fn new(sun: &SunPosition, lat: f64) -> Self {
        Self {
            a: ((lat - sun.lat) / 2.0).sin(),
            c: lat.cos() * sun.lat.cos(),
        }
    }

    fn shading(&self, sun: &SunPosition, lon: f64) -> f64 {
        let b = ((lon - sun.lon) / 2.0).sin();
        // h is 0.5 on the terminator
        let h = self.a * self.a + self.c * b * b;
        let twilight = TWILIGHT_ZONE / 2.0;
        if h <= 0.5 - twilight {
            1.0
        } else if h >= 0.5 + twilight {
            0.0
        } else {
            (0.5 + twilight - h) / TWILIGHT_ZONE
        }
    }
}

/// Darken a pixel for the given brightness
pub fn shade_pixel(pixel: &mut Rgba<u8>, brightness: f64) {
    let factor = if brightness <= 0.0 {
        NIGHT_BRIGHTNESS
    } else {
        (1.0 - NIGHT_BRIGHTNESS) * brightness + NIGHT_BRIGHTNESS
    };
    for channel in pixel.0.iter_mut().take(3) {
        *channel = (*channel as f64 * factor).round().clamp(0.0, 255.0) as u8;
    }
}

/// Blend the day pixel towards the night raster
pub fn shade_pixel_composite(pixel: &mut Rgba<u8>, night: &Rgba<u8>, brightness: f64) {
    let d = brightness.clamp(0.0, 1.0);
    for i in 0..3 {
        let mixed = pixel.0[i] as f64 * d + night.0[i] as f64 * (1.0 - d);
        pixel.0[i] = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

/// Interval between exactly evaluated supporting points along a row: the step
/// up to `maximum` that needs the fewest evaluations for `full_length` pixels
pub fn max_divisor(maximum: u32, full_length: u32) -> u32 {
    let mut best = 2;
    let mut evaluations_min = full_length;
    for step in 1..=maximum.max(1) {
        let evaluations = full_length / step + full_length % step;
        if evaluations < evaluations_min {
            evaluations_min = evaluations;
            best = step;
        }
    }
    best
}

/// Latitude of the center of pixel row `y` of a tile
pub fn tile_row_lat(id: &TileId, y: u32, geometry: &TileGeometry, projection: TileProjection) -> f64 {
    let global_height = geometry.global_height(id.level as i32).max(1) as f64;
    let global_y = (id.y as u64 * geometry.tile_height as u64 + y as u64) as f64 + 0.5;
    match projection {
        TileProjection::Equirectangular => FRAC_PI_2 - PI * global_y / global_height,
        TileProjection::Mercator => gd(PI - 2.0 * PI * global_y / global_height),
    }
}

/// Longitude of the center of pixel column `x` of a tile
pub fn tile_column_lon(id: &TileId, x: u32, geometry: &TileGeometry) -> f64 {
    let global_width = geometry.global_width(id.level as i32).max(1) as f64;
    let global_x = (id.x as u64 * geometry.tile_width as u64 + x as u64) as f64 + 0.5;
    -PI + 2.0 * PI * global_x / global_width
}

/// Apply day/night shading to a stacked tile in place.
///
/// With a night raster the lights are composited in, otherwise night pixels are
/// darkened. Brightness is evaluated exactly at supporting points; runs whose
/// ends are both fully lit or both fully dark are filled without evaluation.
pub fn shade_tile(
    tile: &mut RgbaImage,
    night: Option<&RgbaImage>,
    id: &TileId,
    geometry: &TileGeometry,
    projection: TileProjection,
    sun: &SunPosition,
) {
    let (width, height) = tile.dimensions();
    if width == 0 {
        return;
    }
    let night = night.filter(|n| n.dimensions() == (width, height));
    let step = max_divisor(SHADING_INTERPOLATION_LIMIT, width);

    let apply = |tile: &mut RgbaImage, x: u32, y: u32, brightness: f64| {
        if brightness >= 1.0 {
            return;
        }
        let pixel = tile.get_pixel_mut(x, y);
        match night {
            Some(night) => shade_pixel_composite(pixel, night.get_pixel(x, y), brightness),
            None => shade_pixel(pixel, brightness),
        }
    };

    for y in 0..height {
        let row = RowShading::new(sun, tile_row_lat(id, y, geometry, projection));
        let mut x0 = 0;
        while x0 < width {
            let x1 = (x0 + step).min(width) - 1;
            let start = row.shading(sun, tile_column_lon(id, x0, geometry));
            let end = row.shading(sun, tile_column_lon(id, x1, geometry));
            if start >= 1.0 && end >= 1.0 {
                // fully lit
            } else if start <= 0.0 && end <= 0.0 {
                for x in x0..=x1 {
                    apply(tile, x, y, 0.0);
                }
            } else {
                for x in x0..=x1 {
                    let brightness = row.shading(sun, tile_column_lon(id, x, geometry));
                    apply(tile, x, y, brightness);
                }
            }
            x0 = x1 + 1;
        }
    }
}

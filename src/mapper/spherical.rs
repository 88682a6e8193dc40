use super::{for_each_row, put, MapContext};
use crate::core::geo::GeoCoord;
use image::RgbaImage;
use std::f64::consts::PI;

/// Orthographic globe.
///
/// Below high quality the exact inverse projection is evaluated only every
/// `interpolation_step` pixels and coordinates in between are interpolated,
/// except where the run crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SphericalScanlineTextureMapper {
    interpolation_step: u32,
}

impl SphericalScanlineTextureMapper {
    pub fn new(interpolation_step: u32) -> Self {
        Self {
            interpolation_step: interpolation_step.max(1),
        }
    }

    pub fn interpolation_step(&self) -> u32 {
        self.interpolation_step
    }

    pub fn map_texture(&self, canvas: &mut RgbaImage, context: &MapContext<'_>) {
        let viewport = context.viewport;
        let width = canvas.width() as i64;
        let step = if context.quality.is_high() {
            1
        } else {
            self.interpolation_step as i64
        };

        for_each_row(canvas, context, |sampler, y, row| {
            let (_, dy) = viewport.center_offset(0, y);
            let Some(half_span) = disk_half_span(viewport.radius as i64, dy) else {
                return;
            };
            let center_x = (viewport.width / 2) as i64;
            let x_start = (center_x - half_span).max(0);
            let x_end = (center_x + half_span).min(width - 1);
            if x_start > x_end {
                return;
            }
            let geo = |x: i64| viewport.globe_geo_at(x - center_x, dy);

            let mut x0 = x_start;
            let mut left = geo(x0);
            if let Some(coord) = left {
                put(row, x0 as u32, sampler.sample(coord));
            }
            while x0 < x_end {
                let x1 = (x0 + step).min(x_end);
                let right = geo(x1);
                match (left, right) {
                    (Some(a), Some(b)) if x1 - x0 > 1 && (b.lon - a.lon).abs() < PI => {
                        let span = (x1 - x0) as f64;
                        for x in x0 + 1..x1 {
                            let t = (x - x0) as f64 / span;
                            let coord = GeoCoord::new(a.lon + (b.lon - a.lon) * t, a.lat + (b.lat - a.lat) * t);
                            put(row, x as u32, sampler.sample(coord));
                        }
                    }
                    _ => {
                        for x in x0 + 1..x1 {
                            if let Some(coord) = geo(x) {
                                put(row, x as u32, sampler.sample(coord));
                            }
                        }
                    }
                }
                if let Some(coord) = right {
                    put(row, x1 as u32, sampler.sample(coord));
                }
                x0 = x1;
                left = right;
            }
        });
    }
}

/// Largest `dx` with `dx² + dy² < r²`, or `None` if the row misses the disk
fn disk_half_span(radius: i64, dy: i64) -> Option<i64> {
    let limit = radius * radius - dy * dy - 1;
    if limit < 0 {
        return None;
    }
    let mut dx = (limit as f64).sqrt() as i64;
    while (dx + 1) * (dx + 1) <= limit {
        dx += 1;
    }
    while dx * dx > limit {
        dx -= 1;
    }
    Some(dx)
}

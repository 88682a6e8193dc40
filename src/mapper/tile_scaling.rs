use super::{for_each_row, put, MapContext};
use crate::core::geo::inverse_gd;
use crate::core::viewport::Projection;
use image::RgbaImage;
use std::f64::consts::{FRAC_PI_2, PI};

/// Flat view whose projection equals the tile projection.
///
/// View pixels map to texels by a pure scale and offset, so no per-pixel
/// trigonometry is needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileScalingTextureMapper;

impl TileScalingTextureMapper {
    pub fn map_texture(&self, canvas: &mut RgbaImage, context: &MapContext<'_>) {
        let viewport = context.viewport;
        let width = canvas.width();
        let scale = viewport.flat_scale();
        let (center_y, y_limit) = match viewport.projection {
            Projection::Mercator => (inverse_gd(viewport.center.lat), PI),
            _ => (viewport.center.lat, FRAC_PI_2),
        };
        let mercator = viewport.projection == Projection::Mercator;

        for_each_row(canvas, context, |sampler, y, row| {
            let (global_width, global_height) = sampler.global_size();
            let texels_per_radian = global_width / (2.0 * PI);
            let (_, dy) = viewport.center_offset(0, y);
            let projected_y = center_y - dy as f64 * scale;
            if projected_y.abs() > y_limit {
                return;
            }
            let texel_y = if mercator {
                (PI - projected_y) / (2.0 * PI) * global_height
            } else {
                (FRAC_PI_2 - projected_y) / PI * global_height
            };
            let (dx0, _) = viewport.center_offset(0, y);
            let texel_x0 = (viewport.center.lon + PI + dx0 as f64 * scale) * texels_per_radian;
            let step = scale * texels_per_radian;
            for x in 0..width {
                put(row, x, sampler.sample_global(texel_x0 + x as f64 * step, texel_y));
            }
        });
    }
}

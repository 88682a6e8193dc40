use super::{for_each_row, put, MapContext};
use crate::core::geo::{gd, inverse_gd, GeoCoord};
use image::RgbaImage;
use std::f64::consts::PI;

/// Mercator view over tiles of any projection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MercatorScanlineTextureMapper;

impl MercatorScanlineTextureMapper {
    pub fn map_texture(&self, canvas: &mut RgbaImage, context: &MapContext<'_>) {
        let viewport = context.viewport;
        let width = canvas.width();
        let scale = viewport.flat_scale();
        let center_y = inverse_gd(viewport.center.lat);
        for_each_row(canvas, context, |sampler, y, row| {
            let (_, dy) = viewport.center_offset(0, y);
            let mercator_y = center_y - dy as f64 * scale;
            if mercator_y.abs() > PI {
                return;
            }
            let lat = gd(mercator_y);
            for x in 0..width {
                let (dx, _) = viewport.center_offset(x, y);
                let lon = GeoCoord::wrap_lon(viewport.center.lon + dx as f64 * scale);
                put(row, x, sampler.sample(GeoCoord::new(lon, lat)));
            }
        });
    }
}

use super::{for_each_row, put, MapContext};
use crate::core::geo::GeoCoord;
use image::RgbaImage;
use std::f64::consts::FRAC_PI_2;

/// Equirectangular view over tiles of any projection.
///
/// Latitude is fixed per row, longitude steps linearly along it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EquirectScanlineTextureMapper;

impl EquirectScanlineTextureMapper {
    pub fn map_texture(&self, canvas: &mut RgbaImage, context: &MapContext<'_>) {
        let viewport = context.viewport;
        let width = canvas.width();
        let scale = viewport.flat_scale();
        for_each_row(canvas, context, |sampler, y, row| {
            let (_, dy) = viewport.center_offset(0, y);
            let lat = viewport.center.lat - dy as f64 * scale;
            // rows beyond the poles stay untouched
            if lat.abs() > FRAC_PI_2 {
                return;
            }
            for x in 0..width {
                let (dx, _) = viewport.center_offset(x, y);
                let lon = GeoCoord::wrap_lon(viewport.center.lon + dx as f64 * scale);
                put(row, x, sampler.sample(GeoCoord::new(lon, lat)));
            }
        });
    }
}

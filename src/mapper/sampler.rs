use crate::core::config::MapQuality;
use crate::core::geo::{inverse_gd, GeoCoord};
use crate::tiles::id::TileId;
use crate::tiles::source::TileProjection;
use crate::tiles::stacked::{StackedTile, StackedTileLoader};
use image::Rgba;
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

/// Tiles a sampler keeps at hand; four covers a bilinear lookup across a corner
const RECENT_TILES: usize = 4;

/// Looks up texels of the stacked tile pyramid at one level.
///
/// Each render worker owns one sampler; recently used tiles are memoized so a
/// scanline asks the loader once per tile it crosses.
pub struct TileSampler<'a> {
    loader: &'a StackedTileLoader,
    theme: u64,
    level: u32,
    tile_width: u32,
    tile_height: u32,
    global_width: i64,
    global_height: i64,
    projection: TileProjection,
    bilinear: bool,
    opaque: bool,
    recent: Vec<(u32, u32, Arc<StackedTile>)>,
}

impl<'a> TileSampler<'a> {
    pub fn new(loader: &'a StackedTileLoader, level: i32, quality: MapQuality) -> Self {
        let decorator = loader.decorator();
        let level = level.max(0);
        let (tile_width, tile_height) = decorator.tile_size();
        let (tile_width, tile_height) = (tile_width.max(1), tile_height.max(1));
        Self {
            loader,
            theme: decorator.theme(),
            level: level as u32,
            tile_width,
            tile_height,
            global_width: tile_width as i64 * decorator.tile_column_count(level).max(1) as i64,
            global_height: tile_height as i64 * decorator.tile_row_count(level).max(1) as i64,
            projection: decorator.tile_projection(),
            bilinear: quality.is_high(),
            opaque: !quality.is_high(),
            recent: Vec::with_capacity(RECENT_TILES),
        }
    }

    /// Size of the whole map at this level, in texels
    pub fn global_size(&self) -> (f64, f64) {
        (self.global_width as f64, self.global_height as f64)
    }

    pub fn projection(&self) -> TileProjection {
        self.projection
    }

    /// Texel-space position of a geographic coordinate
    pub fn global_position(&self, coord: GeoCoord) -> (f64, f64) {
        let (width, height) = self.global_size();
        let x = (coord.lon + PI) / (2.0 * PI) * width;
        let y = match self.projection {
            TileProjection::Equirectangular => (FRAC_PI_2 - coord.lat) / PI * height,
            TileProjection::Mercator => (PI - inverse_gd(coord.lat)) / (2.0 * PI) * height,
        };
        (x, y)
    }

    pub fn sample(&mut self, coord: GeoCoord) -> Rgba<u8> {
        let (x, y) = self.global_position(coord);
        self.sample_global(x, y)
    }

    /// Sample at a texel-space position. Longitude wraps, latitude clamps.
    pub fn sample_global(&mut self, x: f64, y: f64) -> Rgba<u8> {
        let mut pixel = if self.bilinear {
            self.bilinear_texel(x, y)
        } else {
            self.texel(x.floor() as i64, y.floor() as i64)
        };
        if self.opaque {
            pixel.0[3] = 255;
        }
        pixel
    }

    fn bilinear_texel(&mut self, x: f64, y: f64) -> Rgba<u8> {
        let fx = x - 0.5;
        let fy = y - 0.5;
        let (x0, y0) = (fx.floor(), fy.floor());
        let (tx, ty) = (fx - x0, fy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.texel(x0, y0);
        let p10 = self.texel(x0 + 1, y0);
        let p01 = self.texel(x0, y0 + 1);
        let p11 = self.texel(x0 + 1, y0 + 1);

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = p00.0[c] as f64 * (1.0 - tx) + p10.0[c] as f64 * tx;
            let bottom = p01.0[c] as f64 * (1.0 - tx) + p11.0[c] as f64 * tx;
            out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
        }
        Rgba(out)
    }

    fn texel(&mut self, x: i64, y: i64) -> Rgba<u8> {
        let x = x.rem_euclid(self.global_width);
        let y = y.clamp(0, self.global_height - 1);
        let tile_x = (x / self.tile_width as i64) as u32;
        let tile_y = (y / self.tile_height as i64) as u32;
        let tile = self.tile(tile_x, tile_y);
        let image = tile.image();
        if image.width() == 0 || image.height() == 0 {
            return Rgba([0, 0, 0, 0]);
        }
        let px = ((x % self.tile_width as i64) as u32).min(image.width() - 1);
        let py = ((y % self.tile_height as i64) as u32).min(image.height() - 1);
        *image.get_pixel(px, py)
    }

    fn tile(&mut self, x: u32, y: u32) -> Arc<StackedTile> {
        if let Some(pos) = self.recent.iter().position(|(tx, ty, _)| *tx == x && *ty == y) {
            return self.recent[pos].2.clone();
        }
        let tile = self.loader.tile(TileId::new(self.theme, self.level, x, y));
        if self.recent.len() == RECENT_TILES {
            self.recent.remove(0);
        }
        self.recent.push((x, y, tile.clone()));
        tile
    }
}

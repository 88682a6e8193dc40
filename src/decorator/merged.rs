use super::colorizer::TextureColorizer;
use super::sun::{shade_tile, SunPosition};
use crate::core::constants::TILE_SIZE;
use crate::tiles::addressing::TileGeometry;
use crate::tiles::download::DownloadUsage;
use crate::tiles::id::TileId;
use crate::tiles::loader::TileLoader;
use crate::tiles::source::{Blending, TextureSource, TileProjection};
use crate::tiles::stacked::StackedTile;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::borrow::Cow;
use std::sync::Arc;

const TILE_BORDER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Composes the per-layer tiles of one tile id into a stacked tile and applies
/// the decorations in a fixed order: relief colorizer, sun shading (with city
/// lights), tile borders.
pub struct MergedLayerDecorator {
    loader: TileLoader,
    theme: u64,
    textures: Vec<Arc<TextureSource>>,
    city_lights: Option<Arc<TextureSource>>,
    colorizer: Option<TextureColorizer>,
    sun: SunPosition,
    show_sun_shading: bool,
    show_city_lights: bool,
    show_tile_borders: bool,
}

impl MergedLayerDecorator {
    pub fn new(loader: TileLoader) -> Self {
        Self {
            loader,
            theme: 0,
            textures: Vec::new(),
            city_lights: None,
            colorizer: None,
            sun: SunPosition::default(),
            show_sun_shading: false,
            show_city_lights: true,
            show_tile_borders: false,
        }
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }

    pub fn theme(&self) -> u64 {
        self.theme
    }

    pub fn set_theme(&mut self, theme: u64) {
        self.theme = theme;
    }

    /// Replace the layer list, bottom layer first
    pub fn set_texture_layers(&mut self, textures: Vec<Arc<TextureSource>>) {
        self.textures = textures;
    }

    pub fn texture_layers(&self) -> &[Arc<TextureSource>] {
        &self.textures
    }

    pub fn texture_layers_size(&self) -> usize {
        self.textures.len()
    }

    pub fn set_city_lights(&mut self, source: Option<TextureSource>) {
        self.city_lights = source.map(Arc::new);
    }

    pub fn set_colorizer(&mut self, colorizer: Option<TextureColorizer>) {
        self.colorizer = colorizer;
    }

    pub fn colorizer(&self) -> Option<&TextureColorizer> {
        self.colorizer.as_ref()
    }

    pub fn colorizer_mut(&mut self) -> Option<&mut TextureColorizer> {
        self.colorizer.as_mut()
    }

    pub fn set_show_relief(&mut self, show: bool) {
        if let Some(colorizer) = self.colorizer.as_mut() {
            colorizer.set_show_relief(show);
        }
    }

    pub fn set_show_sun_shading(&mut self, show: bool) {
        self.show_sun_shading = show;
    }

    pub fn show_sun_shading(&self) -> bool {
        self.show_sun_shading
    }

    pub fn set_show_city_lights(&mut self, show: bool) {
        self.show_city_lights = show;
    }

    pub fn show_city_lights(&self) -> bool {
        self.show_city_lights
    }

    pub fn set_show_tile_borders(&mut self, show: bool) {
        self.show_tile_borders = show;
    }

    pub fn show_tile_borders(&self) -> bool {
        self.show_tile_borders
    }

    pub fn set_sun_position(&mut self, sun: SunPosition) {
        self.sun = sun;
    }

    pub fn sun_position(&self) -> SunPosition {
        self.sun
    }

    /// Pyramid geometry of the bottom layer
    pub fn geometry(&self) -> TileGeometry {
        self.textures
            .first()
            .map(|t| TileGeometry {
                max_level: self.maximum_tile_level(),
                ..t.geometry()
            })
            .unwrap_or(TileGeometry {
                tile_width: TILE_SIZE,
                tile_height: TILE_SIZE,
                level_zero_columns: 2,
                level_zero_rows: 1,
                max_level: 0,
            })
    }

    pub fn tile_size(&self) -> (u32, u32) {
        let geometry = self.geometry();
        (geometry.tile_width, geometry.tile_height)
    }

    pub fn tile_projection(&self) -> TileProjection {
        self.textures.first().map(|t| t.projection).unwrap_or_default()
    }

    pub fn tile_column_count(&self, level: i32) -> u32 {
        self.geometry().column_count(level)
    }

    pub fn tile_row_count(&self, level: i32) -> u32 {
        self.geometry().row_count(level)
    }

    /// Deepest level any layer provides
    pub fn maximum_tile_level(&self) -> i32 {
        self.textures.iter().map(|t| t.max_level).max().unwrap_or(0)
    }

    fn city_lights_active(&self) -> Option<&Arc<TextureSource>> {
        self.city_lights
            .as_ref()
            .filter(|_| self.show_sun_shading && self.show_city_lights)
    }

    /// Layers that take part in a stacked tile at `level`, city lights last
    pub fn fetch_sources(&self, level: u32) -> Vec<Arc<TextureSource>> {
        self.textures
            .iter()
            .chain(self.city_lights_active())
            .filter(|t| t.max_level >= level as i32)
            .cloned()
            .collect()
    }

    /// Fetch every layer of a stacked tile, disk first
    pub fn request_tiles(&self, id: &TileId) {
        for source in self.fetch_sources(id.level) {
            self.loader.request_tile(&source, *id, DownloadUsage::Browse);
        }
    }

    /// Re-download every layer of a stacked tile
    pub fn download_tiles(&self, id: &TileId, usage: DownloadUsage) {
        for source in self.fetch_sources(id.level) {
            self.loader.download_tile(&source, *id, usage);
        }
    }

    /// Composite the available layer rasters bottom to top and decorate the result
    pub fn merge(&self, id: TileId, layers: &[(&TextureSource, &RgbaImage)]) -> StackedTile {
        let (width, height) = self.tile_size();
        let mut canvas = RgbaImage::new(width, height);
        let mut night = None;
        let city_lights = self.city_lights.as_ref().map(|s| s.name.as_str());
        let lights_active = self.city_lights_active().is_some();

        for (source, image) in layers {
            // the night raster is never blended as a regular layer
            if Some(source.name.as_str()) == city_lights {
                if lights_active {
                    night = Some(fit(image, width, height).into_owned());
                }
                continue;
            }
            let image = fit(image, width, height);
            blend_onto(&mut canvas, &image, source.blending);
        }

        let geometry = self.geometry();
        let projection = self.tile_projection();
        if let Some(colorizer) = &self.colorizer {
            colorizer.colorize(&mut canvas, &id, &geometry, projection);
        }
        if self.show_sun_shading {
            shade_tile(&mut canvas, night.as_ref(), &id, &geometry, projection, &self.sun);
        }
        if self.show_tile_borders {
            draw_border(&mut canvas);
        }
        StackedTile::new(id, canvas)
    }
}

fn fit(image: &RgbaImage, width: u32, height: u32) -> Cow<'_, RgbaImage> {
    if image.dimensions() == (width, height) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(imageops::resize(image, width, height, FilterType::Triangle))
    }
}

/// Separable blend followed by source-over compositing
pub fn blend_onto(canvas: &mut RgbaImage, layer: &RgbaImage, blending: Blending) {
    for (dst, src) in canvas.pixels_mut().zip(layer.pixels()) {
        *dst = blend_pixel(*dst, *src, blending);
    }
}

pub fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>, blending: Blending) -> Rgba<u8> {
    let alpha_s = src.0[3] as f32 / 255.0;
    let alpha_b = dst.0[3] as f32 / 255.0;
    if alpha_s <= 0.0 {
        return dst;
    }
    let alpha_o = alpha_s + alpha_b * (1.0 - alpha_s);
    let mut out = [0u8; 4];
    for i in 0..3 {
        let cs = src.0[i] as f32 / 255.0;
        let cb = dst.0[i] as f32 / 255.0;
        let mixed = match blending {
            Blending::SourceOver => cs,
            Blending::Multiply => cs * cb,
            Blending::Lighten => cs.max(cb),
        };
        let cs = (1.0 - alpha_b) * cs + alpha_b * mixed;
        let co = alpha_s * cs + (1.0 - alpha_s) * alpha_b * cb;
        out[i] = (co / alpha_o * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (alpha_o * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

fn draw_border(canvas: &mut RgbaImage) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    for x in 0..width {
        canvas.put_pixel(x, 0, TILE_BORDER_COLOR);
        canvas.put_pixel(x, height - 1, TILE_BORDER_COLOR);
    }
    for y in 0..height {
        canvas.put_pixel(0, y, TILE_BORDER_COLOR);
        canvas.put_pixel(width - 1, y, TILE_BORDER_COLOR);
    }
}

//! Scanline texture mappers: fill the view canvas from the stacked tile pyramid.
//!
//! Each projection has its own mapper; [`TextureMapper`] picks one for the view.
//! Rows are split across a rayon pool, every worker writing only its own rows.

pub mod equirect;
pub mod mercator;
pub mod sampler;
pub mod spherical;
pub mod tile_scaling;

use crate::core::config::{MapQuality, TextureLayerConfig};
use crate::core::viewport::{Projection, Viewport};
use crate::tiles::source::TileProjection;
use crate::tiles::stacked::StackedTileLoader;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use rayon::ThreadPool;
use sampler::TileSampler;

pub use equirect::EquirectScanlineTextureMapper;
pub use mercator::MercatorScanlineTextureMapper;
pub use spherical::SphericalScanlineTextureMapper;
pub use tile_scaling::TileScalingTextureMapper;

/// Everything a mapper needs for one render pass
pub struct MapContext<'a> {
    pub viewport: &'a Viewport,
    pub loader: &'a StackedTileLoader,
    pub level: i32,
    pub quality: MapQuality,
    pub pool: &'a ThreadPool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureMapper {
    Spherical(SphericalScanlineTextureMapper),
    Equirect(EquirectScanlineTextureMapper),
    Mercator(MercatorScanlineTextureMapper),
    TileScaling(TileScalingTextureMapper),
}

impl TextureMapper {
    /// Mapper for a view projection. Flat views whose projection matches the
    /// tiles use tile scaling when the config prefers it.
    pub fn for_view(projection: Projection, tile_projection: TileProjection, config: &TextureLayerConfig) -> Self {
        match projection {
            Projection::Spherical => {
                Self::Spherical(SphericalScanlineTextureMapper::new(config.interpolation_step))
            }
            Projection::Equirectangular => {
                if config.prefer_tile_scaling && tile_projection == TileProjection::Equirectangular {
                    Self::TileScaling(TileScalingTextureMapper)
                } else {
                    Self::Equirect(EquirectScanlineTextureMapper)
                }
            }
            Projection::Mercator => {
                if config.prefer_tile_scaling && tile_projection == TileProjection::Mercator {
                    Self::TileScaling(TileScalingTextureMapper)
                } else {
                    Self::Mercator(MercatorScanlineTextureMapper)
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Spherical(_) => "spherical",
            Self::Equirect(_) => "equirectangular",
            Self::Mercator(_) => "mercator",
            Self::TileScaling(_) => "tile-scaling",
        }
    }

    pub fn map_texture(&self, canvas: &mut RgbaImage, context: &MapContext<'_>) {
        log::trace!(
            "{} mapper at level {} for {}x{}",
            self.name(),
            context.level,
            canvas.width(),
            canvas.height()
        );
        match self {
            Self::Spherical(mapper) => mapper.map_texture(canvas, context),
            Self::Equirect(mapper) => mapper.map_texture(canvas, context),
            Self::Mercator(mapper) => mapper.map_texture(canvas, context),
            Self::TileScaling(mapper) => mapper.map_texture(canvas, context),
        }
    }
}

/// Run `map_row` for every canvas row on the context's pool
pub(crate) fn for_each_row<F>(canvas: &mut RgbaImage, context: &MapContext<'_>, map_row: F)
where
    F: Fn(&mut TileSampler<'_>, u32, &mut [u8]) + Sync + Send,
{
    let row_bytes = canvas.width() as usize * 4;
    if row_bytes == 0 {
        return;
    }
    let loader = context.loader;
    let level = context.level;
    let quality = context.quality;
    context.pool.install(|| {
        canvas
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each_init(
                || TileSampler::new(loader, level, quality),
                |sampler, (y, row)| map_row(sampler, y as u32, row),
            );
    });
}

pub(crate) fn put(row: &mut [u8], x: u32, pixel: Rgba<u8>) {
    let offset = x as usize * 4;
    row[offset..offset + 4].copy_from_slice(&pixel.0);
}

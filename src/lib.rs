//! # texlayer
//!
//! Pyramid-tiled texture layer for globe and flat map views.
//!
//! Tiles of one or more texture sources are fetched from an on-disk cache or the
//! network, stacked into composite tiles, decorated (relief coloring, sun shading,
//! city lights) and projected onto the view canvas by scanline texture mappers.

pub mod core;
pub mod data;
pub mod decorator;
pub mod layers;
pub mod mapper;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{MapQuality, TextureLayerConfig, TextureLayerProfile},
    geo::GeoCoord,
    viewport::{Projection, Viewport},
};

pub use tiles::{
    download::{DownloadService, DownloadUsage},
    id::TileId,
    registry::{LayerSettings, MapTheme},
    source::{Blending, TextureSource, TileProjection},
    stacked::{StackedTile, StackedTileLoader},
};

pub use decorator::sun::SunPosition;
pub use layers::texture::{TextureLayer, TextureLayerEvent};
pub use mapper::TextureMapper;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Palette error: {0}")]
    Palette(String),

    #[error("Mask error: {0}")]
    Mask(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Install `env_logger` once, honoring `RUST_LOG`
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

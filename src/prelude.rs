//! Prelude module for common texlayer types and traits
//!
//! `use texlayer::prelude::*;`

pub use crate::core::{
    config::{MapQuality, TextureLayerConfig, TextureLayerProfile},
    geo::GeoCoord,
    viewport::{Projection, Viewport},
};

pub use crate::tiles::{
    addressing::TileGeometry,
    download::{DownloadCallback, DownloadService, DownloadUsage},
    id::TileId,
    loader::{TileCompletion, TileLoader},
    registry::{LayerSettings, MapTheme, TextureRegistry},
    source::{Blending, TextureSource, TileProjection},
    stacked::{StackedTile, StackedTileLoader},
};

#[cfg(feature = "tokio-runtime")]
pub use crate::tiles::download::{HttpDownloadConfig, HttpDownloadService};

pub use crate::decorator::{colorizer::TextureColorizer, sun::SunPosition, MergedLayerDecorator};
pub use crate::data::mask::MaskDocument;
pub use crate::layers::{
    debounce::RepaintScheduler,
    texture::{TextureLayer, TextureLayerEvent},
};
pub use crate::mapper::TextureMapper;

pub use crate::{Error as TexLayerError, Result};

pub use std::{
    sync::Arc,
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use std::future::Future;
pub use std::pin::Pin;

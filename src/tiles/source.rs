use super::addressing::TileGeometry;
use super::id::TileId;
use crate::core::constants::TILE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Projection the tiles of a source are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileProjection {
    Equirectangular,
    Mercator,
}

impl Default for TileProjection {
    fn default() -> Self {
        Self::Equirectangular
    }
}

/// How a layer is composited over the layers below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blending {
    SourceOver,
    Multiply,
    Lighten,
}

impl Default for Blending {
    fn default() -> Self {
        Self::SourceOver
    }
}

/// Descriptor of one tiled texture layer of a map theme.
///
/// `url_template` understands `{z}`, `{x}`, `{y}` and `{s}` (server rotation).
/// `{y}` honors `tms` by flipping the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSource {
    /// Layer key, matched against the theme's layer settings
    pub name: String,
    /// Directory of this layer below the on-disk cache root
    pub source_dir: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub projection: TileProjection,
    pub max_level: i32,
    pub level_zero_columns: u32,
    pub level_zero_rows: u32,
    pub url_template: Option<String>,
    pub servers: Vec<String>,
    /// File extension of stored tiles
    pub file_format: String,
    pub tms: bool,
    pub enabled: bool,
    pub blending: Blending,
}

impl Default for TextureSource {
    fn default() -> Self {
        Self {
            name: String::new(),
            source_dir: String::new(),
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            projection: TileProjection::Equirectangular,
            max_level: 0,
            level_zero_columns: 2,
            level_zero_rows: 1,
            url_template: None,
            servers: Vec::new(),
            file_format: "png".to_string(),
            tms: false,
            enabled: true,
            blending: Blending::SourceOver,
        }
    }
}

impl TextureSource {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source_dir: name.clone(),
            name,
            ..Self::default()
        }
    }

    pub fn geometry(&self) -> TileGeometry {
        TileGeometry {
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            level_zero_columns: self.level_zero_columns,
            level_zero_rows: self.level_zero_rows,
            max_level: self.max_level,
        }
    }

    /// Network locator of a tile, `None` for disk-only sources
    pub fn url(&self, id: &TileId) -> Option<String> {
        let template = self.url_template.as_ref()?;
        let y = if self.tms {
            self.geometry().row_count(id.level as i32).saturating_sub(1).saturating_sub(id.y)
        } else {
            id.y
        };
        let mut url = template
            .replace("{z}", &id.level.to_string())
            .replace("{x}", &id.x.to_string())
            .replace("{y}", &y.to_string());
        if url.contains("{s}") {
            let server = if self.servers.is_empty() {
                ""
            } else {
                let idx = ((id.x + id.y) % self.servers.len() as u32) as usize;
                self.servers[idx].as_str()
            };
            url = url.replace("{s}", server);
        }
        Some(url)
    }

    /// Location of a tile relative to the cache root:
    /// `<source_dir>/<level>/<row>/<row>_<column>.<ext>`
    pub fn relative_path(&self, id: &TileId) -> PathBuf {
        let row = format!("{:06}", id.y);
        PathBuf::from(&self.source_dir)
            .join(id.level.to_string())
            .join(&row)
            .join(format!("{}_{:06}.{}", row, id.x, self.file_format))
    }
}

//! Tile addressing: zoom level ↔ globe radius, and per-level tile counts.
//!
//! The tile resolution doubles with each level, so the level follows from the
//! radius through `log2`. All functions are pure.

use crate::core::constants::TILE_LEVEL_SNAP_FACTOR;
use serde::{Deserialize, Serialize};

/// Tile pyramid geometry shared by the layers of one map theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGeometry {
    pub tile_width: u32,
    pub tile_height: u32,
    pub level_zero_columns: u32,
    pub level_zero_rows: u32,
    pub max_level: i32,
}

impl TileGeometry {
    pub fn column_count(&self, level: i32) -> u32 {
        level_to_column(self.level_zero_columns, level)
    }

    pub fn row_count(&self, level: i32) -> u32 {
        level_to_row(self.level_zero_rows, level)
    }

    /// Width in pixels of the whole map at `level`
    pub fn global_width(&self, level: i32) -> u64 {
        self.tile_width as u64 * self.column_count(level) as u64
    }

    /// Height in pixels of the whole map at `level`
    pub fn global_height(&self, level: i32) -> u64 {
        self.tile_height as u64 * self.row_count(level) as u64
    }

    pub fn zoom_level(&self, radius: f64) -> i32 {
        zoom_level(radius, self.tile_width, self.level_zero_columns, self.max_level)
    }

    pub fn preferred_radius_ceil(&self, radius: i32) -> i32 {
        preferred_radius_ceil(radius, self.tile_width, self.level_zero_columns)
    }

    pub fn preferred_radius_floor(&self, radius: i32) -> i32 {
        preferred_radius_floor(radius, self.tile_width, self.level_zero_columns)
    }
}

/// Number of tile columns at `level`. Zero for negative levels.
pub fn level_to_column(level_zero_columns: u32, level: i32) -> u32 {
    if level < 0 {
        return 0;
    }
    level_zero_columns.checked_shl(level as u32).unwrap_or(u32::MAX)
}

/// Number of tile rows at `level`. Zero for negative levels.
pub fn level_to_row(level_zero_rows: u32, level: i32) -> u32 {
    if level < 0 {
        return 0;
    }
    level_zero_rows.checked_shl(level as u32).unwrap_or(u32::MAX)
}

/// Tile level for a globe radius.
///
/// `floor(log2(max(1, 4·radius / (tileWidth·levelZeroColumns))) · snap)`, clamped to
/// `[0, max_level]`. The snap factor makes a radius exactly on a power-of-two
/// boundary resolve to the sharper level.
pub fn zoom_level(radius: f64, tile_width: u32, level_zero_columns: u32, max_level: i32) -> i32 {
    let level_zero_width = (tile_width as f64 * level_zero_columns as f64).max(1.0);
    // limit to 1 so that tiny or degenerate radii map to level 0
    let linear_level = (radius * 4.0 / level_zero_width).max(1.0);
    let tile_level_f = linear_level.log2() * TILE_LEVEL_SNAP_FACTOR;
    (tile_level_f.floor() as i32).clamp(0, max_level.max(0))
}

/// Smallest radius that maps to the level at or above the one `radius` falls in.
pub fn preferred_radius_ceil(radius: i32, tile_width: u32, level_zero_columns: u32) -> i32 {
    let level = fractional_level(radius, tile_width, level_zero_columns).ceil() as i32;
    radius_for_level(level, tile_width, level_zero_columns)
}

/// Largest level-aligned radius at or below `radius`.
pub fn preferred_radius_floor(radius: i32, tile_width: u32, level_zero_columns: u32) -> i32 {
    let level = fractional_level(radius, tile_width, level_zero_columns).floor() as i32;
    radius_for_level(level, tile_width, level_zero_columns)
}

fn fractional_level(radius: i32, tile_width: u32, level_zero_columns: u32) -> f64 {
    let level_zero_width = (tile_width as f64 * level_zero_columns as f64).max(1.0);
    let linear_level = 4.0 * radius.max(1) as f64 / level_zero_width;
    linear_level.log2()
}

fn radius_for_level(level: i32, tile_width: u32, level_zero_columns: u32) -> i32 {
    let base = (tile_width as i64 * level_zero_columns as i64) / 4;
    let radius = if level < 0 {
        base.checked_shr((-level) as u32).unwrap_or(0)
    } else {
        base.checked_shl(level as u32)
            .filter(|r| *r <= i32::MAX as i64)
            .unwrap_or(i32::MAX as i64)
    };
    radius as i32
}

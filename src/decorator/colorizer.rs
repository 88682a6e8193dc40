//! Relief colorizer: maps the grey value of elevation tiles to sea or land colors
//! with optional bump shading.

use crate::core::constants::{RELIEF_LEVELS, RELIEF_NEUTRAL};
use crate::data::mask::{MaskDocument, MaskIndex};
use crate::decorator::sun::{tile_column_lon, tile_row_lat};
use crate::tiles::addressing::TileGeometry;
use crate::tiles::id::TileId;
use crate::tiles::source::TileProjection;
use crate::{Error, Result};
use image::RgbaImage;
use std::path::Path;

const PALETTE_SIZE: usize = 256;

/// Relief shading strength per bump level away from neutral
const BUMP_STRENGTH: f64 = 0.04;

type Palette = Vec<[u8; 3]>;

pub struct TextureColorizer {
    /// One 512-entry table (sea then land) per bump level
    palettes: Vec<Palette>,
    sea: MaskIndex,
    land: MaskIndex,
    show_relief: bool,
}

impl TextureColorizer {
    /// Builds the colorizer from sea and land legend files.
    ///
    /// One unreadable legend falls back to a grey ramp; both unreadable is an error.
    pub fn from_files(sea_file: &Path, land_file: &Path) -> Result<Self> {
        let sea = read_legend(sea_file);
        let land = read_legend(land_file);
        match (sea, land) {
            (Err(sea_err), Err(land_err)) => Err(Error::Palette(format!(
                "no readable palette: {}; {}",
                sea_err, land_err
            ))),
            (sea, land) => {
                let sea = sea.unwrap_or_else(|e| {
                    log::warn!("sea palette: {}", e);
                    grey_ramp()
                });
                let land = land.unwrap_or_else(|e| {
                    log::warn!("land palette: {}", e);
                    grey_ramp()
                });
                Ok(Self::from_gradients(&sea, &land))
            }
        }
    }

    /// Builds the colorizer from gradient stops, evenly spaced over the grey range
    pub fn from_gradients(sea: &[[u8; 3]], land: &[[u8; 3]]) -> Self {
        let sea = interpolate(sea);
        let land = interpolate(land);
        let palettes = (0..RELIEF_LEVELS)
            .map(|level| {
                let factor = 1.0 + (level as f64 - RELIEF_NEUTRAL as f64) * BUMP_STRENGTH;
                sea.iter()
                    .chain(land.iter())
                    .map(|color| scale(color, factor))
                    .collect()
            })
            .collect();
        Self {
            palettes,
            sea: MaskIndex::new(),
            land: MaskIndex::new(),
            show_relief: true,
        }
    }

    pub fn add_sea_document(&mut self, document: &MaskDocument) {
        self.sea.add_document(document);
    }

    pub fn add_land_document(&mut self, document: &MaskDocument) {
        self.land.add_document(document);
    }

    pub fn set_show_relief(&mut self, show: bool) {
        self.show_relief = show;
    }

    pub fn show_relief(&self) -> bool {
        self.show_relief
    }

    /// Palette color for a grey value
    pub fn color(&self, grey: u8, is_land: bool, bump: usize) -> [u8; 3] {
        let offset = if is_land { PALETTE_SIZE } else { 0 };
        self.palettes[bump.min(RELIEF_LEVELS - 1)][offset + grey as usize]
    }

    /// Recolor a stacked tile in place. Alpha is preserved.
    pub fn colorize(&self, tile: &mut RgbaImage, id: &TileId, geometry: &TileGeometry, projection: TileProjection) {
        let (width, height) = tile.dimensions();
        let greys: Vec<u8> = tile.pixels().map(|p| grey(&p.0)).collect();
        let at = |x: u32, y: u32| greys[(y * width + x) as usize];

        for y in 0..height {
            let lat = tile_row_lat(id, y, geometry, projection).to_degrees();
            let sea_row = (!self.sea.is_empty()).then(|| self.sea.row_spans(lat));
            let land_row = (!self.land.is_empty()).then(|| self.land.row_spans(lat));

            for x in 0..width {
                let value = at(x, y);
                let is_land = match (&land_row, &sea_row) {
                    (None, None) => value > 0,
                    (land, sea) => {
                        let lon = tile_column_lon(id, x, geometry).to_degrees();
                        let in_land = land.as_ref().map_or(true, |row| row.contains(lon));
                        let in_sea = sea.as_ref().map_or(false, |row| row.contains(lon));
                        in_land && !in_sea
                    }
                };
                let bump = if self.show_relief {
                    let next = at((x + 1).min(width - 1), (y + 1).min(height - 1));
                    let diff = (value as i32 - next as i32) / 3;
                    (RELIEF_NEUTRAL as i32 + diff).clamp(0, RELIEF_LEVELS as i32 - 1) as usize
                } else {
                    RELIEF_NEUTRAL
                };
                let [r, g, b] = self.color(value, is_land, bump);
                let pixel = tile.get_pixel_mut(x, y);
                pixel.0[0] = r;
                pixel.0[1] = g;
                pixel.0[2] = b;
            }
        }
    }
}

/// Parses a palette legend: one color per line, either `r g b` or `#rrggbb`.
/// Blank lines and `#` comments are skipped.
pub fn parse_legend(text: &str) -> Result<Vec<[u8; 3]>> {
    let mut colors = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || (line.starts_with('#') && !is_hex_color(line)) {
            continue;
        }
        let color = if is_hex_color(line) {
            let hex = &line[1..7];
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
            [channel(0), channel(2), channel(4)]
                .into_iter()
                .collect::<std::result::Result<Vec<_>, _>>()
                .ok()
        } else {
            line.split_whitespace()
                .take(3)
                .map(|v| v.parse::<u8>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .ok()
                .filter(|v| v.len() == 3)
        };
        match color {
            Some(c) => colors.push([c[0], c[1], c[2]]),
            None => {
                return Err(Error::Palette(format!("line {}: cannot parse '{}'", number + 1, line)))
            }
        }
    }
    if colors.is_empty() {
        return Err(Error::Palette("legend has no colors".to_string()));
    }
    Ok(colors)
}

pub fn read_legend(path: &Path) -> Result<Vec<[u8; 3]>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Palette(format!("{}: {}", path.display(), e)))?;
    parse_legend(&text)
}

fn is_hex_color(line: &str) -> bool {
    line.starts_with('#')
        && line.get(1..7).map_or(false, |hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
        && line.get(7..).map_or(false, |rest| rest.trim().is_empty())
}

fn grey_ramp() -> Vec<[u8; 3]> {
    vec![[0, 0, 0], [255, 255, 255]]
}

/// Linear interpolation of evenly spaced stops to the full grey range
fn interpolate(stops: &[[u8; 3]]) -> Vec<[u8; 3]> {
    if stops.len() == 1 {
        return vec![stops[0]; PALETTE_SIZE];
    }
    (0..PALETTE_SIZE)
        .map(|i| {
            let t = i as f64 / (PALETTE_SIZE - 1) as f64 * (stops.len() - 1) as f64;
            let lower = (t.floor() as usize).min(stops.len() - 2);
            let frac = t - lower as f64;
            let (a, b) = (stops[lower], stops[lower + 1]);
            let mut color = [0u8; 3];
            for c in 0..3 {
                color[c] = (a[c] as f64 + (b[c] as f64 - a[c] as f64) * frac).round() as u8;
            }
            color
        })
        .collect()
}

fn scale(color: &[u8; 3], factor: f64) -> [u8; 3] {
    color.map(|c| (c as f64 * factor).round().clamp(0.0, 255.0) as u8)
}

fn grey(rgba: &[u8; 4]) -> u8 {
    // integer luma weights
    ((rgba[0] as u32 * 11 + rgba[1] as u32 * 16 + rgba[2] as u32 * 5) / 32) as u8
}

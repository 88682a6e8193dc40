use fxhash::FxHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Address of one pyramid tile: (map theme, zoom level, column, row).
///
/// Ordering follows the tuple order of the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub theme: u64,
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(theme: u64, level: u32, x: u32, y: u32) -> Self {
        Self { theme, level, x, y }
    }

    /// Stable numeric id for a map theme name
    pub fn theme_id(name: &str) -> u64 {
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        hasher.finish()
    }

    /// The tile at `level` that covers this one. `None` if `level` is not coarser.
    pub fn ancestor(&self, level: u32) -> Option<TileId> {
        if level >= self.level {
            return None;
        }
        let shift = self.level - level;
        Some(TileId::new(self.theme, level, self.x >> shift, self.y >> shift))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{}/{}/{}", self.theme, self.level, self.x, self.y)
    }
}

//! Tile pyramid plumbing: addressing, sources, fetching, caching and stacking.

pub mod addressing;
pub mod cache;
pub mod download;
pub mod id;
pub mod loader;
pub mod registry;
pub mod source;
pub mod stacked;

// Re-exports for convenience
pub use id::TileId;
pub use loader::{TileCompletion, TileLoader};
pub use source::{TextureSource, TileProjection};
pub use stacked::{StackedTile, StackedTileLoader};

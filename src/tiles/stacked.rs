use super::cache::{CacheStats, VolatileCache};
use super::download::DownloadUsage;
use super::id::TileId;
use super::loader::TileCompletion;
use super::source::TextureSource;
use crate::decorator::MergedLayerDecorator;
use crate::prelude::{HashMap, HashSet};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::{Arc, Mutex};

/// Composite of all enabled layers for one tile id, decorated and ready to map.
///
/// Keeps the per-layer rasters it was stacked from so a reload can replace
/// single layers.
#[derive(Debug, Clone)]
pub struct StackedTile {
    id: TileId,
    image: Arc<RgbaImage>,
    layers: Vec<(String, Arc<RgbaImage>)>,
    placeholder: bool,
}

impl StackedTile {
    pub fn new(id: TileId, image: impl Into<Arc<RgbaImage>>) -> Self {
        Self {
            id,
            image: image.into(),
            layers: Vec::new(),
            placeholder: false,
        }
    }

    /// Stand-in shown until the real tile arrives; never cached
    pub fn placeholder(id: TileId, image: impl Into<Arc<RgbaImage>>) -> Self {
        Self {
            id,
            image: image.into(),
            layers: Vec::new(),
            placeholder: true,
        }
    }

    pub fn with_layers(mut self, layers: Vec<(String, Arc<RgbaImage>)>) -> Self {
        self.layers = layers;
        self
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Source raster of the named layer, if it contributed to this tile
    pub fn layer(&self, source: &str) -> Option<&Arc<RgbaImage>> {
        self.layers
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, image)| image)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Composite plus the layer rasters kept alongside it
    pub fn byte_count(&self) -> usize {
        self.image.as_raw().len()
            + self
                .layers
                .iter()
                .map(|(_, image)| image.as_raw().len())
                .sum::<usize>()
    }
}

struct LayerSlot {
    source: Arc<TextureSource>,
    image: Option<Arc<RgbaImage>>,
    reported: bool,
}

/// Per-layer rasters of a stacked tile while its fetches are outstanding
struct Assembly {
    slots: Vec<LayerSlot>,
    /// Re-stack after every layer, not only once all have reported
    progressive: bool,
}

impl Assembly {
    fn new(sources: Vec<Arc<TextureSource>>, progressive: bool) -> Self {
        Self {
            slots: sources
                .into_iter()
                .map(|source| LayerSlot {
                    source,
                    image: None,
                    reported: false,
                })
                .collect(),
            progressive,
        }
    }

    /// Start from the layers of an already stacked tile; a layer whose
    /// re-fetch fails keeps its previous raster
    fn seed_from(&mut self, tile: &StackedTile) {
        for slot in &mut self.slots {
            if let Some(image) = tile.layer(&slot.source.name) {
                slot.image = Some(image.clone());
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.reported)
    }

    fn has_image(&self) -> bool {
        self.slots.iter().any(|s| s.image.is_some())
    }
}

#[derive(Default)]
struct LoaderState {
    pending: HashSet<TileId>,
    assemblies: HashMap<TileId, Assembly>,
    visible: HashSet<TileId>,
    blank: Option<Arc<RgbaImage>>,
}

/// Hands out stacked tiles from the volatile cache and drives their assembly.
///
/// A miss returns a placeholder immediately (a scaled crop of the nearest cached
/// ancestor, or a transparent tile) and starts exactly one fetch per tile id until
/// every layer has reported back.
pub struct StackedTileLoader {
    decorator: MergedLayerDecorator,
    cache: VolatileCache,
    state: Mutex<LoaderState>,
}

impl StackedTileLoader {
    pub fn new(decorator: MergedLayerDecorator, volatile_cache_limit_kb: u64) -> Self {
        Self {
            decorator,
            cache: VolatileCache::new((volatile_cache_limit_kb as usize).saturating_mul(1024)),
            state: Mutex::new(LoaderState::default()),
        }
    }

    pub fn decorator(&self) -> &MergedLayerDecorator {
        &self.decorator
    }

    pub fn decorator_mut(&mut self) -> &mut MergedLayerDecorator {
        &mut self.decorator
    }

    /// Stacked tile for `id`, or a placeholder while it is being fetched
    pub fn tile(&self, id: TileId) -> Arc<StackedTile> {
        let cached = self.cache.get(&id);
        let mut sources = Vec::new();
        if let Ok(mut state) = self.state.lock() {
            state.visible.insert(id);
            if cached.is_none() && !state.pending.contains(&id) {
                sources = self.decorator.fetch_sources(id.level);
                if !sources.is_empty() {
                    state.pending.insert(id);
                    state.assemblies.insert(id, Assembly::new(sources.clone(), true));
                }
            }
        }
        if let Some(tile) = cached {
            return tile;
        }
        if !sources.is_empty() {
            log::debug!("fetching stacked tile {}", id);
            self.decorator.request_tiles(&id);
        }
        self.placeholder(id)
    }

    /// Fold one per-layer completion into its stacked tile.
    ///
    /// Returns whether the cache received a new composite. Completions for tiles
    /// nobody waits for any more, or for layers that are gone, are dropped.
    pub fn update_tile(&self, completion: TileCompletion) -> bool {
        let TileCompletion { id, source, image } = completion;
        let merged = {
            let Ok(mut state) = self.state.lock() else {
                return false;
            };
            let Some(assembly) = state.assemblies.get_mut(&id) else {
                log::debug!("dropping stale {} tile {}", source, id);
                return false;
            };
            let Some(slot) = assembly.slots.iter_mut().find(|s| s.source.name == source) else {
                log::debug!("dropping {} tile {} of a removed layer", source, id);
                return false;
            };
            slot.reported = true;
            if let Some(image) = image {
                slot.image = Some(Arc::new(image));
            }

            let complete = assembly.is_complete();
            let merged = if assembly.has_image() && (complete || assembly.progressive) {
                let layers: Vec<(&TextureSource, &RgbaImage)> = assembly
                    .slots
                    .iter()
                    .filter_map(|s| s.image.as_deref().map(|image| (s.source.as_ref(), image)))
                    .collect();
                let kept = assembly
                    .slots
                    .iter()
                    .filter_map(|s| s.image.clone().map(|image| (s.source.name.clone(), image)))
                    .collect();
                Some(self.decorator.merge(id, &layers).with_layers(kept))
            } else {
                None
            };
            if complete {
                // a tile without any layer image becomes eligible for a retry
                state.assemblies.remove(&id);
                state.pending.remove(&id);
            }
            merged
        };

        match merged {
            Some(tile) => {
                self.cache.insert(Arc::new(tile));
                true
            }
            None => false,
        }
    }

    /// Re-fetch all layers of a tile from the network at the given priority.
    ///
    /// A tile already in the cache stays on display until every layer has
    /// reported; layers that fail to download keep their cached raster.
    pub fn download_stacked_tile(&self, id: TileId, usage: DownloadUsage) {
        let sources = self.decorator.fetch_sources(id.level);
        if sources.is_empty() {
            return;
        }
        let cached = self.cache.peek(&id);
        if let Ok(mut state) = self.state.lock() {
            state.pending.insert(id);
            state.assemblies.entry(id).or_insert_with(|| {
                let mut assembly = Assembly::new(sources, cached.is_none());
                if let Some(tile) = &cached {
                    assembly.seed_from(tile);
                }
                assembly
            });
        }
        self.decorator.download_tiles(&id, usage);
    }

    /// Tile ids handed out since the last [`StackedTileLoader::reset_visible_tiles`]
    pub fn visible_tiles(&self) -> Vec<TileId> {
        let mut tiles: Vec<TileId> = self
            .state
            .lock()
            .map(|state| state.visible.iter().copied().collect())
            .unwrap_or_default();
        tiles.sort();
        tiles
    }

    pub fn reset_visible_tiles(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.visible.clear();
        }
    }

    /// Drop all cached composites and pending bookkeeping. Fetches already in
    /// flight are not cancelled; their results are discarded unless the tile is
    /// requested again before they arrive.
    pub fn clear(&self) {
        self.cache.clear();
        if let Ok(mut state) = self.state.lock() {
            state.pending.clear();
            state.assemblies.clear();
            state.blank = None;
        }
    }

    pub fn tile_count(&self) -> usize {
        self.cache.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().map(|state| state.pending.len()).unwrap_or(0)
    }

    pub fn volatile_cache_limit(&self) -> u64 {
        (self.cache.limit_bytes() / 1024) as u64
    }

    /// Change the byte budget; shrinking evicts immediately
    pub fn set_volatile_cache_limit(&self, kilobytes: u64) {
        self.cache.set_limit_bytes((kilobytes as usize).saturating_mul(1024));
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn placeholder(&self, id: TileId) -> Arc<StackedTile> {
        for level in (0..id.level).rev() {
            let Some(ancestor_id) = id.ancestor(level) else {
                continue;
            };
            if let Some(ancestor) = self.cache.peek(&ancestor_id) {
                if let Some(image) = scale_from_ancestor(&ancestor, &id) {
                    return Arc::new(StackedTile::placeholder(id, image));
                }
            }
        }
        self.blank(id)
    }

    /// Transparent stand-in; the pixel buffer is shared between requests
    fn blank(&self, id: TileId) -> Arc<StackedTile> {
        let (width, height) = self.decorator.tile_size();
        let Ok(mut state) = self.state.lock() else {
            return Arc::new(StackedTile::placeholder(id, RgbaImage::new(width, height)));
        };
        let image = match &state.blank {
            Some(blank) if blank.dimensions() == (width, height) => blank.clone(),
            _ => {
                let blank = Arc::new(RgbaImage::new(width, height));
                state.blank = Some(blank.clone());
                blank
            }
        };
        Arc::new(StackedTile::placeholder(id, image))
    }
}

/// Crop the part of `ancestor` that covers `id` and scale it up to full tile size
fn scale_from_ancestor(ancestor: &StackedTile, id: &TileId) -> Option<RgbaImage> {
    let depth = id.level.checked_sub(ancestor.id().level)?;
    let scale = 1u32.checked_shl(depth)?;
    let (width, height) = ancestor.image().dimensions();
    let sub_width = (width / scale).max(1);
    let sub_height = (height / scale).max(1);
    let x = ((id.x % scale) as u64 * width as u64 / scale as u64) as u32;
    let y = ((id.y % scale) as u64 * height as u64 / scale as u64) as u32;
    let crop = imageops::crop_imm(ancestor.image(), x, y, sub_width, sub_height).to_image();
    Some(imageops::resize(&crop, width, height, FilterType::Nearest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::download::OfflineDownloadService;
    use crate::tiles::loader::TileLoader;
    use image::Rgba;

    fn loader(dir: &std::path::Path) -> StackedTileLoader {
        let tiles = TileLoader::new(Arc::new(OfflineDownloadService), dir, Some(1)).unwrap();
        let mut decorator = MergedLayerDecorator::new(tiles);
        decorator.set_texture_layers(vec![
            Arc::new(TextureSource {
                tile_width: 4,
                tile_height: 4,
                max_level: 3,
                ..TextureSource::new("base")
            }),
            Arc::new(TextureSource {
                tile_width: 4,
                tile_height: 4,
                max_level: 3,
                ..TextureSource::new("overlay")
            }),
        ]);
        StackedTileLoader::new(decorator, 1024)
    }

    fn completion(id: TileId, source: &str, color: Option<[u8; 4]>) -> TileCompletion {
        TileCompletion {
            id,
            source: source.to_string(),
            image: color.map(|c| RgbaImage::from_pixel(4, 4, Rgba(c))),
        }
    }

    #[test]
    fn test_miss_returns_placeholder_and_marks_pending() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let id = TileId::new(0, 1, 1, 0);

        let tile = loader.tile(id);
        assert!(tile.is_placeholder());
        assert_eq!(tile.image().get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(loader.pending_count(), 1);
        assert_eq!(loader.visible_tiles(), vec![id]);
        assert_eq!(loader.tile_count(), 0);
    }

    #[test]
    fn test_blank_placeholders_carry_their_own_id() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let first = loader.tile(TileId::new(0, 1, 0, 0));
        let second = loader.tile(TileId::new(0, 1, 1, 1));

        assert_eq!(first.id(), TileId::new(0, 1, 0, 0));
        assert_eq!(second.id(), TileId::new(0, 1, 1, 1));
        assert!(std::ptr::eq(first.image(), second.image()));
    }

    #[test]
    fn test_reload_replaces_only_reported_layers() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let id = TileId::new(0, 1, 0, 1);
        loader.tile(id);
        loader.update_tile(completion(id, "base", Some([255, 0, 0, 255])));
        loader.update_tile(completion(id, "overlay", Some([0, 0, 0, 0])));
        assert_eq!(loader.tile(id).layer_count(), 2);

        loader.download_stacked_tile(id, DownloadUsage::Browse);
        assert_eq!(loader.pending_count(), 1);
        // nothing is restacked until every layer has reported
        assert!(!loader.update_tile(completion(id, "overlay", Some([0, 255, 0, 128]))));
        assert!(loader.update_tile(completion(id, "base", None)));

        let tile = loader.tile(id);
        assert_eq!(tile.layer("base").unwrap().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(tile.layer("overlay").unwrap().get_pixel(0, 0), &Rgba([0, 255, 0, 128]));
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn test_progressive_stacking() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let id = TileId::new(0, 1, 1, 0);
        loader.tile(id);

        assert!(loader.update_tile(completion(id, "base", Some([255, 0, 0, 255]))));
        assert_eq!(loader.pending_count(), 1);
        let partial = loader.tile(id);
        assert!(!partial.is_placeholder());
        assert_eq!(partial.image().get_pixel(1, 1), &Rgba([255, 0, 0, 255]));

        assert!(loader.update_tile(completion(id, "overlay", Some([0, 0, 255, 255]))));
        assert_eq!(loader.pending_count(), 0);
        assert_eq!(loader.tile(id).image().get_pixel(1, 1), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_stale_and_unknown_completions_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let id = TileId::new(0, 1, 0, 0);

        assert!(!loader.update_tile(completion(id, "base", Some([1, 2, 3, 255]))));
        loader.tile(id);
        assert!(!loader.update_tile(completion(id, "clouds", Some([1, 2, 3, 255]))));
        assert_eq!(loader.tile_count(), 0);
    }

    #[test]
    fn test_failed_tile_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let id = TileId::new(0, 2, 0, 0);
        loader.tile(id);

        assert!(!loader.update_tile(completion(id, "base", None)));
        assert!(!loader.update_tile(completion(id, "overlay", None)));
        assert_eq!(loader.pending_count(), 0);

        loader.tile(id);
        assert_eq!(loader.pending_count(), 1);
    }

    #[test]
    fn test_placeholder_from_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let parent = TileId::new(0, 1, 0, 0);
        loader.tile(parent);

        let mut image = RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]));
        // top-left quadrant is red
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            image.put_pixel(x, y, Rgba([255, 0, 0, 255]));
        }
        loader.update_tile(TileCompletion {
            id: parent,
            source: "base".to_string(),
            image: Some(image),
        });

        let child = loader.tile(TileId::new(0, 2, 0, 0));
        assert!(child.is_placeholder());
        assert_eq!(child.image().dimensions(), (4, 4));
        assert_eq!(child.image().get_pixel(3, 3), &Rgba([255, 0, 0, 255]));

        let other = loader.tile(TileId::new(0, 2, 1, 1));
        assert_eq!(other.image().get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_clear_drops_cache_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        let id = TileId::new(0, 1, 0, 0);
        loader.tile(id);
        loader.update_tile(completion(id, "base", Some([9, 9, 9, 255])));
        loader.update_tile(completion(id, "overlay", Some([0, 0, 0, 0])));
        assert_eq!(loader.tile_count(), 1);

        loader.clear();
        assert_eq!(loader.tile_count(), 0);
        assert!(loader.tile(id).is_placeholder());
        assert_eq!(loader.pending_count(), 1);
    }

    #[test]
    fn test_cache_limit_in_kilobytes() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        assert_eq!(loader.volatile_cache_limit(), 1024);
        loader.set_volatile_cache_limit(0);
        assert_eq!(loader.volatile_cache_limit(), 0);
    }
}

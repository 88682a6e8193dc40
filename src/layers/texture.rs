//! Texture layer: owns the tile pipeline and drives it from viewport changes,
//! render calls and tile completions.

use super::debounce::RepaintScheduler;
use crate::core::config::TextureLayerConfig;
use crate::core::viewport::Viewport;
use crate::data::mask::MaskDocument;
use crate::decorator::colorizer::TextureColorizer;
use crate::decorator::sun::SunPosition;
use crate::decorator::MergedLayerDecorator;
use crate::mapper::{MapContext, TextureMapper};
use crate::tiles::cache::CacheStats;
use crate::tiles::download::{DownloadService, DownloadUsage};
use crate::tiles::id::TileId;
use crate::tiles::loader::TileLoader;
use crate::tiles::registry::{LayerSettings, MapTheme, TextureRegistry};
use crate::tiles::source::{TextureSource, TileProjection};
use crate::tiles::stacked::StackedTileLoader;
use crate::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;
use instant::Instant;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::Path;
use std::sync::Arc;

/// Notifications for the host view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureLayerEvent {
    /// The tile level used for rendering changed
    TileLevelChanged(i32),
    /// The layer has new content and the view should render again
    RepaintNeeded,
}

/// Renders the textured surface of the map.
///
/// The layer is driven from one owner thread: [`TextureLayer::set_viewport`] picks
/// the tile level, [`TextureLayer::render`] fills a canvas and
/// [`TextureLayer::tick`] folds finished tile fetches into the cache and fires
/// debounced repaint notifications.
pub struct TextureLayer {
    config: TextureLayerConfig,
    registry: TextureRegistry,
    loader: StackedTileLoader,
    render_pool: ThreadPool,
    scheduler: RepaintScheduler,
    subscribers: Vec<Sender<TextureLayerEvent>>,
    viewport: Option<Viewport>,
    tile_zoom_level: i32,
    show_relief: bool,
    runtime_trace: String,
}

impl TextureLayer {
    pub fn new(downloads: Arc<dyn DownloadService>, config: TextureLayerConfig) -> Result<Self> {
        let tiles = TileLoader::new(downloads, config.cache_dir.clone(), config.decode_threads)?;
        let decorator = MergedLayerDecorator::new(tiles);
        let loader = StackedTileLoader::new(decorator, config.volatile_cache_limit_kb);
        let render_pool = ThreadPoolBuilder::new()
            .num_threads(TextureLayerConfig::threads_or_available(config.render_threads))
            .thread_name(|i| format!("texlayer-render-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("render pool: {}", e)))?;
        let scheduler = RepaintScheduler::new(config.repaint_interval());

        Ok(Self {
            config,
            registry: TextureRegistry::default(),
            loader,
            render_pool,
            scheduler,
            subscribers: Vec::new(),
            viewport: None,
            tile_zoom_level: -1,
            show_relief: false,
            runtime_trace: String::new(),
        })
    }

    pub fn config(&self) -> &TextureLayerConfig {
        &self.config
    }

    /// Receive level changes and repaint requests. Every subscriber sees every event.
    pub fn subscribe(&mut self) -> Receiver<TextureLayerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn render_position(&self) -> Vec<&'static str> {
        vec!["SURFACE"]
    }

    /// Swap in the sources of a theme with their enable overrides and palettes.
    ///
    /// A colorizer is built when at least one of the palette files is readable.
    pub fn set_map_theme(
        &mut self,
        theme_name: &str,
        sources: Vec<TextureSource>,
        settings: LayerSettings,
        sea_file: Option<&Path>,
        land_file: Option<&Path>,
    ) {
        let colorizer = match (sea_file, land_file) {
            (None, None) => None,
            (sea, land) => {
                let empty = Path::new("");
                match TextureColorizer::from_files(sea.unwrap_or(empty), land.unwrap_or(empty)) {
                    Ok(mut colorizer) => {
                        log::info!("colorizer enabled for {}", theme_name);
                        colorizer.set_show_relief(self.show_relief);
                        Some(colorizer)
                    }
                    Err(e) => {
                        log::info!("colorizer disabled: {}", e);
                        None
                    }
                }
            }
        };

        self.registry = TextureRegistry::new(theme_name, sources, settings);
        let decorator = self.loader.decorator_mut();
        decorator.set_theme(self.registry.theme());
        decorator.set_colorizer(colorizer);
        log::info!(
            "map theme {} with {} texture sources",
            theme_name,
            self.registry.sources().len()
        );
        self.update_texture_layers();
    }

    /// Apply a theme document: sources, palettes, masks and the city lights layer
    pub fn apply_theme(&mut self, theme: &MapTheme) {
        self.loader.decorator_mut().set_city_lights(theme.city_lights.clone());
        self.set_map_theme(
            &theme.name,
            theme.sources.clone(),
            theme.settings.clone(),
            theme.sea_palette.as_deref(),
            theme.land_palette.as_deref(),
        );
        for path in &theme.sea_masks {
            match MaskDocument::from_geojson_file(path) {
                Ok(document) => self.add_sea_document(&document),
                Err(e) => log::warn!("sea mask {}: {}", path.display(), e),
            }
        }
        for path in &theme.land_masks {
            match MaskDocument::from_geojson_file(path) {
                Ok(document) => self.add_land_document(&document),
                Err(e) => log::warn!("land mask {}: {}", path.display(), e),
            }
        }
    }

    /// Enable or disable a layer of the current theme by name
    pub fn set_layer_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let changed = self.registry.set_layer_enabled(name, enabled);
        if changed {
            self.update_texture_layers();
        }
        changed
    }

    fn update_texture_layers(&mut self) {
        let enabled = self.registry.enabled_sources();
        for source in self.registry.sources() {
            if self.registry.is_enabled(source) {
                log::debug!("enabling texture {}", source.name);
            } else {
                log::debug!("disabling texture {}", source.name);
            }
        }
        self.loader.decorator_mut().set_texture_layers(enabled);
        self.loader.clear();
        self.emit(TextureLayerEvent::RepaintNeeded);
    }

    /// Track the view. Returns false when there is nothing to render.
    pub fn set_viewport(&mut self, viewport: &Viewport) -> bool {
        self.viewport = Some(viewport.clone());
        let decorator = self.loader.decorator();
        if decorator.texture_layers_size() == 0 {
            return false;
        }

        let level = decorator.geometry().zoom_level(viewport.radius as f64);
        if level != self.tile_zoom_level {
            log::debug!("tile level {} -> {}", self.tile_zoom_level, level);
            self.tile_zoom_level = level;
            self.emit(TextureLayerEvent::TileLevelChanged(level));
        }

        self.runtime_trace = format!("Cache: {} ", self.loader.tile_count());
        true
    }

    /// Map the textured surface of the last viewport onto `canvas`.
    ///
    /// Returns false when nothing was rendered.
    pub fn render(&mut self, canvas: &mut RgbaImage) -> bool {
        self.scheduler.cancel();

        if self.loader.decorator().texture_layers_size() == 0 {
            return false;
        }
        let Some(viewport) = self.viewport.as_ref() else {
            return false;
        };

        let decorator = self.loader.decorator();
        let mapper = TextureMapper::for_view(viewport.projection, decorator.tile_projection(), &self.config);
        self.loader.reset_visible_tiles();
        let context = MapContext {
            viewport,
            loader: &self.loader,
            level: self.tile_zoom_level.max(0),
            quality: self.config.map_quality,
            pool: &self.render_pool,
        };
        mapper.map_texture(canvas, &context);
        true
    }

    /// Fold finished tile fetches into the cache.
    ///
    /// Returns the number of stacked tiles that changed; any change arms the
    /// debounced repaint.
    pub fn process_completions(&mut self, now: Instant) -> usize {
        let completions = self.loader.decorator().loader().try_recv_completions();
        let mut updated = 0;
        for completion in completions {
            if self.loader.update_tile(completion) {
                updated += 1;
            }
        }
        if updated > 0 {
            self.scheduler.request(now);
        }
        updated
    }

    /// Drive the layer from the host's event loop. Returns whether a repaint fired.
    ///
    /// There is no timer thread: tile completions are only folded in, and a
    /// debounced [`TextureLayerEvent::RepaintNeeded`] only fires, while the host
    /// keeps calling this. Call it at least every
    /// [`RepaintScheduler::interval`] for as long as [`Self::repaint_pending`] or
    /// tiles are still loading.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    /// [`Self::tick`] with an explicit clock
    pub fn tick_at(&mut self, now: Instant) -> bool {
        self.process_completions(now);
        if self.scheduler.poll(now) {
            self.emit(TextureLayerEvent::RepaintNeeded);
            true
        } else {
            false
        }
    }

    /// Whether a debounced repaint is armed
    pub fn repaint_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Drop every cached tile and repaint right away
    pub fn reset(&mut self) {
        log::debug!("texture layer reset");
        self.loader.clear();
        self.emit(TextureLayerEvent::RepaintNeeded);
    }

    /// Re-download the tiles of the last render pass
    pub fn reload(&mut self) {
        for id in self.loader.visible_tiles() {
            self.loader.download_stacked_tile(id, DownloadUsage::Browse);
        }
    }

    pub fn download_stacked_tile(&mut self, id: TileId) {
        self.loader.download_stacked_tile(id, DownloadUsage::Bulk);
    }

    pub fn set_show_relief(&mut self, show: bool) {
        self.show_relief = show;
        self.loader.decorator_mut().set_show_relief(show);
        self.reset();
    }

    pub fn show_relief(&self) -> bool {
        self.show_relief
    }

    pub fn set_show_sun_shading(&mut self, show: bool) {
        self.loader.decorator_mut().set_show_sun_shading(show);
        self.reset();
    }

    pub fn show_sun_shading(&self) -> bool {
        self.loader.decorator().show_sun_shading()
    }

    pub fn set_show_city_lights(&mut self, show: bool) {
        self.loader.decorator_mut().set_show_city_lights(show);
        self.reset();
    }

    pub fn show_city_lights(&self) -> bool {
        self.loader.decorator().show_city_lights()
    }

    pub fn set_show_tile_borders(&mut self, show: bool) {
        self.loader.decorator_mut().set_show_tile_borders(show);
        self.reset();
    }

    pub fn show_tile_borders(&self) -> bool {
        self.loader.decorator().show_tile_borders()
    }

    /// New sun snapshot; shaded tiles are rebuilt when sun shading is on
    pub fn set_sun_position(&mut self, sun: SunPosition) {
        let decorator = self.loader.decorator_mut();
        if decorator.sun_position() == sun {
            return;
        }
        decorator.set_sun_position(sun);
        if decorator.show_sun_shading() {
            self.reset();
        }
    }

    pub fn sun_position(&self) -> SunPosition {
        self.loader.decorator().sun_position()
    }

    pub fn add_sea_document(&mut self, document: &MaskDocument) {
        if let Some(colorizer) = self.loader.decorator_mut().colorizer_mut() {
            colorizer.add_sea_document(document);
            self.reset();
        }
    }

    pub fn add_land_document(&mut self, document: &MaskDocument) {
        if let Some(colorizer) = self.loader.decorator_mut().colorizer_mut() {
            colorizer.add_land_document(document);
            self.reset();
        }
    }

    pub fn has_colorizer(&self) -> bool {
        self.loader.decorator().colorizer().is_some()
    }

    pub fn tile_zoom_level(&self) -> i32 {
        self.tile_zoom_level
    }

    pub fn tile_size(&self) -> (u32, u32) {
        self.loader.decorator().tile_size()
    }

    pub fn tile_projection(&self) -> TileProjection {
        self.loader.decorator().tile_projection()
    }

    pub fn tile_column_count(&self, level: i32) -> u32 {
        self.loader.decorator().tile_column_count(level)
    }

    pub fn tile_row_count(&self, level: i32) -> u32 {
        self.loader.decorator().tile_row_count(level)
    }

    pub fn maximum_tile_level(&self) -> i32 {
        self.loader.decorator().maximum_tile_level()
    }

    pub fn preferred_radius_ceil(&self, radius: i32) -> i32 {
        self.loader.decorator().geometry().preferred_radius_ceil(radius)
    }

    pub fn preferred_radius_floor(&self, radius: i32) -> i32 {
        self.loader.decorator().geometry().preferred_radius_floor(radius)
    }

    /// Stacked tile cache budget, in kilobytes
    pub fn volatile_cache_limit(&self) -> u64 {
        self.loader.volatile_cache_limit()
    }

    pub fn set_volatile_cache_limit(&mut self, kilobytes: u64) {
        self.config.volatile_cache_limit_kb = kilobytes;
        self.loader.set_volatile_cache_limit(kilobytes);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.loader.cache_stats()
    }

    pub fn tile_loader(&self) -> &StackedTileLoader {
        &self.loader
    }

    pub fn runtime_trace(&self) -> &str {
        &self.runtime_trace
    }

    fn emit(&mut self, event: TextureLayerEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

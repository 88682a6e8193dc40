mod common;

use common::{mock_source, png, settle_layer, MockDownloads};
use image::RgbaImage;
use instant::Instant;
use std::time::Duration;
use texlayer::prelude::*;
use texlayer::tiles::addressing;

/// Texture layer behavior seen from a host view
#[cfg(test)]
mod texture_layer_tests {
    use super::*;

    fn config(dir: &std::path::Path, quality: MapQuality) -> TextureLayerConfig {
        TextureLayerConfig {
            map_quality: quality,
            ..TextureLayerConfig::for_testing(dir)
        }
    }

    fn flat_viewport() -> Viewport {
        // the whole world spans 16 pixels
        Viewport::new(Projection::Equirectangular, 16, 8, 4, GeoCoord::new(0.0, 0.0))
    }

    fn repaints(events: &crossbeam_channel::Receiver<TextureLayerEvent>) -> usize {
        events
            .try_iter()
            .filter(|e| *e == TextureLayerEvent::RepaintNeeded)
            .count()
    }

    /// A burst of tile completions produces exactly one repaint
    #[test]
    fn test_completion_burst_coalesces() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(MockDownloads::new().serve("mock://base/", png(4, [0, 128, 0, 255])));
        let mut layer = TextureLayer::new(downloads, config(dir.path(), MapQuality::Normal)).unwrap();
        layer.set_map_theme("earth", vec![mock_source("base", 4, 0)], LayerSettings::new(), None, None);
        let events = layer.subscribe();

        assert!(layer.set_viewport(&flat_viewport()));
        let mut canvas = RgbaImage::new(16, 8);
        assert!(layer.render(&mut canvas));

        let now = Instant::now();
        assert_eq!(settle_layer(&mut layer, now), 2);
        assert!(!layer.tick_at(now + Duration::from_millis(999)));
        assert!(layer.tick_at(now + Duration::from_millis(1000)));
        assert!(!layer.tick_at(now + Duration::from_millis(5000)));

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![TextureLayerEvent::TileLevelChanged(0), TextureLayerEvent::RepaintNeeded]
        );
    }

    /// Completions further apart than the debounce interval repaint once each
    #[test]
    fn test_spaced_completions_repaint_each() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(MockDownloads::new().serve("mock://base/", png(4, [0, 128, 0, 255])));
        let mut layer = TextureLayer::new(downloads, config(dir.path(), MapQuality::Normal)).unwrap();
        layer.set_map_theme("earth", vec![mock_source("base", 4, 0)], LayerSettings::new(), None, None);
        let theme = TileId::theme_id("earth");
        let events = layer.subscribe();

        let start = Instant::now();
        let mut fired = 0;
        for (i, x) in [0u32, 1, 0].into_iter().enumerate() {
            let now = start + Duration::from_secs(2 * i as u64);
            layer.download_stacked_tile(TileId::new(theme, 0, x, 0));
            assert_eq!(settle_layer(&mut layer, now), 1);
            if layer.tick_at(now + Duration::from_millis(1000)) {
                fired += 1;
            }
        }
        assert_eq!(fired, 3);
        assert_eq!(repaints(&events), 3);
    }

    /// Bulk downloads ask the network directly, reload uses browse priority
    #[test]
    fn test_reload_and_download_priorities() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(MockDownloads::new().serve("mock://base/", png(4, [0, 128, 0, 255])));
        let mut layer = TextureLayer::new(downloads.clone(), config(dir.path(), MapQuality::Normal)).unwrap();
        layer.set_map_theme("earth", vec![mock_source("base", 4, 0)], LayerSettings::new(), None, None);
        layer.set_viewport(&flat_viewport());
        let mut canvas = RgbaImage::new(16, 8);
        layer.render(&mut canvas);
        settle_layer(&mut layer, Instant::now());
        assert_eq!(downloads.request_count(), 2);

        layer.reload();
        settle_layer(&mut layer, Instant::now());
        layer.download_stacked_tile(TileId::new(TileId::theme_id("earth"), 0, 1, 0));
        settle_layer(&mut layer, Instant::now());

        let usages: Vec<_> = downloads.requests().into_iter().map(|(_, usage)| usage).collect();
        assert_eq!(
            usages,
            vec![
                DownloadUsage::Browse,
                DownloadUsage::Browse,
                DownloadUsage::Browse,
                DownloadUsage::Browse,
                DownloadUsage::Bulk,
            ]
        );
    }

    /// 4 level-zero columns of 256 pixel tiles at radius 400
    #[test]
    fn test_zoom_level_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer = TextureLayer::new(Arc::new(MockDownloads::new()), config(dir.path(), MapQuality::Normal)).unwrap();
        let source = TextureSource {
            level_zero_columns: 4,
            level_zero_rows: 2,
            max_level: 12,
            ..TextureSource::new("base")
        };
        layer.set_map_theme("earth", vec![source], LayerSettings::new(), None, None);

        let expected = ((4.0 * 400.0 / (256.0 * 4.0) as f64).max(1.0).log2() * 1.00001).floor() as i32;
        let viewport = Viewport::new(Projection::Spherical, 800, 800, 400, GeoCoord::new(0.0, 0.0));
        assert!(layer.set_viewport(&viewport));
        assert_eq!(layer.tile_zoom_level(), expected);
        assert_eq!(layer.tile_zoom_level(), 0);
        assert_eq!(addressing::zoom_level(400.0, 256, 4, 12), 0);
    }

    #[test]
    fn test_zoom_level_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer = TextureLayer::new(Arc::new(MockDownloads::new()), config(dir.path(), MapQuality::Normal)).unwrap();
        let source = TextureSource {
            max_level: 15,
            ..TextureSource::new("base")
        };
        layer.set_map_theme("earth", vec![source], LayerSettings::new(), None, None);

        let mut previous = -1;
        let mut viewport = Viewport::new(Projection::Spherical, 100, 100, 1, GeoCoord::new(0.0, 0.0));
        for radius in (1..200_000).step_by(97) {
            viewport.set_radius(radius);
            layer.set_viewport(&viewport);
            let level = layer.tile_zoom_level();
            assert!(level >= previous, "radius {} went from {} to {}", radius, previous, level);
            assert!(level <= 15);
            previous = level;
        }
        assert_eq!(previous, addressing::zoom_level(199_918.0, 256, 2, 15));
    }

    /// A layer disabled through the settings drops out of the composite
    #[test]
    fn test_disabled_source_becomes_transparent() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(MockDownloads::new().serve("mock://clouds/", png(4, [255, 0, 0, 255])));
        let mut layer = TextureLayer::new(downloads, config(dir.path(), MapQuality::High)).unwrap();
        // "base" has no tiles anywhere; only "clouds" covers the map
        let sources = vec![mock_source("base", 4, 0), mock_source("clouds", 4, 0)];
        layer.set_map_theme("earth", sources.clone(), LayerSettings::new(), None, None);
        layer.set_viewport(&flat_viewport());

        let mut canvas = RgbaImage::new(16, 8);
        layer.render(&mut canvas);
        settle_layer(&mut layer, Instant::now());
        let mut canvas = RgbaImage::new(16, 8);
        layer.render(&mut canvas);
        assert_eq!(canvas.get_pixel(4, 4).0, [255, 0, 0, 255]);

        let settings = LayerSettings::new().with("clouds", false);
        layer.set_map_theme("earth", sources, settings, None, None);
        layer.set_viewport(&flat_viewport());
        let mut canvas = RgbaImage::new(16, 8);
        layer.render(&mut canvas);
        settle_layer(&mut layer, Instant::now());
        let mut canvas = RgbaImage::new(16, 8);
        layer.render(&mut canvas);
        assert_eq!(canvas.get_pixel(4, 4).0[3], 0);
        assert_eq!(canvas.get_pixel(12, 4).0[3], 0);
    }

    #[test]
    fn test_decoration_toggles_reset_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(MockDownloads::new().serve("mock://base/", png(4, [200, 200, 200, 255])));
        let mut layer = TextureLayer::new(downloads, config(dir.path(), MapQuality::Normal)).unwrap();
        layer.set_map_theme("earth", vec![mock_source("base", 4, 0)], LayerSettings::new(), None, None);
        layer.set_viewport(&flat_viewport());
        let mut canvas = RgbaImage::new(16, 8);
        layer.render(&mut canvas);
        settle_layer(&mut layer, Instant::now());
        assert_eq!(layer.tile_loader().tile_count(), 2);

        let events = layer.subscribe();
        layer.set_show_sun_shading(true);
        assert_eq!(layer.tile_loader().tile_count(), 0);
        layer.set_show_tile_borders(true);
        assert_eq!(repaints(&events), 2);

        // a moved sun only matters while shading is on
        layer.set_sun_position(SunPosition::from_degrees(90.0, 10.0));
        assert_eq!(repaints(&events), 1);
        layer.set_show_sun_shading(false);
        assert_eq!(repaints(&events), 1);
        layer.set_sun_position(SunPosition::from_degrees(-90.0, 0.0));
        assert_eq!(repaints(&events), 0);
    }
}

mod common;

use common::{mock_source, png, settle_loader, MockDownloads};
use image::{Rgba, RgbaImage};
use rayon::ThreadPoolBuilder;
use texlayer::mapper::{
    EquirectScanlineTextureMapper, MapContext, MercatorScanlineTextureMapper, TileScalingTextureMapper,
};
use texlayer::prelude::*;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const BACKGROUND: Rgba<u8> = Rgba([7, 7, 7, 7]);

/// Scanline mappers over a two-tile world: west half red, east half blue
#[cfg(test)]
mod mapper_tests {
    use super::*;

    fn world(dir: &std::path::Path, projection: TileProjection) -> StackedTileLoader {
        let downloads = Arc::new(
            MockDownloads::new()
                .serve("mock://base/0/0/", png(4, RED))
                .serve("mock://base/0/1/", png(4, BLUE)),
        );
        let tiles = TileLoader::new(downloads, dir, Some(1)).unwrap();
        let mut decorator = MergedLayerDecorator::new(tiles);
        decorator.set_texture_layers(vec![Arc::new(TextureSource {
            projection,
            ..mock_source("base", 4, 0)
        })]);
        let loader = StackedTileLoader::new(decorator, 1024);
        loader.tile(TileId::new(0, 0, 0, 0));
        loader.tile(TileId::new(0, 0, 1, 0));
        settle_loader(&loader);
        loader
    }

    fn map(mapper: &TextureMapper, loader: &StackedTileLoader, viewport: &Viewport, quality: MapQuality) -> RgbaImage {
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let mut canvas = RgbaImage::from_pixel(viewport.width, viewport.height, BACKGROUND);
        let context = MapContext {
            viewport,
            loader,
            level: 0,
            quality,
            pool: &pool,
        };
        mapper.map_texture(&mut canvas, &context);
        canvas
    }

    /// Points on the disk boundary stay untouched, points just inside are sampled
    #[test]
    fn test_spherical_disk_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let loader = world(dir.path(), TileProjection::Equirectangular);
        let config = TextureLayerConfig::for_testing(dir.path());
        let viewport = Viewport::new(Projection::Spherical, 16, 16, 3, GeoCoord::new(0.0, 0.0));
        let mapper = TextureMapper::for_view(Projection::Spherical, TileProjection::Equirectangular, &config);
        assert_eq!(mapper.name(), "spherical");

        let canvas = map(&mapper, &loader, &viewport, MapQuality::Normal);
        // dx² + dy² == r²
        assert_eq!(canvas.get_pixel(8 + 3, 8), &BACKGROUND);
        assert_eq!(canvas.get_pixel(8, 8 - 3), &BACKGROUND);
        // dx² + dy² == r² - 1
        assert_eq!(canvas.get_pixel(8 + 2, 8 + 2).0, BLUE);
        assert_eq!(canvas.get_pixel(8 - 2, 8 - 2).0, RED);
        assert_eq!(canvas.get_pixel(0, 0), &BACKGROUND);
    }

    #[test]
    fn test_spherical_interpolation_matches_exact_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let loader = world(dir.path(), TileProjection::Equirectangular);
        let viewport = Viewport::new(Projection::Spherical, 64, 64, 30, GeoCoord::from_degrees(45.0, 0.0));
        let exact = map(
            &TextureMapper::Spherical(texlayer::mapper::SphericalScanlineTextureMapper::new(1)),
            &loader,
            &viewport,
            MapQuality::Normal,
        );
        let coarse = map(
            &TextureMapper::Spherical(texlayer::mapper::SphericalScanlineTextureMapper::new(8)),
            &loader,
            &viewport,
            MapQuality::Normal,
        );
        let painted = |canvas: &RgbaImage| canvas.pixels().filter(|p| **p != BACKGROUND).count();
        assert_eq!(painted(&exact), painted(&coarse));
        let differing = exact
            .pixels()
            .zip(coarse.pixels())
            .filter(|(a, b)| a != b)
            .count();
        // only pixels next to the tile seam may shift
        assert!(differing < 3 * 64, "{} pixels differ", differing);
    }

    #[test]
    fn test_flat_mapper_selection() {
        let config = TextureLayerConfig::default();
        assert_eq!(
            TextureMapper::for_view(Projection::Equirectangular, TileProjection::Equirectangular, &config),
            TextureMapper::TileScaling(TileScalingTextureMapper)
        );
        assert_eq!(
            TextureMapper::for_view(Projection::Equirectangular, TileProjection::Mercator, &config),
            TextureMapper::Equirect(EquirectScanlineTextureMapper)
        );
        assert_eq!(
            TextureMapper::for_view(Projection::Mercator, TileProjection::Mercator, &config),
            TextureMapper::TileScaling(TileScalingTextureMapper)
        );
        let config = TextureLayerConfig {
            prefer_tile_scaling: false,
            ..config
        };
        assert_eq!(
            TextureMapper::for_view(Projection::Mercator, TileProjection::Mercator, &config),
            TextureMapper::Mercator(MercatorScanlineTextureMapper)
        );
    }

    #[test]
    fn test_equirect_mappers_agree() {
        let dir = tempfile::tempdir().unwrap();
        let loader = world(dir.path(), TileProjection::Equirectangular);
        // 360° of longitude over 16 pixels
        let viewport = Viewport::new(Projection::Equirectangular, 16, 8, 4, GeoCoord::new(0.0, 0.0));

        for mapper in [
            TextureMapper::Equirect(EquirectScanlineTextureMapper),
            TextureMapper::TileScaling(TileScalingTextureMapper),
        ] {
            let canvas = map(&mapper, &loader, &viewport, MapQuality::Normal);
            assert_eq!(canvas.get_pixel(2, 4).0, RED, "{}", mapper.name());
            assert_eq!(canvas.get_pixel(12, 4).0, BLUE, "{}", mapper.name());
        }
    }

    #[test]
    fn test_mercator_leaves_rows_beyond_the_map() {
        let dir = tempfile::tempdir().unwrap();
        let loader = world(dir.path(), TileProjection::Mercator);
        // the Mercator square is 16 pixels tall; the canvas is taller
        let viewport = Viewport::new(Projection::Mercator, 16, 32, 4, GeoCoord::new(0.0, 0.0));
        let canvas = map(
            &TextureMapper::Mercator(MercatorScanlineTextureMapper),
            &loader,
            &viewport,
            MapQuality::Normal,
        );
        assert_eq!(canvas.get_pixel(4, 0), &BACKGROUND);
        assert_eq!(canvas.get_pixel(4, 31), &BACKGROUND);
        assert_eq!(canvas.get_pixel(2, 16).0, RED);
        assert_eq!(canvas.get_pixel(12, 16).0, BLUE);
    }

    /// Low quality forces opaque texels, high quality keeps their alpha
    #[test]
    fn test_quality_controls_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(MockDownloads::new().serve("mock://base/", png(4, [0, 0, 0, 0])));
        let tiles = TileLoader::new(downloads, dir.path(), Some(1)).unwrap();
        let mut decorator = MergedLayerDecorator::new(tiles);
        decorator.set_texture_layers(vec![Arc::new(mock_source("base", 4, 0))]);
        let loader = StackedTileLoader::new(decorator, 1024);
        let viewport = Viewport::new(Projection::Equirectangular, 16, 8, 4, GeoCoord::new(0.0, 0.0));
        let mapper = TextureMapper::Equirect(EquirectScanlineTextureMapper);

        let low = map(&mapper, &loader, &viewport, MapQuality::Low);
        assert_eq!(low.get_pixel(4, 4).0[3], 255);
        let high = map(&mapper, &loader, &viewport, MapQuality::High);
        assert_eq!(high.get_pixel(4, 4).0[3], 0);
    }
}

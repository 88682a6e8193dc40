//! Headless renderer: loads a map theme, renders one view and writes it as PNG.
//!
//! ```bash
//! texlayer-render theme.json earth.png --projection spherical --radius 300 --lon 10 --lat 45
//! ```

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use texlayer::prelude::*;

#[derive(Parser)]
#[command(name = "texlayer-render")]
#[command(version)]
#[command(about = "Render a texlayer map theme to a PNG file")]
struct Cli {
    /// Map theme document (JSON)
    theme: PathBuf,

    /// Output PNG file
    output: PathBuf,

    #[arg(long, value_enum, default_value = "spherical")]
    projection: ViewProjection,

    /// Globe radius in pixels
    #[arg(long, default_value_t = 256)]
    radius: i32,

    /// Longitude of the view center, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    lon: f64,

    /// Latitude of the view center, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    lat: f64,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 640)]
    height: u32,

    /// How long to wait for tiles before writing the image
    #[arg(long, default_value_t = 10_000)]
    wait_ms: u64,

    /// Texture layer configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shade the night side using the current sun position
    #[arg(long)]
    sun_shading: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ViewProjection {
    Spherical,
    Equirect,
    Mercator,
}

impl From<ViewProjection> for Projection {
    fn from(projection: ViewProjection) -> Self {
        match projection {
            ViewProjection::Spherical => Projection::Spherical,
            ViewProjection::Equirect => Projection::Equirectangular,
            ViewProjection::Mercator => Projection::Mercator,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    texlayer::init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TextureLayerConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => TextureLayerConfig::default(),
    };
    let theme = MapTheme::from_json_file(&cli.theme)
        .with_context(|| format!("reading theme {}", cli.theme.display()))?;

    let downloads = HttpDownloadService::with_current_runtime(HttpDownloadConfig::default())?;
    let mut layer = TextureLayer::new(Arc::new(downloads), config)?;
    layer.apply_theme(&theme);
    if cli.sun_shading {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        layer.set_sun_position(SunPosition::from_unix_time(now));
        layer.set_show_sun_shading(true);
    }

    let viewport = Viewport::new(
        cli.projection.into(),
        cli.width,
        cli.height,
        cli.radius,
        GeoCoord::from_degrees(cli.lon, cli.lat),
    );
    if !layer.set_viewport(&viewport) {
        bail!("theme {} has no texture sources", theme.name);
    }
    log::info!("rendering at tile level {}", layer.tile_zoom_level());

    let mut canvas = RgbaImage::new(cli.width, cli.height);
    layer.render(&mut canvas);

    let deadline = Instant::now() + Duration::from_millis(cli.wait_ms);
    while Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if layer.tick() {
            layer.render(&mut canvas);
        }
        if layer.tile_loader().pending_count() == 0 && !layer.repaint_pending() {
            break;
        }
    }
    layer.tick();
    layer.render(&mut canvas);
    layer.set_viewport(&viewport);
    log::info!("{}", layer.runtime_trace());

    canvas
        .save(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    println!("wrote {}", cli.output.display());
    Ok(())
}

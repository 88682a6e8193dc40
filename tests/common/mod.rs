//! Shared fixtures for the integration tests
#![allow(dead_code)]

use image::{ImageOutputFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;
use texlayer::prelude::*;
use texlayer::tiles::download::DownloadCallback;

/// Serves a canned payload for every locator starting with a registered prefix
/// and records each request. Unknown locators fail.
#[derive(Default)]
pub struct MockDownloads {
    payloads: Vec<(String, Vec<u8>)>,
    requests: Mutex<Vec<(String, DownloadUsage)>>,
}

impl MockDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, prefix: &str, payload: Vec<u8>) -> Self {
        self.payloads.push((prefix.to_string(), payload));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<(String, DownloadUsage)> {
        self.requests.lock().unwrap().clone()
    }
}

impl DownloadService for MockDownloads {
    fn request(&self, url: &str, usage: DownloadUsage, on_complete: DownloadCallback) {
        self.requests.lock().unwrap().push((url.to_string(), usage));
        match self.payloads.iter().find(|(prefix, _)| url.starts_with(prefix.as_str())) {
            Some((_, payload)) => on_complete(Ok(payload.clone())),
            None => on_complete(Err(TexLayerError::Download(format!("not found: {}", url)))),
        }
    }
}

/// PNG-encoded tile of one color
pub fn png(size: u32, color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(size, size, Rgba(color));
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Level-zero world of 2x1 tiles, fetched from `mock://<name>/{z}/{x}/{y}`
pub fn mock_source(name: &str, tile_size: u32, max_level: i32) -> TextureSource {
    TextureSource {
        tile_width: tile_size,
        tile_height: tile_size,
        max_level,
        url_template: Some(format!("mock://{}/{{z}}/{{x}}/{{y}}", name)),
        ..TextureSource::new(name)
    }
}

/// Feed completions into a stacked loader until nothing is pending
pub fn settle_loader(loader: &StackedTileLoader) -> usize {
    let completions = loader.decorator().loader().completions();
    let mut updated = 0;
    while loader.pending_count() > 0 {
        match completions.recv_timeout(Duration::from_secs(5)) {
            Ok(completion) => {
                if loader.update_tile(completion) {
                    updated += 1;
                }
            }
            Err(_) => panic!("tile completions stalled"),
        }
    }
    updated
}

/// Let a texture layer absorb completions at a fixed instant until nothing is pending
pub fn settle_layer(layer: &mut TextureLayer, now: instant::Instant) -> usize {
    let mut updated = 0;
    for _ in 0..1000 {
        updated += layer.process_completions(now);
        if layer.tile_loader().pending_count() == 0 {
            return updated;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("tile completions stalled");
}

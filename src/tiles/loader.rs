use super::download::{DownloadService, DownloadUsage};
use super::id::TileId;
use super::source::TextureSource;
use crate::core::config::TextureLayerConfig;
use crate::prelude::HashSet;
use crate::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Result of one per-layer tile fetch. `image` is `None` when the tile could not
/// be read, downloaded or decoded.
#[derive(Debug)]
pub struct TileCompletion {
    pub id: TileId,
    /// Name of the texture source the tile belongs to
    pub source: String,
    pub image: Option<RgbaImage>,
}

type FetchKey = (String, TileId, DownloadUsage);

/// Fetches raw per-layer tiles: on-disk cache first, then the download service.
///
/// Disk reads and decoding run on a dedicated rayon pool; finished tiles are sent
/// over a channel that the owner drains with [`TileLoader::try_recv_completions`].
pub struct TileLoader {
    downloads: Arc<dyn DownloadService>,
    cache_dir: PathBuf,
    decode_pool: Arc<ThreadPool>,
    tx: Sender<TileCompletion>,
    rx: Receiver<TileCompletion>,
    in_flight: Arc<Mutex<HashSet<FetchKey>>>,
}

impl TileLoader {
    pub fn new(downloads: Arc<dyn DownloadService>, cache_dir: impl Into<PathBuf>, decode_threads: Option<usize>) -> Result<Self> {
        let decode_pool = ThreadPoolBuilder::new()
            .num_threads(TextureLayerConfig::threads_or_available(decode_threads))
            .thread_name(|i| format!("texlayer-decode-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("decode pool: {}", e)))?;
        let (tx, rx) = unbounded();
        Ok(Self {
            downloads,
            cache_dir: cache_dir.into(),
            decode_pool: Arc::new(decode_pool),
            tx,
            rx,
            in_flight: Arc::new(Mutex::new(HashSet::default())),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// On-disk location of a tile
    pub fn tile_path(&self, source: &TextureSource, id: &TileId) -> PathBuf {
        self.cache_dir.join(source.relative_path(id))
    }

    /// Fetch a tile, preferring the on-disk cache
    pub fn request_tile(&self, source: &TextureSource, id: TileId, usage: DownloadUsage) {
        let path = self.tile_path(source, &id);
        if !path.is_file() {
            self.download_tile(source, id, usage);
            return;
        }
        let Some(job) = self.begin(source, id, usage) else {
            return;
        };
        log::debug!("loading {} {} from {}", source.name, id, path.display());
        self.decode_pool.spawn(move || {
            let image = std::fs::read(&path)
                .map_err(Error::from)
                .and_then(|bytes| decode_tile(&bytes));
            match image {
                Ok(image) => job.finish(Some(image)),
                Err(e) => {
                    log::warn!("failed to load {}: {}", path.display(), e);
                    job.finish(None);
                }
            }
        });
    }

    /// Fetch a tile from the network, bypassing the on-disk cache
    pub fn download_tile(&self, source: &TextureSource, id: TileId, usage: DownloadUsage) {
        let Some(job) = self.begin(source, id, usage) else {
            return;
        };
        let Some(url) = source.url(&id) else {
            log::debug!("{} has no locator for {}", source.name, id);
            job.finish(None);
            return;
        };
        let path = self.tile_path(source, &id);
        let pool = self.decode_pool.clone();
        let locator = url.clone();
        log::debug!("downloading {} {} ({:?})", source.name, id, usage);
        self.downloads.request(
            &locator,
            usage,
            Box::new(move |result| match result {
                Ok(bytes) => pool.spawn(move || {
                    if let Err(e) = store_tile(&path, &bytes) {
                        log::warn!("failed to store {}: {}", path.display(), e);
                    }
                    match decode_tile(&bytes) {
                        Ok(image) => job.finish(Some(image)),
                        Err(e) => {
                            log::warn!("failed to decode {}: {}", url, e);
                            job.finish(None);
                        }
                    }
                }),
                Err(e) => {
                    log::warn!("download of {} failed: {}", url, e);
                    job.finish(None);
                }
            }),
        );
    }

    /// Completions received so far, without blocking
    pub fn try_recv_completions(&self) -> Vec<TileCompletion> {
        self.rx.try_iter().collect()
    }

    /// Receiver side of the completion channel
    pub fn completions(&self) -> Receiver<TileCompletion> {
        self.rx.clone()
    }

    /// Number of fetches that have not completed yet
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().map(|set| set.len()).unwrap_or(0)
    }

    /// Registers a fetch; `None` if the same fetch is already running
    fn begin(&self, source: &TextureSource, id: TileId, usage: DownloadUsage) -> Option<FetchJob> {
        let key = (source.name.clone(), id, usage);
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if !in_flight.insert(key.clone()) {
                log::trace!("{} {} already in flight", source.name, id);
                return None;
            }
        }
        Some(FetchJob {
            key,
            tx: self.tx.clone(),
            in_flight: self.in_flight.clone(),
        })
    }
}

struct FetchJob {
    key: FetchKey,
    tx: Sender<TileCompletion>,
    in_flight: Arc<Mutex<HashSet<FetchKey>>>,
}

impl FetchJob {
    fn finish(self, image: Option<RgbaImage>) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.key);
        }
        let (source, id, _) = self.key;
        // the receiver only goes away together with the loader
        let _ = self.tx.send(TileCompletion { id, source, image });
    }
}

fn decode_tile(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

fn store_tile(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

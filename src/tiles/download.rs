//! Network side of tile fetching.
//!
//! [`DownloadService`] is the seam to whatever actually moves bytes; the tile loader
//! only needs "fetch this locator at this priority and call me back".

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Download priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadUsage {
    /// Interactive: tiles the user is looking at right now
    Browse,
    /// Background prefetch and explicit downloads
    Bulk,
}

/// Completion callback; invoked exactly once, on any thread
pub type DownloadCallback = Box<dyn FnOnce(Result<Vec<u8>>) + Send + 'static>;

pub trait DownloadService: Send + Sync {
    /// Start fetching `url`. Must not block the caller.
    fn request(&self, url: &str, usage: DownloadUsage, on_complete: DownloadCallback);
}

/// Fails every request. For disk-only operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineDownloadService;

impl DownloadService for OfflineDownloadService {
    fn request(&self, url: &str, _usage: DownloadUsage, on_complete: DownloadCallback) {
        on_complete(Err(Error::Download(format!("offline: {}", url))));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpDownloadConfig {
    pub browse_concurrency: usize,
    pub bulk_concurrency: usize,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_attempts: usize,
}

impl Default for HttpDownloadConfig {
    fn default() -> Self {
        Self {
            browse_concurrency: 20,
            bulk_concurrency: 2,
            user_agent: concat!("texlayer/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            max_attempts: 2,
        }
    }
}

#[cfg(feature = "tokio-runtime")]
pub use http::HttpDownloadService;

#[cfg(feature = "tokio-runtime")]
mod http {
    use super::*;
    use crate::runtime::{TaskSpawner, TokioSpawner};
    use once_cell::sync::Lazy;
    use reqwest::Client;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Shared HTTP client. Building the client once avoids the cost of TLS and
    /// connection pool setup for every tile.
    pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .user_agent(concat!("texlayer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new())
    });

    /// reqwest-backed download service with one concurrency limit per usage class
    pub struct HttpDownloadService {
        config: HttpDownloadConfig,
        spawner: Arc<dyn TaskSpawner>,
        browse: Arc<Semaphore>,
        bulk: Arc<Semaphore>,
    }

    impl HttpDownloadService {
        pub fn new(config: HttpDownloadConfig, spawner: Arc<dyn TaskSpawner>) -> Self {
            Self {
                browse: Arc::new(Semaphore::new(config.browse_concurrency.max(1))),
                bulk: Arc::new(Semaphore::new(config.bulk_concurrency.max(1))),
                config,
                spawner,
            }
        }

        /// Binds to the tokio runtime the caller is running in
        pub fn with_current_runtime(config: HttpDownloadConfig) -> Result<Self> {
            let spawner = TokioSpawner::current()
                .ok_or_else(|| Error::Config("no tokio runtime available".to_string()))?;
            Ok(Self::new(config, Arc::new(spawner)))
        }

        /// Requests accepted and not yet completed
        pub fn active_downloads(&self) -> usize {
            self.spawner.active_tasks()
        }

        fn semaphore(&self, usage: DownloadUsage) -> Arc<Semaphore> {
            match usage {
                DownloadUsage::Browse => self.browse.clone(),
                DownloadUsage::Bulk => self.bulk.clone(),
            }
        }
    }

    impl DownloadService for HttpDownloadService {
        fn request(&self, url: &str, usage: DownloadUsage, on_complete: DownloadCallback) {
            let semaphore = self.semaphore(usage);
            let config = self.config.clone();
            let url = url.to_string();
            self.spawner.spawn_task(Box::pin(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        on_complete(Err(Error::Download("download service closed".to_string())));
                        return;
                    }
                };
                on_complete(fetch(&url, &config).await);
            }));
        }
    }

    async fn fetch(url: &str, config: &HttpDownloadConfig) -> Result<Vec<u8>> {
        let max_attempts = config.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=max_attempts {
            log::debug!("fetch {} attempt {}", url, attempt);
            match fetch_once(url, config).await {
                Ok(data) => {
                    log::debug!("downloaded {} ({} bytes)", url, data.len());
                    return Ok(data);
                }
                Err(e) => {
                    log::warn!("download of {} failed on attempt {}: {}", url, attempt, e);
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Download(format!("giving up on {}", url))))
    }

    async fn fetch_once(url: &str, config: &HttpDownloadConfig) -> Result<Vec<u8>> {
        let resp = HTTP_CLIENT
            .get(url)
            .header(reqwest::header::USER_AGENT, config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Download(format!("HTTP {} for {}", resp.status(), url)));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_offline_service_fails_immediately() {
        let (tx, rx) = mpsc::channel();
        OfflineDownloadService.request(
            "https://tiles.example.org/0/0/0.png",
            DownloadUsage::Browse,
            Box::new(move |result| {
                let _ = tx.send(result.is_err());
            }),
        );
        assert_eq!(rx.recv().unwrap(), true);
    }

    #[test]
    fn test_default_concurrency_limits() {
        let config = HttpDownloadConfig::default();
        assert!(config.browse_concurrency > config.bulk_concurrency);
        assert!(config.user_agent.starts_with("texlayer/"));
    }

    #[cfg(feature = "tokio-runtime")]
    #[test]
    fn test_http_service_needs_runtime() {
        assert!(HttpDownloadService::with_current_runtime(HttpDownloadConfig::default()).is_err());
    }
}

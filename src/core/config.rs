//! Configuration for the texture layer
//!
//! Mirrors the performance-profile approach: pick a preset and resolve it into a
//! concrete [`TextureLayerConfig`], or deserialize a config from JSON.

use crate::core::constants::{DEFAULT_VOLATILE_CACHE_LIMIT_KB, REPAINT_SCHEDULING_INTERVAL_MS};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Rendering quality requested by the host view
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MapQuality {
    Outline,
    Low,
    Normal,
    High,
    Print,
}

impl MapQuality {
    /// Bilinear filtering and real alpha are only used at high and print quality
    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Print)
    }
}

impl Default for MapQuality {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureLayerProfile {
    Balanced,
    LowResource,
    HighQuality,
    Custom(TextureLayerConfig),
}

impl TextureLayerProfile {
    pub fn resolve(&self) -> TextureLayerConfig {
        match self {
            Self::Balanced => TextureLayerConfig::default(),
            Self::LowResource => TextureLayerConfig {
                volatile_cache_limit_kb: 20 * 1024,
                map_quality: MapQuality::Low,
                decode_threads: Some(2),
                render_threads: Some(2),
                interpolation_step: 16,
                ..TextureLayerConfig::default()
            },
            Self::HighQuality => TextureLayerConfig {
                volatile_cache_limit_kb: 400 * 1024,
                map_quality: MapQuality::High,
                interpolation_step: 1,
                ..TextureLayerConfig::default()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for TextureLayerProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureLayerConfig {
    /// Byte budget of the stacked tile cache, in kilobytes
    pub volatile_cache_limit_kb: u64,
    /// Debounce interval for tile-completion repaints
    pub repaint_interval_ms: u64,
    pub map_quality: MapQuality,
    /// Decode pool size; `None` uses the available parallelism
    pub decode_threads: Option<usize>,
    /// Scanline pool size; `None` uses the available parallelism
    pub render_threads: Option<usize>,
    /// Root of the on-disk tile cache
    pub cache_dir: PathBuf,
    /// Use the tile-scaling mapper when tile and view projections agree
    pub prefer_tile_scaling: bool,
    /// Spherical mapper supporting-point spacing below high quality
    pub interpolation_step: u32,
}

impl Default for TextureLayerConfig {
    fn default() -> Self {
        Self {
            volatile_cache_limit_kb: DEFAULT_VOLATILE_CACHE_LIMIT_KB,
            repaint_interval_ms: REPAINT_SCHEDULING_INTERVAL_MS,
            map_quality: MapQuality::Normal,
            decode_threads: None,
            render_threads: None,
            cache_dir: std::env::temp_dir().join("texlayer").join("maps"),
            prefer_tile_scaling: true,
            interpolation_step: 8,
        }
    }
}

impl TextureLayerConfig {
    /// Small pools and exact sampling, for deterministic tests
    pub fn for_testing(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            decode_threads: Some(1),
            render_threads: Some(2),
            interpolation_step: 1,
            ..Self::default()
        }
    }

    pub fn repaint_interval(&self) -> Duration {
        Duration::from_millis(self.repaint_interval_ms)
    }

    /// Number of worker threads for a pool, falling back to the host's parallelism
    pub fn threads_or_available(threads: Option<usize>) -> usize {
        threads
            .filter(|n| *n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_presets() {
        let balanced = TextureLayerProfile::Balanced.resolve();
        let low = TextureLayerProfile::LowResource.resolve();
        let high = TextureLayerProfile::HighQuality.resolve();

        assert_eq!(balanced.repaint_interval(), Duration::from_millis(1000));
        assert!(low.volatile_cache_limit_kb < balanced.volatile_cache_limit_kb);
        assert!(high.volatile_cache_limit_kb > balanced.volatile_cache_limit_kb);
        assert!(high.map_quality.is_high());
        assert!(!balanced.map_quality.is_high());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TextureLayerConfig::from_json_str(
            r#"{ "volatile_cache_limit_kb": 2048, "map_quality": "Print" }"#,
        )
        .unwrap();
        assert_eq!(config.volatile_cache_limit_kb, 2048);
        assert_eq!(config.map_quality, MapQuality::Print);
        assert_eq!(config.repaint_interval_ms, 1000);
        assert!(config.prefer_tile_scaling);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(TextureLayerConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn test_thread_fallback() {
        assert_eq!(TextureLayerConfig::threads_or_available(Some(3)), 3);
        assert!(TextureLayerConfig::threads_or_available(None) >= 1);
        assert!(TextureLayerConfig::threads_or_available(Some(0)) >= 1);
    }
}

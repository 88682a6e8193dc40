//! Ordered set of texture sources for the active map theme, plus the
//! per-layer enable overrides coming from the theme settings.

use super::id::TileId;
use super::source::TextureSource;
use crate::prelude::HashMap;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Layer key → enabled override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerSettings(HashMap<String, bool>);

impl LayerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.set(name, enabled);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextureRegistry {
    theme: u64,
    sources: Vec<Arc<TextureSource>>,
    settings: LayerSettings,
}

impl TextureRegistry {
    pub fn new(theme_name: &str, sources: Vec<TextureSource>, settings: LayerSettings) -> Self {
        Self {
            theme: TileId::theme_id(theme_name),
            sources: sources.into_iter().map(Arc::new).collect(),
            settings,
        }
    }

    pub fn theme(&self) -> u64 {
        self.theme
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[Arc<TextureSource>] {
        &self.sources
    }

    /// A settings override wins over the descriptor's own flag
    pub fn is_enabled(&self, source: &TextureSource) -> bool {
        self.settings.get(&source.name).unwrap_or(source.enabled)
    }

    /// Enabled sources in stacking order, bottom first
    pub fn enabled_sources(&self) -> Vec<Arc<TextureSource>> {
        self.sources
            .iter()
            .filter(|source| self.is_enabled(source))
            .cloned()
            .collect()
    }

    /// Returns whether the effective state of the layer changed
    pub fn set_layer_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let before = self
            .sources
            .iter()
            .find(|s| s.name == name)
            .map(|s| self.is_enabled(s));
        self.settings.set(name, enabled);
        matches!(before, Some(previous) if previous != enabled)
    }
}

/// Map theme document: the sources of a theme with their decorations.
///
/// Relative paths are resolved against the directory of the theme file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapTheme {
    pub name: String,
    pub sources: Vec<TextureSource>,
    pub settings: LayerSettings,
    pub sea_palette: Option<PathBuf>,
    pub land_palette: Option<PathBuf>,
    pub sea_masks: Vec<PathBuf>,
    pub land_masks: Vec<PathBuf>,
    pub city_lights: Option<TextureSource>,
}

impl MapTheme {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut theme = Self::from_json_str(&text)?;
        if let Some(dir) = path.parent() {
            theme.resolve_paths(dir);
        }
        Ok(theme)
    }

    fn resolve_paths(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        self.sea_palette.iter_mut().for_each(resolve);
        self.land_palette.iter_mut().for_each(resolve);
        self.sea_masks.iter_mut().for_each(resolve);
        self.land_masks.iter_mut().for_each(resolve);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<TextureSource> {
        vec![
            TextureSource::new("base"),
            TextureSource {
                enabled: false,
                ..TextureSource::new("clouds")
            },
            TextureSource::new("borders"),
        ]
    }

    #[test]
    fn test_enabled_rule() {
        let registry = TextureRegistry::new("earth", sources(), LayerSettings::new());
        let names: Vec<_> = registry.enabled_sources().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["base", "borders"]);

        let settings = LayerSettings::new().with("clouds", true).with("base", false);
        let registry = TextureRegistry::new("earth", sources(), settings);
        let names: Vec<_> = registry.enabled_sources().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["clouds", "borders"]);
    }

    #[test]
    fn test_set_layer_enabled_reports_change() {
        let mut registry = TextureRegistry::new("earth", sources(), LayerSettings::new());
        assert!(!registry.set_layer_enabled("base", true));
        assert!(registry.set_layer_enabled("base", false));
        assert!(!registry.set_layer_enabled("unknown", false));
        assert_eq!(registry.enabled_sources().len(), 1);
    }

    #[test]
    fn test_theme_json() {
        let theme = MapTheme::from_json_str(
            r#"{
                "name": "earth/test",
                "sources": [ { "name": "base", "max_level": 3, "projection": "Mercator" } ],
                "settings": { "base": false },
                "sea_palette": "seacolors.leg"
            }"#,
        )
        .unwrap();
        assert_eq!(theme.sources[0].max_level, 3);
        assert_eq!(theme.sources[0].tile_width, 256);
        assert_eq!(theme.settings.get("base"), Some(false));
        assert!(theme.land_palette.is_none());
    }
}

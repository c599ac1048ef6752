//! Scanner configuration.
//!
//! Loads settings from config.json (next to the executable unless a path is
//! given). Every field has a default, so a partial file or no file at all is
//! fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::capture::{DisplaySize, GuideBox};
use crate::ocr::{FieldProfiles, ProfileRule, TesseractSettings};
use crate::scan::ScanTiming;
use crate::template::{RecordTemplate, TemplateCatalog};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Pause after a successful live read (milliseconds)
    pub live_cooldown_ms: u64,
    /// Pause after a successful static read (milliseconds)
    pub static_cooldown_ms: u64,
    /// Live-mode tick period (milliseconds)
    pub tick_interval_ms: u64,
    pub guide_box: GuideBox,
    /// Rendered size of the source; native resolution when absent
    pub display: Option<DisplaySize>,
    pub tesseract: TesseractSettings,
    /// Extra charset rules, checked after the built-in ones
    pub profile_rules: Vec<ProfileRule>,
    /// Extra templates; a name matching a built-in replaces it
    pub templates: Vec<RecordTemplate>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            live_cooldown_ms: 1500,
            static_cooldown_ms: 500,
            tick_interval_ms: 1500,
            guide_box: GuideBox::default(),
            display: None,
            tesseract: TesseractSettings::default(),
            profile_rules: Vec::new(),
            templates: Vec::new(),
        }
    }
}

impl ScanConfig {
    pub fn timing(&self) -> ScanTiming {
        ScanTiming {
            live_cooldown: Duration::from_millis(self.live_cooldown_ms),
            static_cooldown: Duration::from_millis(self.static_cooldown_ms),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }

    pub fn profiles(&self) -> FieldProfiles {
        FieldProfiles::with_extra_rules(self.profile_rules.iter().cloned())
    }

    /// Built-in templates merged with configured ones.
    pub fn catalog(&self) -> TemplateCatalog {
        let mut catalog = TemplateCatalog::builtin();
        for template in &self.templates {
            catalog.insert(template.clone());
        }
        catalog
    }
}

/// Loads configuration from `path`, or returns defaults when it is missing or
/// unreadable. Problems are logged, never fatal.
pub fn load_config(path: &Path) -> ScanConfig {
    tracing::debug!(path = %path.display(), "looking for config");

    if !path.exists() {
        tracing::info!(path = %path.display(), "config not found, using defaults");
        return ScanConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "config loaded");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                ScanConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
            ScanConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/config.json"));
        assert_eq!(config.live_cooldown_ms, 1500);
        assert_eq!(config.timing(), ScanTiming::default());
        assert_eq!(config.tesseract.language, "jpn");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "live_cooldown_ms": 2000,
                "display": { "width": 640, "height": 360 },
                "profile_rules": [{ "patterns": ["電話"], "whitelist": "0123456789-" }],
                "templates": [{ "name": "領収書", "fields": [{ "key": "total", "label": "合計金額" }] }]
            }"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.timing().live_cooldown, Duration::from_millis(2000));
        assert_eq!(config.static_cooldown_ms, 500);
        assert_eq!(config.display, Some(DisplaySize { width: 640, height: 360 }));
        assert_eq!(config.profiles().resolve_charset("電話番号"), "0123456789-");
        assert_eq!(config.catalog().get("領収書").unwrap().fields[0].key, "total");
        assert!(config.catalog().get("支払明細").is_ok());
    }

    #[test]
    fn test_invalid_json_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&path);
        assert_eq!(config.tick_interval_ms, 1500);
    }
}

//! Persistent application settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings that persist between sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Window
    pub window_width: f32,
    pub window_height: f32,

    // Global render controls
    pub sky_enabled: bool,
    pub exposure: f32,

    // Last directory a model was added from
    pub last_model_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_width: 1600.0,
            window_height: 800.0,
            sky_enabled: true,
            exposure: 0.0,
            last_model_dir: None,
        }
    }
}

impl Settings {
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("beamtrace");
            p.push("settings.json");
            p
        })
    }

    /// Load settings, falling back to defaults on any failure.
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Best-effort save.
    pub fn save(&self) {
        let Some(path) = Self::path() else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Err(e) = std::fs::write(&path, json) {
                tracing::warn!(error = %e, "failed to save settings");
            }
        }
    }
}

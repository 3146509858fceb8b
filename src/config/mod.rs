//! Hover timing configuration.
//!
//! User-level config: `~/.ide-hover/config.yaml`
//! Project-level config: `.ide-hover/config.yaml`
//!
//! Resolution: defaults → user config → project config. Each file may set
//! any subset of the fields; the rest fall through.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HoverError, HoverResult};

/// Fully resolved hover timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverConfig {
    /// Quiet period before a pointer position counts as settled.
    pub quiet_period_ms: u64,
    /// Delay between leaving the hovered text and the popup closing.
    pub hide_delay_ms: u64,
    /// Minimum time the loading indicator stays up.
    pub min_progress_ms: u64,
    /// Horizontal reach (pixels) within which the pointer counts as on a glyph.
    pub near_text_px: f64,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 500,
            hide_delay_ms: 250,
            min_progress_ms: 1000,
            near_text_px: 10.0,
        }
    }
}

/// A config file's contents. Missing fields leave the lower layer untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_period_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_progress_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub near_text_px: Option<f64>,
}

/// Path to `~/.ide-hover/`.
fn dirs_path() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|p| PathBuf::from(p).join(".ide-hover"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME")
            .ok()
            .map(|p| PathBuf::from(p).join(".ide-hover"))
    }
}

const PROJECT_CONFIG: &str = ".ide-hover/config.yaml";

impl HoverConfig {
    /// Load config from disk, layering the project file over the user file.
    /// Unreadable or malformed files are logged and skipped.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Some(user) = dirs_path().map(|p| p.join("config.yaml")) {
            config.apply_file(&user);
        }
        config.apply_file(Path::new(PROJECT_CONFIG));
        config
    }

    /// Load a single file on top of the defaults, reporting any error.
    pub fn load_from(path: &Path) -> HoverResult<Self> {
        let overlay = ConfigOverlay::read(path)?;
        Ok(Self::default().with_overlay(&overlay))
    }

    /// Parse a YAML document on top of the defaults.
    pub fn from_yaml(yaml: &str) -> HoverResult<Self> {
        let overlay = ConfigOverlay::parse(yaml)?;
        Ok(Self::default().with_overlay(&overlay))
    }

    fn apply_file(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }
        match ConfigOverlay::read(path) {
            Ok(overlay) => *self = self.clone().with_overlay(&overlay),
            Err(e) => tracing::warn!("ignoring {}: {e}", path.display()),
        }
    }

    /// Apply the fields an overlay sets.
    pub fn with_overlay(mut self, overlay: &ConfigOverlay) -> Self {
        if let Some(v) = overlay.quiet_period_ms {
            self.quiet_period_ms = v;
        }
        if let Some(v) = overlay.hide_delay_ms {
            self.hide_delay_ms = v;
        }
        if let Some(v) = overlay.min_progress_ms {
            self.min_progress_ms = v;
        }
        if let Some(v) = overlay.near_text_px {
            self.near_text_px = v;
        }
        self
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }

    pub fn min_progress(&self) -> Duration {
        Duration::from_millis(self.min_progress_ms)
    }

    /// Save as a user-level config at `~/.ide-hover/config.yaml`.
    pub fn save(&self) -> HoverResult<()> {
        let dir = dirs_path()
            .ok_or_else(|| HoverError::Config("cannot determine home directory".into()))?;
        std::fs::create_dir_all(&dir)?;
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| HoverError::Config(format!("YAML serialize error: {e}")))?;
        std::fs::write(dir.join("config.yaml"), yaml)?;
        Ok(())
    }
}

impl ConfigOverlay {
    pub fn parse(yaml: &str) -> HoverResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let overlay: Self = serde_yaml::from_str(yaml)
            .map_err(|e| HoverError::Config(format!("invalid YAML: {e}")))?;
        if overlay.near_text_px.is_some_and(|px| !px.is_finite() || px < 0.0) {
            return Err(HoverError::Config(
                "near_text_px must be a non-negative number".into(),
            ));
        }
        Ok(overlay)
    }

    pub fn read(path: &Path) -> HoverResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

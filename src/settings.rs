use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::capture::CaptureOptions;

/// User-tunable settings, loaded from a JSON file in the working
/// directory. A missing file or missing fields fall back to defaults
/// that mirror the Kindle web reader: a 1000x1400 viewport with the
/// 60 px top chrome and 44 px bottom band clipped out of every capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub reader_url: String,
    /// Chromium profile directory; keeps login cookies across runs.
    pub profile_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub ebooks_dir: PathBuf,

    pub viewport_width: u32,
    pub viewport_height: u32,
    pub clip_top: u32,
    pub clip_bottom: u32,

    pub settle_ms: u64,
    pub required_matches: u32,
    pub max_frames: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reader_url: "https://read.amazon.com".into(),
            profile_dir: PathBuf::from("session"),
            screenshots_dir: PathBuf::from("screenshots"),
            ebooks_dir: PathBuf::from("ebooks"),
            viewport_width: 1000,
            viewport_height: 1400,
            clip_top: 60,
            clip_bottom: 44,
            settle_ms: 500,
            required_matches: 1,
            max_frames: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            settle: Duration::from_millis(self.settle_ms),
            required_matches: self.required_matches.max(1),
            max_frames: self.max_frames,
        }
    }

    /// Height of the capture clip after removing the UI bands.
    pub fn clip_height(&self) -> u32 {
        self.viewport_height
            .saturating_sub(self.clip_top + self.clip_bottom)
    }
}

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Top-level configuration for the metastrip pipeline.
///
/// Holds the fixed processing policies the pipeline applies: re-encode
/// quality, thumbnail sizing, and the video ceiling/codec settings. All
/// values have sensible defaults, so `ProcessingConfig::default()` is a
/// complete working configuration.
///
/// # Loading
///
/// ```rust,no_run
/// use metastrip::config::ProcessingConfig;
///
/// // From a JSON file
/// let config = ProcessingConfig::load(Some("metastrip.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = ProcessingConfig::default();
/// config.video.crf = 20;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Image re-encode and thumbnail policy.
    pub image: ImagePolicy,
    /// Video size ceiling and transcode policy.
    pub video: VideoPolicy,
}

/// Policy for the image re-encode path and thumbnail generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePolicy {
    /// JPEG quality used when re-encoding pixels (HEIC transcode output and
    /// lossy re-encode targets). 95 ≈ the 0.95 canvas quality of browser
    /// encoders.
    pub reencode_quality: u8,
    /// Longest edge of generated thumbnails, in pixels.
    pub thumbnail_max_dim: u32,
    /// JPEG quality for generated thumbnails.
    pub thumbnail_quality: u8,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            reencode_quality: 95,
            thumbnail_max_dim: 200,
            thumbnail_quality: 80,
        }
    }
}

/// Policy for the video stripping path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoPolicy {
    /// Largest accepted video input, in bytes. Inputs above this fail with
    /// [`Error::FileTooLarge`](crate::Error::FileTooLarge) before any
    /// transcoding is attempted.
    pub max_input_bytes: u64,
    /// x264 preset used when the container must be transcoded to MP4.
    pub preset: String,
    /// x264 constant rate factor for transcodes.
    pub crf: u8,
    /// AAC audio bitrate for transcodes.
    pub audio_bitrate: String,
}

impl Default for VideoPolicy {
    fn default() -> Self {
        Self {
            max_input_bytes: 500 * 1024 * 1024,
            preset: "fast".to_string(),
            crf: 23,
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// The three independently togglable removal categories requested by the
/// caller. Maps 1:1 to the host application's toggles, but is a plain value
/// object here.
///
/// Note the granularity difference between media kinds: images honor each
/// category separately; video removal is all-or-nothing — if *any* flag is
/// set, every container-level tag is stripped (see
/// [`video::strip`](crate::video::strip)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RemovalRequest {
    /// Remove the GPS/location segment.
    pub remove_gps: bool,
    /// Remove device and camera tags (make, model, software, lens, exposure
    /// settings — everything outside the structural allowlist).
    pub remove_device: bool,
    /// Remove capture/digitization/modification timestamps.
    pub remove_timestamps: bool,
}

impl RemovalRequest {
    /// A request with every category enabled.
    pub fn all() -> Self {
        Self {
            remove_gps: true,
            remove_device: true,
            remove_timestamps: true,
        }
    }

    /// True if at least one category is requested.
    pub fn requests_any(&self) -> bool {
        self.remove_gps || self.remove_device || self.remove_timestamps
    }
}

impl ProcessingConfig {
    /// Load config from the given path. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(config_path) = path else {
            return Ok(Self::default());
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
        let config: ProcessingConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))?;
        Ok(config)
    }

    /// Save config to the given path as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        log::info!("Config saved to {}", path.display());
        Ok(())
    }
}

//! Media asset models.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of a downloaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
        }
    }

    /// Fallback file extension when the source URL carries none.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Image => "png",
        }
    }
}

/// A local media file owned by a job.
///
/// Probe fields stay `None` until the prober has inspected the file; after
/// that the asset is treated as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Path inside the job workspace
    pub local_path: PathBuf,
    /// Asset kind
    pub kind: MediaKind,
    /// Container duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Whether the container has at least one audio stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_audio: Option<bool>,
    /// Frame width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Frame height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaAsset {
    /// Create an unprobed asset.
    pub fn new(local_path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            local_path: local_path.into(),
            kind,
            duration_seconds: None,
            has_audio: None,
            width: None,
            height: None,
        }
    }

    /// Return a copy carrying probe results.
    pub fn with_probe(
        mut self,
        duration_seconds: Option<f64>,
        has_audio: bool,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Self {
        self.duration_seconds = duration_seconds;
        self.has_audio = Some(has_audio);
        self.width = width;
        self.height = height;
        self
    }

    pub fn path(&self) -> &Path {
        &self.local_path
    }

    /// True once probe results have been attached.
    pub fn is_probed(&self) -> bool {
        self.has_audio.is_some()
    }

    /// Whether the asset is known to carry audio. Unprobed assets report false.
    pub fn has_audio(&self) -> bool {
        self.has_audio.unwrap_or(false)
    }

    /// Frame dimensions when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprobed_asset() {
        let asset = MediaAsset::new("/tmp/a.mp4", MediaKind::Video);
        assert!(!asset.is_probed());
        assert!(!asset.has_audio());
        assert_eq!(asset.dimensions(), None);
    }

    #[test]
    fn test_with_probe() {
        let asset = MediaAsset::new("/tmp/a.mp4", MediaKind::Video).with_probe(
            Some(10.5),
            true,
            Some(1920),
            Some(1080),
        );
        assert!(asset.is_probed());
        assert!(asset.has_audio());
        assert_eq!(asset.duration_seconds, Some(10.5));
        assert_eq!(asset.dimensions(), Some((1920, 1080)));
    }

    #[test]
    fn test_zero_dimensions_are_unknown() {
        let asset = MediaAsset::new("/tmp/a.mp4", MediaKind::Video).with_probe(
            Some(1.0),
            false,
            Some(0),
            Some(720),
        );
        assert_eq!(asset.dimensions(), None);
    }
}

//! Job submission payloads.

use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

use crate::{Anchor, EncodingConfig, JobId, OverlaySpec};

/// Maximum number of videos in one concatenation.
pub const MAX_VIDEO_INPUTS: usize = 20;

/// Request to compose one output video.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_compose"))]
pub struct ComposeRequest {
    /// Caller-supplied job id; generated when absent
    #[serde(default)]
    #[validate(custom(function = "validate_job_id"))]
    pub job_id: Option<String>,

    /// Videos to concatenate, in order
    #[validate(length(min = 1, max = 20), custom(function = "validate_urls"))]
    pub video_urls: Vec<String>,

    /// Music laid under the (concatenated) video
    #[serde(default)]
    #[validate(custom(function = "validate_http_url"))]
    pub music_url: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub overlay: Option<OverlayRequest>,

    /// Hand the composed video to the lip-sync provider afterwards
    #[serde(default)]
    #[validate(nested)]
    pub lipsync: Option<LipSyncRequest>,

    #[serde(default)]
    pub encoding: Option<EncodingConfig>,
}

impl ComposeRequest {
    /// Resolve the job id, generating one when the caller did not supply it.
    pub fn job_id(&self) -> JobId {
        self.job_id
            .as_deref()
            .map(JobId::from)
            .unwrap_or_default()
    }
}

/// Image overlay settings as sent by callers.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OverlayRequest {
    #[validate(custom(function = "validate_http_url_str"))]
    pub image_url: String,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default)]
    #[validate(range(min = 8, max = 4096))]
    pub width_pixels: Option<u32>,
    #[serde(default)]
    #[validate(range(max = 2000))]
    pub margin_pixels: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub opacity: Option<f32>,
}

impl OverlayRequest {
    /// Overlay spec with defaults filled in.
    pub fn to_spec(&self) -> OverlaySpec {
        let defaults = OverlaySpec::default();
        OverlaySpec::default()
            .with_anchor(self.anchor)
            .with_width(self.width_pixels.unwrap_or(defaults.width_pixels))
            .with_margin(self.margin_pixels.unwrap_or(defaults.margin_pixels))
            .with_opacity(self.opacity.unwrap_or(defaults.opacity))
    }
}

/// Lip-sync hand-off settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LipSyncRequest {
    /// Speech track for the provider; defaults to the music URL
    #[serde(default)]
    #[validate(custom(function = "validate_http_url"))]
    pub audio_url: Option<String>,
    /// Provider-specific video parameters, forwarded verbatim
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Request to replace a video's audio with a short faded clip.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AudioReplaceRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_job_id"))]
    pub job_id: Option<String>,
    #[validate(custom(function = "validate_http_url_str"))]
    pub video_url: String,
    #[validate(custom(function = "validate_http_url_str"))]
    pub audio_url: String,
}

impl AudioReplaceRequest {
    pub fn job_id(&self) -> JobId {
        self.job_id
            .as_deref()
            .map(JobId::from)
            .unwrap_or_default()
    }
}

fn validate_compose(request: &ComposeRequest) -> Result<(), ValidationError> {
    let has_work = request.video_urls.len() >= 2
        || request.music_url.is_some()
        || request.overlay.is_some();
    if !has_work {
        return Err(ValidationError::new("nothing_to_compose")
            .with_message("a single video needs a music track or an overlay".into()));
    }
    if let Some(lipsync) = &request.lipsync {
        if lipsync.audio_url.is_none() && request.music_url.is_none() {
            return Err(ValidationError::new("lipsync_audio_missing")
                .with_message("lip-sync needs an audio_url or a music_url".into()));
        }
    }
    Ok(())
}

fn validate_job_id(id: &str) -> Result<(), ValidationError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_job_id"))
    }
}

fn validate_urls(urls: &[String]) -> Result<(), ValidationError> {
    urls.iter().try_for_each(|u| validate_http_url_str(u))
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    validate_http_url_str(url)
}

fn validate_http_url_str(url: &str) -> Result<(), ValidationError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_url")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(videos: &[&str]) -> ComposeRequest {
        ComposeRequest {
            job_id: None,
            video_urls: videos.iter().map(|s| s.to_string()).collect(),
            music_url: None,
            overlay: None,
            lipsync: None,
            encoding: None,
        }
    }

    #[test]
    fn test_two_videos_is_valid() {
        let req = compose(&["https://a.example/1.mp4", "https://a.example/2.mp4"]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_single_video_without_music_or_overlay_is_rejected() {
        let req = compose(&["https://a.example/1.mp4"]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_single_video_with_music_is_valid() {
        let mut req = compose(&["https://a.example/1.mp4"]);
        req.music_url = Some("https://a.example/song.mp3".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let req = compose(&["file:///etc/passwd", "https://a.example/2.mp4"]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_job_id() {
        let mut req = compose(&["https://a.example/1.mp4", "https://a.example/2.mp4"]);
        req.job_id = Some("../escape".to_string());
        assert!(req.validate().is_err());
        req.job_id = Some("job_42-a".to_string());
        assert!(req.validate().is_ok());
        assert_eq!(req.job_id().as_str(), "job_42-a");
    }

    #[test]
    fn test_lipsync_requires_audio() {
        let mut req = compose(&["https://a.example/1.mp4", "https://a.example/2.mp4"]);
        req.lipsync = Some(LipSyncRequest::default());
        assert!(req.validate().is_err());
        req.music_url = Some("https://a.example/voice.mp3".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_overlay_request_to_spec_defaults() {
        let overlay: OverlayRequest =
            serde_json::from_str(r#"{"image_url":"https://a.example/logo.png"}"#).unwrap();
        let spec = overlay.to_spec();
        assert_eq!(spec, OverlaySpec::default());
    }

    #[test]
    fn test_overlay_width_bounds() {
        let mut req = compose(&["https://a.example/1.mp4"]);
        req.overlay = Some(OverlayRequest {
            image_url: "https://a.example/logo.png".to_string(),
            anchor: Anchor::TopLeft,
            width_pixels: Some(2),
            margin_pixels: None,
            opacity: None,
        });
        assert!(req.validate().is_err());
    }
}

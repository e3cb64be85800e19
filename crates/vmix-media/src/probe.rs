//! FFprobe media inspection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use vmix_models::MediaAsset;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What the prober learned about a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// Container duration in seconds; absent for still images
    pub duration_seconds: Option<f64>,
    pub has_audio: bool,
    pub has_video: bool,
    /// Dimensions of the first video stream
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a file for duration, audio presence and frame size.
///
/// Any failure to run or parse ffprobe is reported as [`MediaError::ProbeFailed`];
/// a missing binary is [`MediaError::FfprobeNotFound`].
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaProbe> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::probe_failed(path, "file does not exist"));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| MediaError::probe_failed(path, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::probe_failed(
            path,
            format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    let probe = parse_probe_output(path, &output.stdout)?;
    debug!(
        path = %path.display(),
        duration = ?probe.duration_seconds,
        has_audio = probe.has_audio,
        "Probed media"
    );
    Ok(probe)
}

/// Probe an asset and return a copy carrying the results.
pub async fn probe_asset(asset: MediaAsset) -> MediaResult<MediaAsset> {
    let probe = probe_media(asset.path()).await?;
    Ok(asset.with_probe(
        probe.duration_seconds,
        probe.has_audio,
        probe.width,
        probe.height,
    ))
}

/// Interpret ffprobe's JSON document for `path`.
pub fn parse_probe_output(path: &Path, stdout: &[u8]) -> MediaResult<MediaProbe> {
    let raw: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::probe_failed(path, format!("unreadable ffprobe output: {}", e)))?;
    if raw.streams.is_empty() {
        return Err(MediaError::probe_failed(path, "container has no streams"));
    }

    let has_audio = raw
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let video = raw
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    // Container duration first, then the longest stream duration
    let duration_seconds = raw
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| {
            raw.streams
                .iter()
                .filter_map(|s| parse_seconds(s.duration.as_deref()))
                .reduce(f64::max)
        });

    Ok(MediaProbe {
        duration_seconds,
        has_audio,
        has_video: video.is_some(),
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

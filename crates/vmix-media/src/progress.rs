//! FFmpeg progress tracking.

use serde::Serialize;

/// Snapshot of one `-progress` block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FfmpegProgress {
    /// Position in the output, milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Set once ffmpeg reports `progress=end`
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of `expected_seconds` written so far, capped at 100.
    pub fn percentage(&self, expected_seconds: f64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if !expected_seconds.is_finite() || expected_seconds <= 0.0 {
            return 0.0;
        }
        let done = self.out_time_ms.max(0) as f64 / 1000.0;
        ((done / expected_seconds) * 100.0).min(100.0)
    }
}

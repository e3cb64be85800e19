//! Music conditioning: loop, trim and fade a track to a target length.

use std::path::{Path, PathBuf};
use tracing::info;

use vmix_models::{EncodingConfig, MediaAsset};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Fade-out length when matching a video's duration.
pub const FADE_OUT_SECONDS: f64 = 2.0;
/// Output length of the fixed short-form policy.
pub const SHORT_FORM_SECONDS: f64 = 5.0;
/// Fade-in and fade-out length of the fixed short-form policy.
pub const SHORT_FORM_FADE_SECONDS: f64 = 0.5;

/// How a music track is shaped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioPolicy {
    /// Loop or trim to exactly this many seconds, 2 s fade-out at the end
    MatchDuration(f64),
    /// First 5 s with 0.5 s fades at both ends
    FixedShortForm,
}

impl AudioPolicy {
    /// Duration of the conditioned output.
    pub fn target_seconds(&self) -> f64 {
        match self {
            AudioPolicy::MatchDuration(d) => *d,
            AudioPolicy::FixedShortForm => SHORT_FORM_SECONDS,
        }
    }

    fn validate(&self) -> MediaResult<()> {
        let d = self.target_seconds();
        if !d.is_finite() || d < 0.0 {
            return Err(MediaError::graph_build(format!(
                "target duration must be a finite, non-negative number of seconds (got {})",
                d
            )));
        }
        Ok(())
    }
}

/// Where the closing fade begins for a track of `duration` seconds.
pub fn fade_out_start(duration: f64) -> f64 {
    (duration - FADE_OUT_SECONDS).max(0.0)
}

/// Extra repetitions needed so a `source`-second track covers `target` seconds.
///
/// Returns `None` when the source length is unknown; the caller then loops
/// indefinitely and relies on the trim to stop.
pub fn loop_count(source: Option<f64>, target: f64) -> Option<u32> {
    let source = source.filter(|s| s.is_finite() && *s > 0.0)?;
    if source >= target {
        return Some(0);
    }
    Some(((target / source).ceil() as u32).saturating_sub(1))
}

/// Comma-separated audio filter chain implementing `policy`.
///
/// The same chain is used by the conditioner and by the audio-replace graph.
pub fn audio_filter_chain(policy: AudioPolicy) -> MediaResult<String> {
    policy.validate()?;

    let chain = match policy {
        AudioPolicy::MatchDuration(d) => {
            let fade = FADE_OUT_SECONDS.min(d);
            format!(
                "atrim=start=0:end={d:.3},asetpts=PTS-STARTPTS,afade=t=out:st={st:.3}:d={fade:.3}",
                d = d,
                st = fade_out_start(d),
                fade = fade
            )
        }
        AudioPolicy::FixedShortForm => format!(
            "atrim=start=0:end={d:.3},asetpts=PTS-STARTPTS,afade=t=in:st=0:d={f:.3},afade=t=out:st={st:.3}:d={f:.3}",
            d = SHORT_FORM_SECONDS,
            f = SHORT_FORM_FADE_SECONDS,
            st = SHORT_FORM_SECONDS - SHORT_FORM_FADE_SECONDS
        ),
    };
    Ok(chain)
}

/// Runs the conditioning transcode.
#[derive(Debug, Clone)]
pub struct AudioConditioner {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl AudioConditioner {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            encoding: EncodingConfig::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Build the FFmpeg command without running it.
    pub fn build_command(
        &self,
        source: &MediaAsset,
        policy: AudioPolicy,
        output: &Path,
    ) -> MediaResult<FfmpegCommand> {
        let chain = audio_filter_chain(policy)?;

        if source.has_audio == Some(false) {
            return Err(MediaError::graph_build(format!(
                "{} has no audio stream",
                source.path().display()
            )));
        }

        let input_args: Vec<String> = match policy {
            AudioPolicy::MatchDuration(d) => match loop_count(source.duration_seconds, d) {
                Some(0) => Vec::new(),
                Some(n) => vec!["-stream_loop".to_string(), n.to_string()],
                None => vec!["-stream_loop".to_string(), "-1".to_string()],
            },
            AudioPolicy::FixedShortForm => Vec::new(),
        };

        Ok(FfmpegCommand::new(output)
            .input_with_args(input_args, source.path())
            .audio_filter(chain)
            .output_arg("-vn")
            .output_args(self.encoding.audio_args()))
    }

    /// Condition `source` into `output` and return the output path.
    pub async fn condition(
        &self,
        source: &MediaAsset,
        policy: AudioPolicy,
        output: impl AsRef<Path>,
    ) -> MediaResult<PathBuf> {
        let output = output.as_ref();
        let cmd = self.build_command(source, policy, output)?;

        info!(
            source = %source.path().display(),
            target_seconds = policy.target_seconds(),
            "Conditioning audio"
        );
        self.runner.run(&cmd).await?;

        if !output.exists() {
            return Err(MediaError::transcode_failed(
                "conditioned audio was not written",
                None,
                None,
            ));
        }
        Ok(output.to_path_buf())
    }
}

//! Filter graph construction.
//!
//! A [`FilterGraph`] is a complete description of one FFmpeg invocation:
//! ordered inputs, labelled filter stages and an explicit output mapping.
//! [`GraphBuilder`] chooses the topology from probed inputs and fails with
//! [`MediaError::GraphBuild`] before anything is spawned.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use vmix_models::{EncodingConfig, MediaAsset, OverlaySpec};

use crate::audio::{audio_filter_chain, AudioPolicy, SHORT_FORM_SECONDS};
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::overlay::{overlay_filter, scale_filter, OverlayPosition};

/// Default attenuation of music mixed under existing audio.
pub const DEFAULT_MIX_ATTENUATION_DB: f64 = 2.0;

/// Sample format every concat audio leg is normalised to.
const CONCAT_AUDIO_FORMAT: &str = "aformat=sample_fmts=fltp:sample_rates=44100:channel_layouts=stereo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Video,
    Audio,
}

impl StreamType {
    fn specifier(&self) -> char {
        match self {
            StreamType::Video => 'v',
            StreamType::Audio => 'a',
        }
    }
}

/// A stream either read straight from an input or produced by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRef {
    Input { index: usize, stream: StreamType },
    Label(String),
}

impl StreamRef {
    pub fn input(index: usize, stream: StreamType) -> Self {
        StreamRef::Input { index, stream }
    }

    pub fn label(name: impl Into<String>) -> Self {
        StreamRef::Label(name.into())
    }

    /// Pad syntax inside a filtergraph.
    pub fn pad(&self) -> String {
        match self {
            StreamRef::Input { index, stream } => format!("[{}:{}]", index, stream.specifier()),
            StreamRef::Label(name) => format!("[{}]", name),
        }
    }

    /// Argument for `-map`.
    pub fn map_spec(&self) -> String {
        match self {
            StreamRef::Input { index, stream } => format!("{}:{}:0", index, stream.specifier()),
            StreamRef::Label(name) => format!("[{}]", name),
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, StreamRef::Label(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecPolicy {
    /// Stream copy; only valid for unfiltered input streams
    Copy,
    /// Encode with the job's [`EncodingConfig`]
    Encode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedStream {
    pub source: StreamRef,
    pub codec: CodecPolicy,
}

impl MappedStream {
    pub fn copy(source: StreamRef) -> Self {
        Self {
            source,
            codec: CodecPolicy::Copy,
        }
    }

    pub fn encode(source: StreamRef) -> Self {
        Self {
            source,
            codec: CodecPolicy::Encode,
        }
    }
}

/// Exactly one video stream and at most one audio stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMapping {
    pub video: MappedStream,
    pub audio: Option<MappedStream>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphInput {
    pub path: PathBuf,
    /// Options placed before this input's `-i`
    pub args: Vec<String>,
}

impl GraphInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }
}

/// One filter with its input pads and output labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStage {
    pub inputs: Vec<StreamRef>,
    pub filter: String,
    pub outputs: Vec<String>,
}

impl FilterStage {
    pub fn new(inputs: Vec<StreamRef>, filter: impl Into<String>, outputs: &[&str]) -> Self {
        Self {
            inputs,
            filter: filter.into(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "{}", input.pad())?;
        }
        write!(f, "{}", self.filter)?;
        for output in &self.outputs {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// N-way concatenation
    Concat,
    /// Music attached or mixed, video copied
    AudioMix,
    /// Overlay composited, audio branch as in `AudioMix`
    AudioMixOverlay,
    /// Fixed 5 s audio replacement
    ShortFormReplace,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Concat => "concat",
            Topology::AudioMix => "audio_mix",
            Topology::AudioMixOverlay => "audio_mix_overlay",
            Topology::ShortFormReplace => "short_form_replace",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub topology: Topology,
    pub inputs: Vec<GraphInput>,
    pub stages: Vec<FilterStage>,
    pub mapping: StreamMapping,
    /// Hard bound on output length (`-t`)
    pub output_duration: Option<f64>,
    /// Best estimate of output length, for progress reporting
    pub expected_duration: Option<f64>,
}

impl FilterGraph {
    /// The `-filter_complex` argument, if any stage exists.
    pub fn filter_complex(&self) -> Option<String> {
        if self.stages.is_empty() {
            return None;
        }
        Some(
            self.stages
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";"),
        )
    }

    pub fn has_audio_output(&self) -> bool {
        self.mapping.audio.is_some()
    }

    /// Check labels, input indices and codec policies.
    pub fn validate(&self) -> MediaResult<()> {
        let mut produced: HashSet<&str> = HashSet::new();

        for stage in &self.stages {
            for input in &stage.inputs {
                self.check_ref(input, &produced)?;
            }
            for output in &stage.outputs {
                if !produced.insert(output.as_str()) {
                    return Err(MediaError::graph_build(format!(
                        "label [{}] produced twice",
                        output
                    )));
                }
            }
        }

        let mapped = std::iter::once(&self.mapping.video).chain(self.mapping.audio.as_ref());
        for stream in mapped {
            self.check_ref(&stream.source, &produced)?;
            if stream.codec == CodecPolicy::Copy && stream.source.is_filtered() {
                return Err(MediaError::graph_build(format!(
                    "filtered stream {} cannot be stream-copied",
                    stream.source.pad()
                )));
            }
        }

        Ok(())
    }

    fn check_ref(&self, stream: &StreamRef, produced: &HashSet<&str>) -> MediaResult<()> {
        match stream {
            StreamRef::Input { index, .. } if *index >= self.inputs.len() => Err(
                MediaError::graph_build(format!("input {} does not exist", index)),
            ),
            StreamRef::Label(name) if !produced.contains(name.as_str()) => Err(
                MediaError::graph_build(format!("label [{}] is never produced", name)),
            ),
            _ => Ok(()),
        }
    }

    /// Render into an FFmpeg command writing `output`.
    pub fn to_command(&self, output: &Path, encoding: &EncodingConfig) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output);
        for input in &self.inputs {
            cmd = cmd.input_with_args(input.args.iter().cloned(), &input.path);
        }

        if let Some(filter) = self.filter_complex() {
            cmd = cmd.filter_complex(filter);
        }

        let video = &self.mapping.video;
        cmd = cmd.map(video.source.map_spec());
        cmd = match video.codec {
            CodecPolicy::Copy => cmd.output_args(["-c:v", "copy"]),
            CodecPolicy::Encode => cmd.output_args(encoding.video_args()),
        };

        cmd = match &self.mapping.audio {
            Some(audio) => {
                let cmd = cmd.map(audio.source.map_spec());
                match audio.codec {
                    CodecPolicy::Copy => cmd.output_args(["-c:a", "copy"]),
                    CodecPolicy::Encode => cmd.output_args(encoding.audio_args()),
                }
            }
            None => cmd.output_arg("-an"),
        };

        if let Some(duration) = self.output_duration {
            cmd = cmd.duration(duration);
        }

        cmd.output_args(["-movflags", "+faststart"])
    }
}

/// Chooses and builds graph topologies.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    mix_attenuation_db: f64,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self {
            mix_attenuation_db: DEFAULT_MIX_ATTENUATION_DB,
        }
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mix_attenuation_db(mut self, db: f64) -> Self {
        self.mix_attenuation_db = db.abs();
        self
    }

    /// Concatenate two or more probed videos in order.
    ///
    /// When any input carries audio, inputs without audio are paired with a
    /// generated silent track of their own duration so every concat segment
    /// has one video and one audio pad. The input's own video stream cannot
    /// stand in for the missing audio: concat rejects a video pad in an
    /// audio slot. When no input has audio, the output is video-only.
    pub fn concat(&self, videos: &[MediaAsset]) -> MediaResult<FilterGraph> {
        if videos.len() < 2 {
            return Err(MediaError::graph_build(format!(
                "concatenation needs at least two videos, got {}",
                videos.len()
            )));
        }
        for video in videos {
            require_probed(video)?;
        }

        let any_audio = videos.iter().any(MediaAsset::has_audio);
        let target = videos[0].dimensions();
        let mut stages = Vec::new();
        let mut concat_pads = Vec::new();

        for (i, video) in videos.iter().enumerate() {
            let v_label = format!("v{}", i);
            let video_filter = match target {
                Some((w, h)) if video.dimensions() != Some((w, h)) => format!(
                    "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1"
                ),
                _ => "setsar=1".to_string(),
            };
            stages.push(FilterStage::new(
                vec![StreamRef::input(i, StreamType::Video)],
                video_filter,
                &[&v_label],
            ));
            concat_pads.push(StreamRef::label(v_label));

            if !any_audio {
                continue;
            }

            let a_label = format!("a{}", i);
            if video.has_audio() {
                stages.push(FilterStage::new(
                    vec![StreamRef::input(i, StreamType::Audio)],
                    CONCAT_AUDIO_FORMAT,
                    &[&a_label],
                ));
            } else {
                let duration = video.duration_seconds.ok_or_else(|| {
                    MediaError::graph_build(format!(
                        "duration of {} is unknown; cannot pad its missing audio",
                        video.path().display()
                    ))
                })?;
                stages.push(FilterStage::new(
                    Vec::new(),
                    format!(
                        "anullsrc=channel_layout=stereo:sample_rate=44100,atrim=duration={:.3},{}",
                        duration, CONCAT_AUDIO_FORMAT
                    ),
                    &[&a_label],
                ));
            }
            concat_pads.push(StreamRef::label(a_label));
        }

        let n = videos.len();
        let (concat_filter, outputs, audio): (String, &[&str], _) = if any_audio {
            (
                format!("concat=n={}:v=1:a=1", n),
                &["vout", "aout"],
                Some(MappedStream::encode(StreamRef::label("aout"))),
            )
        } else {
            (format!("concat=n={}:v=1:a=0", n), &["vout"], None)
        };
        stages.push(FilterStage::new(concat_pads, concat_filter, outputs));

        let inputs = videos.iter().map(|v| GraphInput::new(v.path())).collect();
        let expected_duration = videos
            .iter()
            .map(|v| v.duration_seconds)
            .sum::<Option<f64>>();

        finish(FilterGraph {
            topology: Topology::Concat,
            inputs,
            stages,
            mapping: StreamMapping {
                video: MappedStream::encode(StreamRef::label("vout")),
                audio,
            },
            output_duration: None,
            expected_duration,
        })
    }

    /// Attach conditioned music to a video and/or composite an image overlay.
    ///
    /// Without an overlay the video stream is copied. The audio branch is the
    /// same either way: mix when both sources have audio, otherwise map
    /// whichever source exists.
    pub fn attach_audio(
        &self,
        video: &MediaAsset,
        music: Option<&MediaAsset>,
        overlay: Option<(&MediaAsset, &OverlaySpec)>,
    ) -> MediaResult<FilterGraph> {
        if music.is_none() && overlay.is_none() {
            return Err(MediaError::graph_build(
                "nothing to attach: neither music nor overlay given",
            ));
        }
        require_probed(video)?;

        let mut inputs = vec![GraphInput::new(video.path())];
        let mut stages = Vec::new();

        let music_index = match music {
            Some(track) => {
                require_probed(track)?;
                if !track.has_audio() {
                    return Err(MediaError::graph_build(format!(
                        "music track {} has no audio stream",
                        track.path().display()
                    )));
                }
                inputs.push(GraphInput::new(track.path()));
                Some(inputs.len() - 1)
            }
            None => None,
        };

        let audio = match (video.has_audio(), music_index) {
            (true, Some(m)) => {
                stages.push(FilterStage::new(
                    vec![StreamRef::input(m, StreamType::Audio)],
                    format!("volume=-{}dB", format_db(self.mix_attenuation_db)),
                    &["music"],
                ));
                stages.push(FilterStage::new(
                    vec![StreamRef::input(0, StreamType::Audio), StreamRef::label("music")],
                    "amix=inputs=2:duration=shortest:dropout_transition=0",
                    &["aout"],
                ));
                Some(MappedStream::encode(StreamRef::label("aout")))
            }
            (false, Some(m)) => Some(MappedStream::encode(StreamRef::input(m, StreamType::Audio))),
            (true, None) => Some(MappedStream::copy(StreamRef::input(0, StreamType::Audio))),
            (false, None) => None,
        };

        let (topology, video_stream) = match overlay {
            Some((image, spec)) => {
                if !image.path().exists() {
                    return Err(MediaError::graph_build(format!(
                        "overlay image {} does not exist",
                        image.path().display()
                    )));
                }
                inputs.push(GraphInput::new(image.path()));
                let overlay_index = inputs.len() - 1;
                let position = OverlayPosition::from_spec(spec);
                stages.push(FilterStage::new(
                    vec![StreamRef::input(overlay_index, StreamType::Video)],
                    scale_filter(spec.width_pixels),
                    &["ovl"],
                ));
                stages.push(FilterStage::new(
                    vec![StreamRef::input(0, StreamType::Video), StreamRef::label("ovl")],
                    overlay_filter(&position),
                    &["vout"],
                ));
                (
                    Topology::AudioMixOverlay,
                    MappedStream::encode(StreamRef::label("vout")),
                )
            }
            None => (
                Topology::AudioMix,
                MappedStream::copy(StreamRef::input(0, StreamType::Video)),
            ),
        };

        let expected_duration = match (video.duration_seconds, music.and_then(|m| m.duration_seconds)) {
            (Some(v), Some(m)) if video.has_audio() => Some(v.min(m)),
            (v, _) => v,
        };

        finish(FilterGraph {
            topology,
            inputs,
            stages,
            mapping: StreamMapping {
                video: video_stream,
                audio,
            },
            output_duration: None,
            expected_duration,
        })
    }

    /// Replace a video's audio with the first 5 s of `audio`, faded in and out.
    pub fn short_form_replace(
        &self,
        video: &MediaAsset,
        audio: &MediaAsset,
    ) -> MediaResult<FilterGraph> {
        require_probed(video)?;
        require_probed(audio)?;
        if !audio.has_audio() {
            return Err(MediaError::graph_build(format!(
                "{} has no audio stream",
                audio.path().display()
            )));
        }

        let chain = audio_filter_chain(AudioPolicy::FixedShortForm)?;
        let stages = vec![FilterStage::new(
            vec![StreamRef::input(1, StreamType::Audio)],
            chain,
            &["aout"],
        )];

        let expected_duration = Some(
            video
                .duration_seconds
                .map_or(SHORT_FORM_SECONDS, |d| d.min(SHORT_FORM_SECONDS)),
        );

        finish(FilterGraph {
            topology: Topology::ShortFormReplace,
            inputs: vec![GraphInput::new(video.path()), GraphInput::new(audio.path())],
            stages,
            mapping: StreamMapping {
                video: MappedStream::copy(StreamRef::input(0, StreamType::Video)),
                audio: Some(MappedStream::encode(StreamRef::label("aout"))),
            },
            output_duration: Some(SHORT_FORM_SECONDS),
            expected_duration,
        })
    }
}

fn finish(graph: FilterGraph) -> MediaResult<FilterGraph> {
    graph.validate()?;
    Ok(graph)
}

fn require_probed(asset: &MediaAsset) -> MediaResult<()> {
    if asset.is_probed() {
        Ok(())
    } else {
        Err(MediaError::graph_build(format!(
            "{} has not been probed",
            asset.path().display()
        )))
    }
}

fn format_db(db: f64) -> String {
    if db.fract() == 0.0 {
        format!("{}", db as i64)
    } else {
        format!("{:.2}", db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmix_models::{Anchor, MediaKind};

    fn video(name: &str, duration: f64, has_audio: bool) -> MediaAsset {
        MediaAsset::new(format!("/work/{}.mp4", name), MediaKind::Video).with_probe(
            Some(duration),
            has_audio,
            Some(1920),
            Some(1080),
        )
    }

    fn music(duration: f64) -> MediaAsset {
        MediaAsset::new("/work/music_conditioned.m4a", MediaKind::Audio)
            .with_probe(Some(duration), true, None, None)
    }

    fn overlay_image() -> (tempfile::NamedTempFile, MediaAsset) {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let asset = MediaAsset::new(file.path(), MediaKind::Image).with_probe(
            None,
            false,
            Some(300),
            Some(300),
        );
        (file, asset)
    }

    #[test]
    fn test_concat_keeps_audio_when_any_input_has_it() {
        let graph = GraphBuilder::new()
            .concat(&[video("a", 10.0, true), video("b", 10.0, false)])
            .unwrap();

        assert_eq!(graph.topology, Topology::Concat);
        assert!(graph.has_audio_output());
        let fc = graph.filter_complex().unwrap();
        assert!(!fc.contains("[1:a]"));
        assert!(fc.contains("[0:a]aformat="));
        assert!(fc.contains("anullsrc=channel_layout=stereo:sample_rate=44100,atrim=duration=10.000"));
        assert!(fc.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[vout][aout]"));
        assert_eq!(graph.expected_duration, Some(20.0));
    }

    #[test]
    fn test_concat_without_audio_is_video_only() {
        let graph = GraphBuilder::new()
            .concat(&[video("a", 4.0, false), video("b", 6.0, false), video("c", 1.0, false)])
            .unwrap();

        assert!(!graph.has_audio_output());
        let fc = graph.filter_complex().unwrap();
        assert!(!fc.contains("anullsrc"));
        assert!(fc.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[vout]"));

        let args = graph
            .to_command(Path::new("/work/concat.mp4"), &EncodingConfig::default())
            .build_args();
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_concat_scales_mismatched_inputs() {
        let small = MediaAsset::new("/work/small.mp4", MediaKind::Video).with_probe(
            Some(3.0),
            true,
            Some(640),
            Some(360),
        );
        let graph = GraphBuilder::new()
            .concat(&[video("a", 5.0, true), small])
            .unwrap();
        let fc = graph.filter_complex().unwrap();
        assert!(fc.contains("[0:v]setsar=1[v0]"));
        assert!(fc.contains(
            "[1:v]scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1[v1]"
        ));
    }

    #[test]
    fn test_concat_needs_two_videos() {
        let err = GraphBuilder::new().concat(&[video("a", 5.0, true)]).unwrap_err();
        assert!(matches!(err, MediaError::GraphBuild(_)));
        assert!(GraphBuilder::new().concat(&[]).is_err());
    }

    #[test]
    fn test_concat_fails_on_unknown_duration_of_silent_input() {
        let unknown = MediaAsset::new("/work/b.mp4", MediaKind::Video).with_probe(
            None,
            false,
            Some(1920),
            Some(1080),
        );
        let err = GraphBuilder::new()
            .concat(&[video("a", 5.0, true), unknown])
            .unwrap_err();
        assert!(matches!(err, MediaError::GraphBuild(_)));
    }

    #[test]
    fn test_unprobed_input_is_rejected() {
        let raw = MediaAsset::new("/work/raw.mp4", MediaKind::Video);
        assert!(GraphBuilder::new()
            .concat(&[video("a", 5.0, true), raw])
            .is_err());
    }

    #[test]
    fn test_mix_with_existing_audio_copies_video() {
        let graph = GraphBuilder::new()
            .attach_audio(&video("v", 20.0, true), Some(&music(20.0)), None)
            .unwrap();

        assert_eq!(graph.topology, Topology::AudioMix);
        assert_eq!(
            graph.filter_complex().unwrap(),
            "[1:a]volume=-2dB[music];[0:a][music]amix=inputs=2:duration=shortest:dropout_transition=0[aout]"
        );
        assert_eq!(graph.mapping.video, MappedStream::copy(StreamRef::input(0, StreamType::Video)));

        let args = graph
            .to_command(Path::new("/work/out.mp4"), &EncodingConfig::default())
            .build_args()
            .join(" ");
        assert!(args.contains("-map 0:v:0 -c:v copy -map [aout] -c:a aac"));
    }

    #[test]
    fn test_music_becomes_sole_audio_for_silent_video() {
        let graph = GraphBuilder::new()
            .attach_audio(&video("v", 20.0, false), Some(&music(20.0)), None)
            .unwrap();

        assert!(graph.filter_complex().is_none());
        assert_eq!(
            graph.mapping.audio,
            Some(MappedStream::encode(StreamRef::input(1, StreamType::Audio)))
        );
    }

    #[test]
    fn test_mix_with_overlay_reencodes_video_and_keeps_audio_branch() {
        let (_file, image) = overlay_image();
        let spec = OverlaySpec::default();
        let graph = GraphBuilder::new()
            .attach_audio(&video("v", 12.0, true), Some(&music(30.0)), Some((&image, &spec)))
            .unwrap();

        assert_eq!(graph.topology, Topology::AudioMixOverlay);
        let fc = graph.filter_complex().unwrap();
        assert!(fc.contains("[0:a][music]amix=inputs=2:duration=shortest"));
        assert!(fc.contains("[2:v]scale=150:-1[ovl]"));
        assert!(fc.contains("[0:v][ovl]overlay=W-w-20:H-h-20:format=auto[vout]"));
        assert_eq!(graph.mapping.video.codec, CodecPolicy::Encode);
        assert_eq!(
            graph.mapping.audio,
            Some(MappedStream::encode(StreamRef::label("aout")))
        );
        assert_eq!(graph.expected_duration, Some(12.0));
    }

    #[test]
    fn test_overlay_only_copies_source_audio() {
        let (_file, image) = overlay_image();
        let spec = OverlaySpec::default().with_anchor(Anchor::TopLeft);
        let graph = GraphBuilder::new()
            .attach_audio(&video("v", 8.0, true), None, Some((&image, &spec)))
            .unwrap();

        let fc = graph.filter_complex().unwrap();
        assert!(fc.contains("[1:v]scale=150:-1[ovl]"));
        assert!(fc.contains("overlay=20:20:format=auto"));
        assert_eq!(
            graph.mapping.audio,
            Some(MappedStream::copy(StreamRef::input(0, StreamType::Audio)))
        );
    }

    #[test]
    fn test_missing_overlay_file_fails_fast() {
        let image = MediaAsset::new("/nowhere/logo.png", MediaKind::Image).with_probe(
            None,
            false,
            Some(100),
            Some(100),
        );
        let spec = OverlaySpec::default();
        let err = GraphBuilder::new()
            .attach_audio(&video("v", 8.0, true), Some(&music(8.0)), Some((&image, &spec)))
            .unwrap_err();
        assert!(matches!(err, MediaError::GraphBuild(_)));
    }

    #[test]
    fn test_attach_requires_music_or_overlay() {
        assert!(GraphBuilder::new()
            .attach_audio(&video("v", 8.0, true), None, None)
            .is_err());
    }

    #[test]
    fn test_short_form_replace() {
        let source = MediaAsset::new("/work/voice.mp3", MediaKind::Audio).with_probe(
            Some(42.0),
            true,
            None,
            None,
        );
        let graph = GraphBuilder::new()
            .short_form_replace(&video("v", 30.0, true), &source)
            .unwrap();

        assert_eq!(graph.topology, Topology::ShortFormReplace);
        assert_eq!(
            graph.filter_complex().unwrap(),
            "[1:a]atrim=start=0:end=5.000,asetpts=PTS-STARTPTS,afade=t=in:st=0:d=0.500,afade=t=out:st=4.500:d=0.500[aout]"
        );
        let args = graph
            .to_command(Path::new("/work/out.mp4"), &EncodingConfig::default())
            .build_args()
            .join(" ");
        assert!(args.contains("-map 0:v:0 -c:v copy -map [aout]"));
        assert!(args.contains("-t 5.000"));
    }

    #[test]
    fn test_validate_rejects_copy_of_filtered_stream() {
        let graph = FilterGraph {
            topology: Topology::AudioMix,
            inputs: vec![GraphInput::new("/work/a.mp4")],
            stages: vec![FilterStage::new(
                vec![StreamRef::input(0, StreamType::Video)],
                "setsar=1",
                &["v0"],
            )],
            mapping: StreamMapping {
                video: MappedStream::copy(StreamRef::label("v0")),
                audio: None,
            },
            output_duration: None,
            expected_duration: None,
        };
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dangling_label_and_input() {
        let mut graph = GraphBuilder::new()
            .attach_audio(&video("v", 20.0, true), Some(&music(20.0)), None)
            .unwrap();
        graph.mapping.audio = Some(MappedStream::encode(StreamRef::label("nope")));
        assert!(graph.validate().is_err());

        graph.mapping.audio = Some(MappedStream::encode(StreamRef::input(5, StreamType::Audio)));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_custom_attenuation() {
        let graph = GraphBuilder::new()
            .with_mix_attenuation_db(3.5)
            .attach_audio(&video("v", 20.0, true), Some(&music(20.0)), None)
            .unwrap();
        assert!(graph
            .filter_complex()
            .unwrap()
            .starts_with("[1:a]volume=-3.50dB[music]"));
    }
}

//! FFmpeg CLI wrapper for media composition.
//!
//! This crate provides:
//! - Media probing (duration, audio presence, frame size)
//! - HTTP download of inputs
//! - Music conditioning (loop, trim, fade)
//! - Overlay placement geometry
//! - Filter graph topologies and their execution
//!
//! All transcoding goes through the FFmpeg CLI; there are no native bindings.

pub mod audio;
pub mod command;
pub mod compose;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod graph;
pub mod overlay;
pub mod probe;
pub mod progress;

pub use audio::{audio_filter_chain, fade_out_start, AudioConditioner, AudioPolicy};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::CompositionExecutor;
pub use download::AssetDownloader;
pub use error::{MediaError, MediaResult};
pub use fs_utils::publish_file;
pub use graph::{
    CodecPolicy, FilterGraph, FilterStage, GraphBuilder, MappedStream, StreamMapping, StreamRef,
    StreamType, Topology,
};
pub use overlay::{AxisOffset, OverlayPosition};
pub use probe::{probe_asset, probe_media, MediaProbe};
pub use progress::FfmpegProgress;

//! Shared data models for the vmix composition service.
//!
//! This crate provides Serde-serializable types for:
//! - Composition jobs, their stages and external tasks
//! - Media assets and overlay placement
//! - Encoding configuration
//! - Persisted job records and API request payloads

pub mod encoding;
pub mod job;
pub mod media;
pub mod overlay;
pub mod record;
pub mod request;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{CompositionJob, ExternalTask, JobId, JobKind, JobStage};
pub use media::{MediaAsset, MediaKind};
pub use overlay::{Anchor, OverlaySpec};
pub use record::{JobRecord, RecordStatus};
pub use request::{AudioReplaceRequest, ComposeRequest, LipSyncRequest, OverlayRequest};

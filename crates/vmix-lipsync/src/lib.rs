//! Lip-sync hand-off for composed videos.
//!
//! - [`LipSyncClient`]: HTTP client for the provider
//! - [`ExternalTaskPoller`]: drives a submitted task to a terminal state
//! - [`TaskStatus`]: provider status normalized at the boundary

pub mod aliases;
pub mod client;
pub mod error;
pub mod poller;
pub mod types;

pub use client::{LipSyncClient, LipSyncConfig};
pub use error::{LipSyncError, LipSyncResult};
pub use poller::{ExternalTaskPoller, NoopObserver, PollerConfig, StatusObserver, TaskProvider};
pub use types::{SubmitRequest, TaskStatus};

//! HTTP handlers.

pub mod health;
pub mod jobs;

pub use health::{health, ready};
pub use jobs::{create_audio_replace_job, create_compose_job, get_job};

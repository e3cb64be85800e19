//! Composition job worker.
//!
//! This crate provides:
//! - The job pipeline (acquire, condition, compose, publish, lip-sync)
//! - Fire-and-forget job execution with an in-memory registry
//! - Output publication and the retention sweeper

pub mod config;
pub mod error;
pub mod executor;
pub mod lipsync;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod registry;
pub mod sweeper;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::{JobRequest, Pipeline};
pub use publish::{PublishedOutput, Publisher, OUTPUTS_ROUTE};
pub use registry::{JobRegistry, JobSnapshot};
pub use sweeper::OutputSweeper;
pub use workspace::JobWorkspace;

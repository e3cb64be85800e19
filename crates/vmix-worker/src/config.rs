//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent of the per-job temporary workspaces
    pub work_dir: PathBuf,
    /// Directory published outputs are copied into
    pub public_dir: PathBuf,
    /// Externally reachable base URL of the service (no trailing slash)
    pub public_base_url: String,
    /// Maximum concurrent FFmpeg processes across all jobs
    pub max_ffmpeg_processes: usize,
    /// Request timeout for input downloads
    pub download_timeout: Duration,
    /// Age after which published outputs are swept
    pub output_retention: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vmix"),
            public_dir: PathBuf::from("./public"),
            public_base_url: "http://localhost:8000".to_string(),
            max_ffmpeg_processes: 4,
            download_timeout: Duration::from_secs(600),
            output_retention: Duration::from_secs(3600), // 1 hour
            sweep_interval: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            public_dir: std::env::var("WORKER_PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            max_ffmpeg_processes: std::env::var("WORKER_MAX_FFMPEG")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_ffmpeg_processes),
            download_timeout: secs_from_env("DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout),
            output_retention: secs_from_env("OUTPUT_RETENTION_SECS", defaults.output_retention),
            sweep_interval: secs_from_env("OUTPUT_SWEEP_INTERVAL_SECS", defaults.sweep_interval),
        }
    }
}

/// Whole seconds from `key`; zero and unparsable values fall back to `default`.
fn secs_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

//! Background removal of expired published outputs.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::config::WorkerConfig;
use crate::metrics;
use crate::registry::JobRegistry;

/// Shortest accepted sweep interval.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Deletes published outputs older than the retention period.
pub struct OutputSweeper {
    dir: PathBuf,
    retention: Duration,
    interval: Duration,
    registry: Option<JobRegistry>,
}

impl OutputSweeper {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
            interval: interval.max(MIN_INTERVAL),
            registry: None,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            &config.public_dir,
            config.output_retention,
            config.sweep_interval,
        )
    }

    /// Also forget finished jobs whose outputs have expired.
    pub fn with_registry(mut self, registry: JobRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Run forever. Spawn this as a background task.
    pub async fn run(self) {
        info!(
            dir = %self.dir.display(),
            retention_secs = self.retention.as_secs(),
            "Starting output sweeper (interval: {:?})",
            self.interval
        );

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(0) => debug!("Output sweep found nothing to remove"),
                Ok(removed) => info!(removed, "Removed expired outputs"),
                Err(e) => error!("Output sweep error: {:#}", e),
            }
        }
    }

    /// Remove every regular file in the output directory older than the
    /// retention period. Returns how many were removed.
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.dir.display()));
            }
        };

        let now = SystemTime::now();
        let mut removed = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let meta = entry
                .metadata()
                .await
                .with_context(|| format!("stat {}", path.display()))?;
            if !meta.is_file() {
                continue;
            }

            // A modification time in the future counts as age zero.
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.retention {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "Removed expired output");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing {}", path.display()));
                }
            }
        }

        if let Some(registry) = &self.registry {
            registry.prune_finished(self.retention).await;
        }
        metrics::record_outputs_swept(removed);
        Ok(removed)
    }
}

//! Composition executor: one FFmpeg invocation per filter graph.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use vmix_models::EncodingConfig;

use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::graph::FilterGraph;

/// Materializes filter graphs into output files.
#[derive(Debug, Clone)]
pub struct CompositionExecutor {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl CompositionExecutor {
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

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    /// Run `graph` and return `output` once it has been written.
    pub async fn execute(&self, graph: &FilterGraph, output: impl AsRef<Path>) -> MediaResult<PathBuf> {
        self.execute_with_progress(graph, output, |_| {}).await
    }

    /// Run `graph`, reporting percentage complete to `on_progress`.
    ///
    /// The callback only observes; the outcome is decided by the process exit
    /// status and the presence of the output file.
    pub async fn execute_with_progress<F>(
        &self,
        graph: &FilterGraph,
        output: impl AsRef<Path>,
        on_progress: F,
    ) -> MediaResult<PathBuf>
    where
        F: Fn(f64) + Send + 'static,
    {
        let output = output.as_ref();

        graph.validate()?;
        if let Some(missing) = graph.inputs.iter().find(|i| !i.path.exists()) {
            return Err(MediaError::graph_build(format!(
                "input {} does not exist",
                missing.path.display()
            )));
        }

        let cmd = graph.to_command(output, &self.encoding);
        info!(
            topology = graph.topology.as_str(),
            inputs = graph.inputs.len(),
            output = %output.display(),
            "Executing filter graph"
        );

        let expected = graph.expected_duration.unwrap_or(0.0);
        self.runner
            .run_with_progress(&cmd, move |progress| {
                on_progress(progress.percentage(expected));
            })
            .await?;

        let written = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(MediaError::transcode_failed(
                "FFmpeg reported success but wrote no output",
                None,
                Some(0),
            ));
        }

        debug!(bytes = written, output = %output.display(), "Composition finished");
        Ok(output.to_path_buf())
    }
}

//! Job pipeline.
//!
//! One run per job: acquire (download and probe every input), condition the
//! music, build and execute the filter graph, publish, and optionally hand
//! the published output to the lip-sync provider. Stages run strictly in
//! that order. Any error ends the job as `failed`; it never escapes the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{warn, Instrument};

use vmix_lipsync::{ExternalTaskPoller, LipSyncClient, LipSyncError, SubmitRequest};
use vmix_media::{
    AssetDownloader, AudioConditioner, AudioPolicy, CompositionExecutor, FfmpegRunner,
    FilterGraph, GraphBuilder, MediaError,
};
use vmix_models::{
    AudioReplaceRequest, ComposeRequest, EncodingConfig, JobId, JobKind, JobRecord, JobStage,
    LipSyncRequest, MediaAsset, MediaKind, OverlaySpec, RecordStatus,
};
use vmix_store::{JobStore, RecordUpdate};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::lipsync::RecordObserver;
use crate::logging::JobLogger;
use crate::metrics;
use crate::publish::{PublishedOutput, Publisher};
use crate::registry::JobRegistry;
use crate::workspace::JobWorkspace;

/// A validated job submission.
#[derive(Debug, Clone)]
pub enum JobRequest {
    Compose(ComposeRequest),
    AudioReplace(AudioReplaceRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Compose(_) => JobKind::Compose,
            JobRequest::AudioReplace(_) => JobKind::AudioReplace,
        }
    }

    /// The caller's job id, or a fresh one. Call once per submission.
    pub fn job_id(&self) -> JobId {
        match self {
            JobRequest::Compose(req) => req.job_id(),
            JobRequest::AudioReplace(req) => req.job_id(),
        }
    }

    pub fn overlay_spec(&self) -> Option<OverlaySpec> {
        match self {
            JobRequest::Compose(req) => req.overlay.as_ref().map(|o| o.to_spec()),
            JobRequest::AudioReplace(_) => None,
        }
    }

    pub fn wants_lipsync(&self) -> bool {
        matches!(self, JobRequest::Compose(req) if req.lipsync.is_some())
    }
}

/// Record store write that never fails the job.
pub(crate) async fn write_record(store: &dyn JobStore, id: &JobId, update: RecordUpdate) {
    if let Err(e) = store.update(id, &update).await {
        warn!(job_id = %id, status = %update.status, error = %e, "Failed to write job record");
    }
}

/// Everything a job run needs.
pub struct Pipeline {
    config: WorkerConfig,
    downloader: AssetDownloader,
    runner: FfmpegRunner,
    conditioner: AudioConditioner,
    builder: GraphBuilder,
    publisher: Publisher,
    store: Arc<dyn JobStore>,
    registry: JobRegistry,
    lipsync: Option<ExternalTaskPoller<LipSyncClient>>,
}

impl Pipeline {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        registry: JobRegistry,
    ) -> WorkerResult<Self> {
        let downloader = AssetDownloader::new(config.download_timeout)?;
        let runner = FfmpegRunner::with_max_processes(config.max_ffmpeg_processes);
        let conditioner = AudioConditioner::new(runner.clone());
        let publisher = Publisher::from_config(&config);

        Ok(Self {
            config,
            downloader,
            runner,
            conditioner,
            builder: GraphBuilder::new(),
            publisher,
            store,
            registry,
            lipsync: None,
        })
    }

    pub fn with_lipsync(mut self, poller: ExternalTaskPoller<LipSyncClient>) -> Self {
        self.lipsync = Some(poller);
        self
    }

    pub fn lipsync_enabled(&self) -> bool {
        self.lipsync.is_some()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Run a registered job to a terminal state.
    pub async fn run(&self, id: JobId, request: JobRequest) {
        let kind = request.kind();
        let logger = JobLogger::new(&id, kind);
        let span = logger.create_span();

        async {
            let started = Instant::now();
            metrics::record_job_started(kind);
            logger.log_start(&format!("{} accepted", kind));

            if let Err(e) = self.store.upsert(&JobRecord::started(id.clone(), kind)).await {
                logger.log_warning(&format!("could not create job record: {}", e));
            }

            let outcome = self.process(&id, &request, &logger).await;
            let elapsed = started.elapsed().as_secs_f64();

            match outcome {
                Ok(url) => {
                    self.registry.update(&id, |job| job.complete(url.clone())).await;
                    write_record(self.store.as_ref(), &id, RecordUpdate::completed(&url)).await;
                    metrics::record_job_completed(kind, elapsed);
                    logger.log_completion(&url);
                }
                Err(e) => {
                    let message = e.failure_message();
                    self.registry.update(&id, |job| job.fail(message.clone())).await;
                    write_record(self.store.as_ref(), &id, RecordUpdate::failed(&message)).await;
                    metrics::record_job_failed(kind, elapsed);
                    logger.log_error(&message);
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(
        &self,
        id: &JobId,
        request: &JobRequest,
        logger: &JobLogger,
    ) -> WorkerResult<String> {
        let workspace = JobWorkspace::create(&self.config.work_dir, id).await?;
        match request {
            JobRequest::Compose(req) => self.compose(id, req, &workspace, logger).await,
            JobRequest::AudioReplace(req) => self.audio_replace(id, req, &workspace, logger).await,
        }
    }

    async fn compose(
        &self,
        id: &JobId,
        req: &ComposeRequest,
        workspace: &JobWorkspace,
        logger: &JobLogger,
    ) -> WorkerResult<String> {
        // Acquire: download everything first, then probe.
        let mut videos = Vec::with_capacity(req.video_urls.len());
        for (i, url) in req.video_urls.iter().enumerate() {
            let stem = format!("video_{}", i);
            videos.push(self.download(url, workspace, &stem, MediaKind::Video).await?);
        }
        let music = match &req.music_url {
            Some(url) => Some(self.download(url, workspace, "music", MediaKind::Audio).await?),
            None => None,
        };
        let overlay_image = match &req.overlay {
            Some(o) => Some(self.download(&o.image_url, workspace, "overlay", MediaKind::Image).await?),
            None => None,
        };

        let mut probed = Vec::with_capacity(videos.len());
        for video in videos {
            probed.push(self.runner.probe_asset(video).await?);
        }
        let videos = probed;
        let music = match music {
            Some(track) => Some(self.runner.probe_asset(track).await?),
            None => None,
        };
        logger.log_progress(&format!("acquired {} video(s)", videos.len()));

        // Condition the music to the length of the final video.
        let conditioned = match &music {
            Some(track) => {
                self.enter_stage(id, JobStage::Conditioning, logger).await;
                let target = total_duration(&videos).ok_or_else(|| {
                    MediaError::graph_build("video duration unknown; cannot fit music to it")
                })?;
                let path = self
                    .conditioner
                    .condition(
                        track,
                        AudioPolicy::MatchDuration(target),
                        workspace.file("music_conditioned.m4a"),
                    )
                    .await?;
                Some(self.runner.probe_asset(MediaAsset::new(path, MediaKind::Audio)).await?)
            }
            None => None,
        };

        self.enter_stage(id, JobStage::Composing, logger).await;
        let executor = self.executor(req.encoding.as_ref());

        let base = if videos.len() >= 2 {
            let graph = self.builder.concat(&videos)?;
            let path = self
                .execute(&executor, &graph, workspace.file("concat.mp4"), logger)
                .await?;
            self.runner.probe_asset(MediaAsset::new(path, MediaKind::Video)).await?
        } else {
            videos
                .into_iter()
                .next()
                .ok_or_else(|| MediaError::graph_build("no input videos"))?
        };

        let overlay_spec = req.overlay.as_ref().map(|o| o.to_spec());
        let overlay = overlay_image.as_ref().zip(overlay_spec.as_ref());

        let final_path = if conditioned.is_some() || overlay.is_some() {
            let graph = self.builder.attach_audio(&base, conditioned.as_ref(), overlay)?;
            self.execute(&executor, &graph, workspace.file("composed.mp4"), logger)
                .await?
        } else {
            base.local_path.clone()
        };

        let published = self.publish(id, JobKind::Compose, &final_path).await?;

        match &req.lipsync {
            Some(lipsync) => {
                self.lip_sync(id, &published.url, lipsync, req.music_url.as_deref(), logger)
                    .await
            }
            None => Ok(published.url),
        }
    }

    async fn audio_replace(
        &self,
        id: &JobId,
        req: &AudioReplaceRequest,
        workspace: &JobWorkspace,
        logger: &JobLogger,
    ) -> WorkerResult<String> {
        let video = self
            .download(&req.video_url, workspace, "video", MediaKind::Video)
            .await?;
        let audio = self
            .download(&req.audio_url, workspace, "audio", MediaKind::Audio)
            .await?;
        let video = self.runner.probe_asset(video).await?;
        let audio = self.runner.probe_asset(audio).await?;

        self.enter_stage(id, JobStage::Composing, logger).await;
        let graph = self.builder.short_form_replace(&video, &audio)?;
        let executor = self.executor(None);
        let output = self
            .execute(&executor, &graph, workspace.file("replaced.mp4"), logger)
            .await?;

        let published = self.publish(id, JobKind::AudioReplace, &output).await?;
        Ok(published.url)
    }

    async fn lip_sync(
        &self,
        id: &JobId,
        video_url: &str,
        lipsync: &LipSyncRequest,
        music_url: Option<&str>,
        logger: &JobLogger,
    ) -> WorkerResult<String> {
        let poller = self.lipsync.as_ref().ok_or(LipSyncError::NotConfigured)?;
        let audio_url = lipsync
            .audio_url
            .as_deref()
            .or(music_url)
            .ok_or_else(|| WorkerError::invalid_request("lip-sync needs an audio_url or a music_url"))?;

        let request = SubmitRequest::new(video_url, audio_url).with_params(lipsync.params.clone());
        let observer = RecordObserver::new(id.clone(), self.registry.clone(), Arc::clone(&self.store));

        logger.log_progress("submitting to lip-sync provider");
        let task = poller.submit_and_wait(&request, &observer).await?;
        logger.log_progress(&format!(
            "lip-sync task {} finished after {} checks",
            task.provider_task_id, task.attempts
        ));

        task.result_url.ok_or_else(|| {
            LipSyncError::InvalidResponse("completed task has no result URL".to_string()).into()
        })
    }

    async fn download(
        &self,
        url: &str,
        workspace: &JobWorkspace,
        stem: &str,
        kind: MediaKind,
    ) -> WorkerResult<MediaAsset> {
        Ok(self.downloader.download(url, workspace.path(), stem, kind).await?)
    }

    async fn enter_stage(&self, id: &JobId, stage: JobStage, logger: &JobLogger) {
        self.registry.update(id, |job| job.advance(stage)).await;
        let update = RecordUpdate::status(stage.record_status().as_str());
        write_record(self.store.as_ref(), id, update).await;
        logger.log_stage(stage);
    }

    async fn publish(
        &self,
        id: &JobId,
        kind: JobKind,
        output: &Path,
    ) -> WorkerResult<PublishedOutput> {
        let update = RecordUpdate::status(RecordStatus::Publishing.as_str());
        write_record(self.store.as_ref(), id, update).await;

        let published = self.publisher.publish(output, kind, id).await?;
        let path = published.path.clone();
        self.registry
            .update(id, |job| job.output_path = Some(path))
            .await;
        Ok(published)
    }

    fn executor(&self, encoding: Option<&EncodingConfig>) -> CompositionExecutor {
        CompositionExecutor::new(self.runner.clone())
            .with_encoding(encoding.cloned().unwrap_or_default())
    }

    async fn execute(
        &self,
        executor: &CompositionExecutor,
        graph: &FilterGraph,
        output: PathBuf,
        logger: &JobLogger,
    ) -> WorkerResult<PathBuf> {
        let topology = graph.topology.as_str();
        let progress_logger = logger.clone();
        let last_quarter = AtomicU64::new(0);

        let path = executor
            .execute_with_progress(graph, output, move |pct| {
                let quarter = (pct.clamp(0.0, 100.0) / 25.0) as u64;
                if last_quarter.fetch_max(quarter, Ordering::Relaxed) < quarter {
                    progress_logger.log_progress(&format!("{} {:.0}%", topology, pct));
                }
            })
            .await?;
        Ok(path)
    }
}

/// Length of the concatenation of `videos`, if every duration is known.
fn total_duration(videos: &[MediaAsset]) -> Option<f64> {
    videos
        .iter()
        .map(|v| v.duration_seconds)
        .sum::<Option<f64>>()
        .filter(|d| d.is_finite() && *d > 0.0)
}

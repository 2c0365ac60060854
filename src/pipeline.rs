//! The per-job step pipeline.
//!
//! A job runs four steps strictly in order: resolve collection, create video,
//! upload, cleanup. Each remote step goes through [`retry::execute`]. The
//! first terminal failure ends the job; later steps never run and the local
//! file is left in place.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::collections::{CollectionCache, Lookup};
use crate::error::{JobError, RemoteError};
use crate::files;
use crate::host::{CollectionId, VideoHost, VideoId};
use crate::job::{Cleanup, Job, JobFailure, JobOutcome, JobReport, JobState, StepKind, StepRecord};
use crate::retry::{self, RetryPolicy, StepOutcome};

type StepFailure = (Option<StepKind>, JobError);

/// Drives single jobs through their steps against a shared [`VideoHost`].
///
/// One pipeline is shared (behind an `Arc`) by every worker in a run, so the
/// collection cache it owns is the run-wide single-flight cache.
pub struct JobPipeline<H> {
    host: Arc<H>,
    collections: CollectionCache,
    policy: RetryPolicy,
    keep_files: bool,
    cancel: CancellationToken,
}

impl<H: VideoHost> JobPipeline<H> {
    pub fn new(host: Arc<H>, policy: RetryPolicy) -> Self {
        Self {
            host,
            collections: CollectionCache::new(),
            policy,
            keep_files: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Leave local files in place after a successful upload.
    pub fn keep_files(mut self, keep: bool) -> Self {
        self.keep_files = keep;
        self
    }

    /// Stop at the next step boundary once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[cfg(test)]
    pub fn collections(&self) -> &CollectionCache {
        &self.collections
    }

    /// Runs every step of `job` and returns its terminal report. Never panics
    /// on an expected failure; all errors become a `Failed` outcome.
    pub async fn run_job(&self, mut job: Job) -> JobReport {
        let started_at = Utc::now();
        job.advance(JobState::Running);

        let mut steps = Vec::new();
        let outcome = match self.execute_steps(&job, &mut steps).await {
            Ok(outcome) => outcome,
            Err((step, err)) => JobOutcome::Failed(JobFailure::new(step, &err)),
        };
        job.advance(outcome.state());

        match &outcome {
            JobOutcome::Uploaded {
                cleanup: Cleanup::Failed { message },
                ..
            } => {
                tracing::warn!(file = %job.file_name, error = %message, "uploaded, but local file was not removed");
            }
            JobOutcome::Uploaded { video_id, .. } => {
                tracing::info!(file = %job.file_name, video = %video_id, "job uploaded");
            }
            JobOutcome::Failed(failure) => {
                tracing::warn!(file = %job.file_name, %failure, "job failed");
            }
            JobOutcome::Cancelled => {}
        }

        JobReport::finish(&job, outcome, steps, started_at)
    }

    async fn execute_steps(
        &self,
        job: &Job,
        steps: &mut Vec<StepRecord>,
    ) -> Result<JobOutcome, StepFailure> {
        let target = job.target().map_err(|err| (None, err))?;

        self.ensure_active(StepKind::ResolveCollection)?;
        let collection = self
            .resolve_collection(target.collection_name(), steps)
            .await?;

        self.ensure_active(StepKind::CreateVideo)?;
        let video = self.create_video(&collection, &target.title(), steps).await?;

        self.ensure_active(StepKind::Upload)?;
        self.upload(&job.path, &video, steps).await?;

        let cleanup = self.cleanup(&job.path, steps).await;
        Ok(JobOutcome::Uploaded {
            video_id: video.0,
            cleanup,
        })
    }

    fn ensure_active(&self, next: StepKind) -> Result<(), StepFailure> {
        if self.cancel.is_cancelled() {
            Err((Some(next), JobError::Cancelled { step: next }))
        } else {
            Ok(())
        }
    }

    async fn resolve_collection(
        &self,
        name: &str,
        steps: &mut Vec<StepRecord>,
    ) -> Result<CollectionId, StepFailure> {
        let host = &*self.host;
        let policy = &self.policy;
        let mut attempts = 0;
        let attempts_slot = &mut attempts;

        let lookup = self
            .collections
            .get_or_resolve(name, move || async move {
                let outcome = retry::execute(
                    StepKind::ResolveCollection,
                    policy,
                    |err: &RemoteError| host.is_retryable(err),
                    move |_| host.resolve_collection(name),
                )
                .await;
                *attempts_slot = outcome.attempts;
                outcome.result
            })
            .await;

        steps.push(StepRecord {
            step: StepKind::ResolveCollection,
            attempts,
            succeeded: lookup.is_ok(),
        });

        match lookup {
            Ok(Lookup::Resolved(id)) => {
                tracing::debug!(collection = name, %id, "collection resolved");
                Ok(id)
            }
            Ok(Lookup::Cached(id)) => {
                tracing::debug!(collection = name, %id, "collection served from cache");
                Ok(id)
            }
            Err(err) => Err((Some(StepKind::ResolveCollection), err.into())),
        }
    }

    async fn create_video(
        &self,
        collection: &CollectionId,
        title: &str,
        steps: &mut Vec<StepRecord>,
    ) -> Result<VideoId, StepFailure> {
        let host = &*self.host;
        let outcome = retry::execute(
            StepKind::CreateVideo,
            &self.policy,
            |err: &RemoteError| host.is_retryable(err),
            move |_| host.create_video(collection, title),
        )
        .await;

        record(steps, StepKind::CreateVideo, &outcome);
        outcome
            .result
            .map_err(|err| (Some(StepKind::CreateVideo), err.into()))
    }

    async fn upload(
        &self,
        path: &Path,
        video: &VideoId,
        steps: &mut Vec<StepRecord>,
    ) -> Result<(), StepFailure> {
        let host = &*self.host;
        let outcome = retry::execute(
            StepKind::Upload,
            &self.policy,
            |err: &JobError| matches!(err, JobError::Remote(remote) if host.is_retryable(remote)),
            move |_| async move {
                // Reopened on every attempt so a retry streams from the start.
                let body = files::open_upload(path)
                    .await
                    .map_err(|source| JobError::LocalIo {
                        path: path.to_path_buf(),
                        source,
                    })?;
                host.upload_video(video, body).await?;
                Ok::<(), JobError>(())
            },
        )
        .await;

        record(steps, StepKind::Upload, &outcome);
        outcome.result.map_err(|err| (Some(StepKind::Upload), err))
    }

    async fn cleanup(&self, path: &Path, steps: &mut Vec<StepRecord>) -> Cleanup {
        if self.keep_files {
            return Cleanup::Kept;
        }

        let cleanup = match files::remove(path).await {
            Ok(()) => Cleanup::Deleted,
            Err(err) => Cleanup::Failed {
                message: err.to_string(),
            },
        };
        steps.push(StepRecord {
            step: StepKind::Cleanup,
            attempts: 1,
            succeeded: cleanup == Cleanup::Deleted,
        });
        cleanup
    }
}

fn record<T, E>(steps: &mut Vec<StepRecord>, step: StepKind, outcome: &StepOutcome<T, E>) {
    steps.push(StepRecord {
        step,
        attempts: outcome.attempts,
        succeeded: outcome.result.is_ok(),
    });
}

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{Job, JobState};
use crate::error::{ErrorKind, JobError};

/// The ordered steps of a job. Step N+1 never starts before step N succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ResolveCollection,
    CreateVideo,
    Upload,
    Cleanup,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::ResolveCollection => write!(f, "resolve collection"),
            StepKind::CreateVideo => write!(f, "create video"),
            StepKind::Upload => write!(f, "upload"),
            StepKind::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Attempt log entry for one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: StepKind,
    /// Remote attempts made. `0` means the result came from the collection cache.
    pub attempts: u32,
    pub succeeded: bool,
}

/// What happened to the local file after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Cleanup {
    Deleted,
    Kept,
    Failed { message: String },
}

/// Error descriptor of a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Step that failed; `None` when the job never reached a step.
    pub step: Option<StepKind>,
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(step: Option<StepKind>, err: &JobError) -> Self {
        Self {
            step,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "{step} failed ({}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    Uploaded { video_id: String, cleanup: Cleanup },
    Failed(JobFailure),
    Cancelled,
}

impl JobOutcome {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Uploaded { .. })
    }

    /// Terminal job state matching this outcome.
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Uploaded { .. } => JobState::Succeeded,
            JobOutcome::Failed(_) => JobState::Failed,
            JobOutcome::Cancelled => JobState::Cancelled,
        }
    }
}

/// Terminal result of one job, produced exactly once per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub index: usize,
    pub file: PathBuf,
    pub state: JobState,
    pub outcome: JobOutcome,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    /// Builds the report for a job that has just reached a terminal state.
    pub fn finish(
        job: &Job,
        outcome: JobOutcome,
        steps: Vec<StepRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::for_file(job.index, job.path.clone(), outcome, steps, started_at)
    }

    /// Report for a job that was never launched.
    pub fn cancelled(job: &Job) -> Self {
        Self::finish(job, JobOutcome::Cancelled, Vec::new(), Utc::now())
    }

    /// Report for a job whose worker died without producing a report.
    pub fn fault(index: usize, file: PathBuf, err: &JobError, started_at: DateTime<Utc>) -> Self {
        let outcome = JobOutcome::Failed(JobFailure::new(None, err));
        Self::for_file(index, file, outcome, Vec::new(), started_at)
    }

    fn for_file(
        index: usize,
        file: PathBuf,
        outcome: JobOutcome,
        steps: Vec<StepRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            index,
            file,
            state: outcome.state(),
            outcome,
            steps,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        }
    }

    /// Attempts recorded for `step`, if it ran.
    #[cfg(test)]
    pub fn attempts(&self, step: StepKind) -> Option<u32> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| record.attempts)
    }

    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;

    #[test]
    fn failure_display_names_the_step() {
        let err = JobError::Remote(RemoteError::Rejected {
            status: 400,
            message: "bad title".into(),
        });
        let failure = JobFailure::new(Some(StepKind::CreateVideo), &err);
        assert_eq!(failure.kind, ErrorKind::FatalRemote);
        assert_eq!(
            failure.to_string(),
            "create video failed (remote error): request rejected (status 400): bad title"
        );
    }

    #[test]
    fn cancelled_report_for_unlaunched_job() {
        let job = Job::new(4, PathBuf::from("anna_1.mp4"), '_');
        let report = JobReport::cancelled(&job);
        assert_eq!(report.index, 4);
        assert_eq!(report.state, JobState::Cancelled);
        assert!(report.steps.is_empty());
        assert!(!report.outcome.is_success());
    }

    #[test]
    fn attempts_lookup() {
        let job = Job::new(0, PathBuf::from("anna_1.mp4"), '_');
        let report = JobReport::finish(
            &job,
            JobOutcome::Uploaded {
                video_id: "v1".into(),
                cleanup: Cleanup::Deleted,
            },
            vec![
                StepRecord {
                    step: StepKind::ResolveCollection,
                    attempts: 0,
                    succeeded: true,
                },
                StepRecord {
                    step: StepKind::Upload,
                    attempts: 3,
                    succeeded: true,
                },
            ],
            Utc::now(),
        );
        assert_eq!(report.state, JobState::Succeeded);
        assert_eq!(report.attempts(StepKind::Upload), Some(3));
        assert_eq!(report.attempts(StepKind::ResolveCollection), Some(0));
        assert_eq!(report.attempts(StepKind::CreateVideo), None);
        assert!(report.duration_ms >= 0);
    }

    #[test]
    fn outcome_serializes_with_tags() {
        let outcome = JobOutcome::Uploaded {
            video_id: "abc".into(),
            cleanup: Cleanup::Failed {
                message: "permission denied".into(),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "uploaded");
        assert_eq!(json["video_id"], "abc");
        assert_eq!(json["cleanup"]["status"], "failed");
    }
}

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Lifecycle of a job.
///
/// Transitions only move forward: `Pending → Running → Succeeded | Failed`,
/// or `Pending → Cancelled` when the run is stopped before the job launches.
/// A retried step stays inside `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    fn can_advance_to(self, next: JobState) -> bool {
        !self.is_terminal()
            && matches!(
                (self, next),
                (JobState::Pending, JobState::Running)
                    | (JobState::Pending, JobState::Cancelled)
                    | (JobState::Running, JobState::Succeeded)
                    | (JobState::Running, JobState::Failed)
            )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Succeeded => write!(f, "SUCCEEDED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Collection and title derived from a file name such as `anna_2024-05-01.mp4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTarget {
    pub model_name: String,
    pub recording_label: String,
}

impl JobTarget {
    /// Splits the file stem on the first `delimiter`. Both halves must be non-empty.
    pub fn parse(file_name: &str, delimiter: char) -> Result<Self, JobError> {
        let malformed = || JobError::MalformedInput {
            file_name: file_name.to_string(),
            delimiter,
        };

        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(malformed)?;
        let (model, label) = stem.split_once(delimiter).ok_or_else(malformed)?;
        if model.is_empty() || label.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            model_name: model.to_string(),
            recording_label: label.to_string(),
        })
    }

    /// Name of the remote collection the video belongs to.
    pub fn collection_name(&self) -> &str {
        &self.model_name
    }

    pub fn title(&self) -> String {
        format!("{} {}", self.model_name, self.recording_label)
    }
}

/// One local file queued for upload.
#[derive(Debug, Clone)]
pub struct Job {
    /// Position in the enumerated queue; also the launch order.
    pub index: usize,
    pub path: PathBuf,
    pub file_name: String,
    pub state: JobState,
    target: Result<JobTarget, char>,
}

impl Job {
    pub fn new(index: usize, path: PathBuf, delimiter: char) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = JobTarget::parse(&file_name, delimiter).map_err(|_| delimiter);

        Self {
            index,
            path,
            file_name,
            state: JobState::Pending,
            target,
        }
    }

    /// Builds the queue from an enumerated directory listing.
    pub fn queue(paths: Vec<PathBuf>, delimiter: char) -> Vec<Job> {
        paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| Job::new(index, path, delimiter))
            .collect()
    }

    /// The parsed collection/title, or the malformed-input error for this file.
    pub fn target(&self) -> Result<&JobTarget, JobError> {
        self.target
            .as_ref()
            .map_err(|&delimiter| JobError::MalformedInput {
                file_name: self.file_name.clone(),
                delimiter,
            })
    }

    /// Moves the job forward. Returns `false` and leaves the state unchanged
    /// if the transition would go backwards or skip `Running`.
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.state.can_advance_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}

//! Progress aggregation for a run.
//!
//! The pool reports each job start and each terminal report to a
//! [`JobObserver`]. Observers are passive: they never influence scheduling.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::error::ErrorKind;
use crate::job::{Cleanup, Job, JobOutcome, JobReport};

/// Receives scheduling events from the worker pool.
pub trait JobObserver: Send + Sync {
    fn on_job_started(&self, _job: &Job) {}

    /// Called exactly once per job, in completion order.
    fn on_job_complete(&self, report: &JobReport);
}

/// Monotonic completion counter, safe to update from several threads.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: usize,
    completed: AtomicUsize,
    uploaded: AtomicUsize,
    cleanup_warnings: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Point-in-time copy of a [`ProgressCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub uploaded: usize,
    pub cleanup_warnings: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Counts one terminal report and returns the new completed count. A job
    /// stopped by cancellation between steps counts as cancelled, not failed.
    pub fn record(&self, report: &JobReport) -> usize {
        match &report.outcome {
            JobOutcome::Uploaded { cleanup, .. } => {
                self.uploaded.fetch_add(1, Ordering::SeqCst);
                if matches!(cleanup, Cleanup::Failed { .. }) {
                    self.cleanup_warnings.fetch_add(1, Ordering::SeqCst);
                }
            }
            JobOutcome::Failed(failure) if failure.kind == ErrorKind::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
            }
            JobOutcome::Failed(_) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            JobOutcome::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed(),
            uploaded: self.uploaded.load(Ordering::SeqCst),
            cleanup_warnings: self.cleanup_warnings.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        }
    }
}

impl JobObserver for ProgressCounter {
    fn on_job_complete(&self, report: &JobReport) {
        self.record(report);
    }
}

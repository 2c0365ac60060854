//! Bounded worker pool.
//!
//! [`WorkerPool::run`] keeps at most `capacity` jobs in flight. It launches
//! `min(capacity, jobs)` workers up front. Each time one finishes it records
//! the report and immediately launches the next queued job. The call returns
//! once the queue is consumed and no worker is left running.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::vec;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::JobError;
use crate::host::VideoHost;
use crate::job::{Job, JobReport, JobState};
use crate::pipeline::JobPipeline;
use crate::progress::{JobObserver, ProgressCounter, ProgressSnapshot};

pub const DEFAULT_CAPACITY: usize = 2;

pub struct WorkerPool {
    capacity: usize,
    cancel: CancellationToken,
}

/// Everything a finished run produced.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// One report per job, in completion order.
    pub reports: Vec<JobReport>,
    pub launched: usize,
    pub peak_in_flight: usize,
    /// The cancellation token fired before the run drained.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn tally(&self) -> ProgressSnapshot {
        let counter = ProgressCounter::new(self.reports.len());
        for report in &self.reports {
            counter.record(report);
        }
        counter.snapshot()
    }
}

/// Scheduler bookkeeping. `in_flight <= capacity` at all times and `cursor`
/// only moves forward.
#[derive(Debug)]
struct PoolState {
    capacity: usize,
    in_flight: usize,
    cursor: usize,
    peak_in_flight: usize,
}

/// Jobs currently owned by a worker, keyed by job index.
struct InFlight {
    file: PathBuf,
    started_at: DateTime<Utc>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl WorkerPool {
    /// A pool running up to `capacity` jobs at once (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop launching queued jobs once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drives every job to a terminal state.
    pub async fn run<H: VideoHost>(
        &self,
        jobs: Vec<Job>,
        pipeline: Arc<JobPipeline<H>>,
        observer: &dyn JobObserver,
    ) -> RunSummary {
        let total = jobs.len();
        let mut queue = jobs.into_iter();
        let mut state = PoolState {
            capacity: self.capacity,
            in_flight: 0,
            cursor: 0,
            peak_in_flight: 0,
        };
        let mut workers: JoinSet<JobReport> = JoinSet::new();
        let mut running: HashMap<usize, InFlight> = HashMap::new();
        let mut reports = Vec::with_capacity(total);

        tracing::debug!(total, capacity = self.capacity, "starting worker pool");
        self.launch_available(
            &mut state,
            &mut queue,
            &mut workers,
            &mut running,
            &pipeline,
            observer,
        );

        while let Some(joined) = workers.join_next().await {
            state.in_flight -= 1;
            match joined {
                Ok(report) => {
                    running.remove(&report.index);
                    observer.on_job_complete(&report);
                    reports.push(report);
                }
                // Only reachable if the runtime aborts the task; the job is
                // reported from `running` once the set drains.
                Err(err) => tracing::error!(error = %err, "worker task did not return"),
            }
            self.launch_available(
                &mut state,
                &mut queue,
                &mut workers,
                &mut running,
                &pipeline,
                observer,
            );
        }

        let mut orphaned: Vec<_> = running.into_iter().collect();
        orphaned.sort_by_key(|(index, _)| *index);
        for (index, job) in orphaned {
            let err = JobError::WorkerFault("worker task was aborted".into());
            let report = JobReport::fault(index, job.file, &err, job.started_at);
            observer.on_job_complete(&report);
            reports.push(report);
        }

        let cancelled = self.cancel.is_cancelled();
        for mut job in queue {
            job.advance(JobState::Cancelled);
            let report = JobReport::cancelled(&job);
            observer.on_job_complete(&report);
            reports.push(report);
        }

        debug_assert_eq!(state.in_flight, 0);
        tracing::debug!(
            launched = state.cursor,
            peak_in_flight = state.peak_in_flight,
            "worker pool drained"
        );

        RunSummary {
            reports,
            launched: state.cursor,
            peak_in_flight: state.peak_in_flight,
            cancelled,
        }
    }

    fn launch_available<H: VideoHost>(
        &self,
        state: &mut PoolState,
        queue: &mut vec::IntoIter<Job>,
        workers: &mut JoinSet<JobReport>,
        running: &mut HashMap<usize, InFlight>,
        pipeline: &Arc<JobPipeline<H>>,
        observer: &dyn JobObserver,
    ) {
        while state.in_flight < state.capacity {
            if self.cancel.is_cancelled() {
                tracing::debug!(remaining = queue.len(), "cancelled; not launching more jobs");
                return;
            }
            let Some(job) = queue.next() else {
                return;
            };

            state.cursor += 1;
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
            debug_assert!(state.in_flight <= state.capacity);

            observer.on_job_started(&job);
            let started_at = Utc::now();
            running.insert(
                job.index,
                InFlight {
                    file: job.path.clone(),
                    started_at,
                },
            );

            let span = tracing::info_span!("job", index = job.index, file = %job.file_name);
            let (index, file) = (job.index, job.path.clone());
            let pipeline = pipeline.clone();
            workers.spawn(
                async move {
                    AssertUnwindSafe(pipeline.run_job(job))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| {
                            let err = JobError::WorkerFault(panic_message(payload));
                            tracing::error!(error = %err, "worker panicked");
                            JobReport::fault(index, file, &err, started_at)
                        })
                }
                .instrument(span),
            );
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

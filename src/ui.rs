//! Terminal output: a progress bar plus one coloured line per finished job.
//!
//! Uses `indicatif` for the bar and `console` for colours. Per-job lines are
//! printed through the bar so they do not tear it.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::ErrorKind;
use crate::job::{Cleanup, Job, JobOutcome, JobReport};
use crate::pool::RunSummary;
use crate::progress::{JobObserver, ProgressCounter};

const BAR_TEMPLATE: &str = "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Progress observer for a run in the terminal.
///
/// Counts completions with a [`ProgressCounter`] and shows them on a bar.
/// Uploads are green, cleanup warnings yellow and failures red.
pub struct TerminalProgress {
    counter: ProgressCounter,
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl TerminalProgress {
    /// Creates the bar for `total` jobs. With `show_bar` off (verbose runs)
    /// only the per-job lines are printed.
    pub fn new(total: usize, show_bar: bool) -> Self {
        let pb = if show_bar {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        match ProgressStyle::with_template(BAR_TEMPLATE) {
            Ok(style) => pb.set_style(style.progress_chars("=> ")),
            Err(err) => tracing::debug!(error = %err, "falling back to default bar style"),
        }
        if show_bar {
            pb.enable_steady_tick(Duration::from_millis(100));
        }

        Self {
            counter: ProgressCounter::new(total),
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    #[cfg(test)]
    pub fn counter(&self) -> &ProgressCounter {
        &self.counter
    }

    /// Clears the bar and prints the run totals.
    pub fn finish(&self, summary: &RunSummary) {
        self.pb.finish_and_clear();
        let tally = summary.tally();

        println!();
        println!(
            "{} {}/{} uploaded",
            self.green.apply_to("✓"),
            tally.uploaded,
            tally.total
        );
        if tally.cleanup_warnings > 0 {
            println!(
                "{} {} uploaded but not cleaned up",
                self.yellow.apply_to("⚠"),
                tally.cleanup_warnings
            );
        }
        if tally.failed > 0 {
            println!("{} {} failed", self.red.apply_to("✗"), tally.failed);
        }
        if tally.cancelled > 0 {
            println!(
                "{} {} cancelled",
                self.dim.apply_to("-"),
                tally.cancelled
            );
        }
    }

    fn line(&self, report: &JobReport) -> String {
        let file = report.file_name();
        match &report.outcome {
            JobOutcome::Uploaded { video_id, cleanup } => match cleanup {
                Cleanup::Deleted => format!("  {} {file} → {video_id}", self.green.apply_to("✓")),
                Cleanup::Kept => format!(
                    "  {} {file} → {video_id} {}",
                    self.green.apply_to("✓"),
                    self.dim.apply_to("(kept local file)")
                ),
                Cleanup::Failed { message } => format!(
                    "  {} {file} → {video_id} (cleanup failed: {message})",
                    self.yellow.apply_to("⚠")
                ),
            },
            JobOutcome::Failed(failure) if failure.kind == ErrorKind::Cancelled => {
                format!("  {} {file}: {failure}", self.dim.apply_to("-"))
            }
            JobOutcome::Failed(failure) => {
                format!("  {} {file}: {failure}", self.red.apply_to("✗"))
            }
            JobOutcome::Cancelled => format!("  {} {file} cancelled", self.dim.apply_to("-")),
        }
    }

    fn emit(&self, line: String) {
        // A hidden bar swallows println.
        if self.pb.is_hidden() {
            println!("{line}");
        } else {
            self.pb.println(line);
        }
    }
}

impl JobObserver for TerminalProgress {
    fn on_job_started(&self, job: &Job) {
        self.pb.set_message(job.file_name.clone());
    }

    fn on_job_complete(&self, report: &JobReport) {
        let done = self.counter.record(report);
        self.pb.set_position(done as u64);
        self.emit(self.line(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::Utc;
    use console::strip_ansi_codes;

    use crate::error::{JobError, RemoteError};
    use crate::job::{JobFailure, StepKind};

    fn report(outcome: JobOutcome) -> JobReport {
        let job = Job::new(0, PathBuf::from("/videos/anna_1.mp4"), '_');
        JobReport::finish(&job, outcome, Vec::new(), Utc::now())
    }

    fn plain(progress: &TerminalProgress, outcome: JobOutcome) -> String {
        strip_ansi_codes(&progress.line(&report(outcome))).into_owned()
    }

    #[test]
    fn lines_describe_each_outcome() {
        let progress = TerminalProgress::new(1, false);

        assert_eq!(
            plain(
                &progress,
                JobOutcome::Uploaded {
                    video_id: "v-1".into(),
                    cleanup: Cleanup::Deleted
                }
            ),
            "  ✓ anna_1.mp4 → v-1"
        );
        assert_eq!(
            plain(
                &progress,
                JobOutcome::Uploaded {
                    video_id: "v-1".into(),
                    cleanup: Cleanup::Kept
                }
            ),
            "  ✓ anna_1.mp4 → v-1 (kept local file)"
        );
        assert_eq!(
            plain(
                &progress,
                JobOutcome::Uploaded {
                    video_id: "v-1".into(),
                    cleanup: Cleanup::Failed {
                        message: "busy".into()
                    }
                }
            ),
            "  ⚠ anna_1.mp4 → v-1 (cleanup failed: busy)"
        );
        assert_eq!(
            plain(&progress, JobOutcome::Cancelled),
            "  - anna_1.mp4 cancelled"
        );
    }

    #[test]
    fn failure_line_names_step_and_error() {
        let progress = TerminalProgress::new(1, false);
        let err = JobError::Remote(RemoteError::Rejected {
            status: 401,
            message: "unauthorized".into(),
        });
        let line = plain(
            &progress,
            JobOutcome::Failed(JobFailure::new(Some(StepKind::Upload), &err)),
        );
        assert!(line.starts_with("  ✗ anna_1.mp4: upload failed"));
        assert!(line.contains("unauthorized"));
    }

    #[test]
    fn cancelled_step_is_not_shown_as_an_error() {
        let progress = TerminalProgress::new(1, false);
        let err = JobError::Cancelled {
            step: StepKind::Upload,
        };
        let line = plain(
            &progress,
            JobOutcome::Failed(JobFailure::new(Some(StepKind::Upload), &err)),
        );
        assert!(line.starts_with("  - anna_1.mp4: upload failed (cancelled)"));
    }

    #[test]
    fn completions_feed_the_counter() {
        let progress = TerminalProgress::new(2, false);
        progress.on_job_complete(&report(JobOutcome::Cancelled));
        progress.on_job_complete(&report(JobOutcome::Uploaded {
            video_id: "v-2".into(),
            cleanup: Cleanup::Deleted,
        }));

        let snapshot = progress.counter().snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.uploaded, 1);
        assert_eq!(snapshot.cancelled, 1);
    }
}

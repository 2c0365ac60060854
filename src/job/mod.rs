mod model;
mod report;

pub use model::{Job, JobState};
pub use report::{Cleanup, JobFailure, JobOutcome, JobReport, StepKind, StepRecord};

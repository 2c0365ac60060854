//! Error taxonomy for the upload pipeline.
//!
//! [`RemoteError`] is what a [`VideoHost`](crate::host::VideoHost) reports;
//! [`JobError`] is what a single job can end with. Both derive `Display` and
//! `Error` via `thiserror`. [`ErrorKind`] is the serialisable classification
//! stored in job reports.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::StepKind;

/// Failures reported by the remote video host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Server-side failure expected to clear up on retry (HTTP 5xx).
    #[error("transient server error (status {status}): {message}")]
    Transient { status: u16, message: String },

    /// Any other non-success response (auth failure, bad request, ...).
    #[error("request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transport-level failure: DNS, refused connection, reset stream.
    #[error("network error: {0}")]
    Network(String),

    /// The response arrived but lacks a field the pipeline needs.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    /// Whether retrying the same call unchanged may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Transient { .. } => ErrorKind::TransientRemote,
            RemoteError::Rejected { .. } | RemoteError::Network(_) => ErrorKind::FatalRemote,
            RemoteError::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::MalformedResponse(err.to_string())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

/// Terminal error of a single job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("malformed file name `{file_name}`: expected <model>{delimiter}<label>")]
    MalformedInput { file_name: String, delimiter: char },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled before {step}")]
    Cancelled { step: StepKind },

    /// The worker task died (panicked or was aborted) instead of returning.
    #[error("worker fault: {0}")]
    WorkerFault(String),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::MalformedInput { .. } => ErrorKind::MalformedInput,
            JobError::Remote(err) => err.kind(),
            JobError::LocalIo { .. } => ErrorKind::LocalIo,
            JobError::Cancelled { .. } => ErrorKind::Cancelled,
            JobError::WorkerFault(_) => ErrorKind::WorkerFault,
        }
    }
}

/// Classifies a job failure for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    TransientRemote,
    FatalRemote,
    MalformedResponse,
    MalformedInput,
    LocalIo,
    Cancelled,
    WorkerFault,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::TransientRemote => "transient remote error",
            ErrorKind::FatalRemote => "remote error",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::MalformedInput => "malformed input",
            ErrorKind::LocalIo => "local I/O error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::WorkerFault => "worker fault",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        let transient = RemoteError::Transient {
            status: 500,
            message: "boom".into(),
        };
        let rejected = RemoteError::Rejected {
            status: 401,
            message: "bad key".into(),
        };
        assert!(transient.is_transient());
        assert!(!rejected.is_transient());
        assert!(!RemoteError::Network("reset".into()).is_transient());
        assert!(!RemoteError::MalformedResponse("no guid".into()).is_transient());
    }

    #[test]
    fn remote_error_display() {
        let err = RemoteError::Rejected {
            status: 401,
            message: "Invalid AccessKey".into(),
        };
        assert_eq!(
            err.to_string(),
            "request rejected (status 401): Invalid AccessKey"
        );
    }

    #[test]
    fn job_error_kinds() {
        let malformed = JobError::MalformedInput {
            file_name: "nodelimiter.mp4".into(),
            delimiter: '_',
        };
        assert_eq!(malformed.kind(), ErrorKind::MalformedInput);
        assert_eq!(
            malformed.to_string(),
            "malformed file name `nodelimiter.mp4`: expected <model>_<label>"
        );

        let remote: JobError = RemoteError::Network("reset".into()).into();
        assert_eq!(remote.kind(), ErrorKind::FatalRemote);

        let cancelled = JobError::Cancelled {
            step: StepKind::Upload,
        };
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RemoteError>();
        assert_send_sync::<JobError>();
    }
}

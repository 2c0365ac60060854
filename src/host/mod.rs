//! Interface to the remote video host.
//!
//! The pipeline only talks to the host through [`VideoHost`]: resolve a
//! collection by name, create a video record inside it, and stream bytes into
//! that record. The concrete implementation lives in [`crate::bunny`].

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::error::RemoteError;

#[cfg(test)]
pub mod fake;

/// Opaque handle of a remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionId(pub String);

/// Opaque handle of a remote video record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(pub String);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// A streamed upload payload. The bytes are pulled lazily; nothing is buffered
/// beyond the reader's chunk size.
pub struct UploadBody {
    pub len: u64,
    pub stream: ByteStream,
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadBody").field("len", &self.len).finish()
    }
}

/// Remote operations the upload pipeline depends on.
pub trait VideoHost: Send + Sync + 'static {
    /// Looks up a collection by name, creating it when absent.
    fn resolve_collection(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<CollectionId, RemoteError>> + Send;

    /// Creates a video record and returns its handle.
    fn create_video(
        &self,
        collection: &CollectionId,
        title: &str,
    ) -> impl Future<Output = Result<VideoId, RemoteError>> + Send;

    /// Streams `body` into the video record.
    fn upload_video(
        &self,
        video: &VideoId,
        body: UploadBody,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Whether a failed call is worth repeating unchanged.
    fn is_retryable(&self, err: &RemoteError) -> bool {
        err.is_transient()
    }
}

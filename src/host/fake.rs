//! In-memory [`VideoHost`] used by the pipeline and pool tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;

use super::{CollectionId, UploadBody, VideoHost, VideoId};
use crate::error::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Resolve,
    CreateVideo,
    Upload,
}

#[derive(Default)]
pub struct FakeHost {
    /// Pause inside each call; in `resolve_collection` it sits between the
    /// lookup and the create, which is where unguarded callers would race.
    delay: Duration,
    omit_video_id: bool,
    panic_on_title: Option<String>,
    after_upload: Option<Box<dyn Fn() + Send + Sync>>,
    collections: Mutex<HashMap<String, CollectionId>>,
    failures: Mutex<HashMap<Op, VecDeque<RemoteError>>>,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(VideoId, Vec<u8>)>>,
    next_id: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub collection_creates: AtomicUsize,
    pub video_creates: AtomicUsize,
    pub upload_calls: AtomicUsize,
    active_uploads: AtomicUsize,
    peak_uploads: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Makes `create_video` answer without a handle.
    pub fn omitting_video_id(mut self) -> Self {
        self.omit_video_id = true;
        self
    }

    /// Panics inside `create_video` for `title`, simulating a crashed worker.
    pub fn panicking_on(mut self, title: &str) -> Self {
        self.panic_on_title = Some(title.to_string());
        self
    }

    /// Runs `hook` after every successful upload.
    pub fn after_upload(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_upload = Some(Box::new(hook));
        self
    }

    /// Queues errors returned by the next calls to `op`, in order.
    pub fn fail(&self, op: Op, errors: impl IntoIterator<Item = RemoteError>) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .extend(errors);
    }

    pub fn seed_collection(&self, name: &str, id: &str) {
        self.collections
            .lock()
            .unwrap()
            .insert(name.to_string(), CollectionId(id.to_string()));
    }

    pub fn collection(&self, name: &str) -> Option<CollectionId> {
        self.collections.lock().unwrap().get(name).cloned()
    }

    /// Every call in the order it was made, e.g. `create_video:anna 1`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(VideoId, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn peak_uploads(&self) -> usize {
        self.peak_uploads.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn scripted_failure(&self, op: Op) -> Option<RemoteError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(|queue| queue.pop_front())
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub fn transient() -> RemoteError {
    RemoteError::Transient {
        status: 500,
        message: "internal server error".into(),
    }
}

pub fn rejected() -> RemoteError {
    RemoteError::Rejected {
        status: 401,
        message: "unauthorized".into(),
    }
}

impl VideoHost for FakeHost {
    async fn resolve_collection(&self, name: &str) -> Result<CollectionId, RemoteError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.record(format!("resolve:{name}"));
        if let Some(err) = self.scripted_failure(Op::Resolve) {
            return Err(err);
        }

        let existing = self.collections.lock().unwrap().get(name).cloned();
        if let Some(id) = existing {
            return Ok(id);
        }

        tokio::time::sleep(self.delay).await;
        self.collection_creates.fetch_add(1, Ordering::SeqCst);
        let id = CollectionId(self.fresh_id("collection"));
        self.collections
            .lock()
            .unwrap()
            .insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn create_video(
        &self,
        _collection: &CollectionId,
        title: &str,
    ) -> Result<VideoId, RemoteError> {
        self.record(format!("create_video:{title}"));
        if self.panic_on_title.as_deref() == Some(title) {
            panic!("simulated worker crash on {title}");
        }
        if let Some(err) = self.scripted_failure(Op::CreateVideo) {
            return Err(err);
        }
        if self.omit_video_id {
            return Err(RemoteError::MalformedResponse(
                "video response has no guid".into(),
            ));
        }
        self.video_creates.fetch_add(1, Ordering::SeqCst);
        Ok(VideoId(self.fresh_id("video")))
    }

    async fn upload_video(&self, video: &VideoId, mut body: UploadBody) -> Result<(), RemoteError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.record(format!("upload:{video}"));
        if let Some(err) = self.scripted_failure(Op::Upload) {
            return Err(err);
        }

        let active = self.active_uploads.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_uploads.fetch_max(active, Ordering::SeqCst);

        let mut bytes = Vec::new();
        while let Some(chunk) = body.stream.next().await {
            let chunk = chunk.map_err(|e| RemoteError::Network(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
        }
        tokio::time::sleep(self.delay).await;

        self.active_uploads.fetch_sub(1, Ordering::SeqCst);
        self.uploads.lock().unwrap().push((video.clone(), bytes));
        if let Some(hook) = &self.after_upload {
            hook();
        }
        Ok(())
    }
}

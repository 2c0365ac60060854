//! Run-scoped cache of collection handles with single-flight resolution.
//!
//! Each collection name maps to a [`OnceCell`]. The first job to reference a
//! name runs the resolver; jobs arriving while it is in flight wait on the
//! same cell and observe the same handle. A failed resolution leaves the cell
//! empty, so the next waiter (or a later job) tries again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::host::CollectionId;

#[derive(Debug, Default)]
pub struct CollectionCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<CollectionId>>>>,
}

/// How a cached lookup was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// This caller ran the resolver.
    Resolved(CollectionId),
    /// Another caller resolved it, earlier or concurrently.
    Cached(CollectionId),
}

impl Lookup {
    #[cfg(test)]
    pub fn id(&self) -> &CollectionId {
        match self {
            Lookup::Resolved(id) | Lookup::Cached(id) => id,
        }
    }
}

impl CollectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `name`, running `resolve` only if no other
    /// caller has resolved or is resolving it.
    pub async fn get_or_resolve<F, Fut, E>(&self, name: &str, resolve: F) -> Result<Lookup, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CollectionId, E>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(name.to_string()).or_default().clone()
        };

        let mut ran = false;
        let id = cell
            .get_or_try_init(|| {
                ran = true;
                resolve()
            })
            .await?;

        Ok(if ran {
            Lookup::Resolved(id.clone())
        } else {
            Lookup::Cached(id.clone())
        })
    }

    #[cfg(test)]
    pub async fn get(&self, name: &str) -> Option<CollectionId> {
        let entries = self.entries.lock().await;
        entries.get(name).and_then(|cell| cell.get().cloned())
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }
}

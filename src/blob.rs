//! Retained byte buffers behind opaque handles.
//!
//! Every decoded file keeps its raw bytes in a [`BlobStore`] so they can be
//! exported or replayed later. A [`BlobHandle`] is created once per data file
//! and released exactly once: [`BlobHandle::release`] consumes it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Serialize, Serializer};

/// Identifier of a retained buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(u64);

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:tracescope/{}", self.0)
    }
}

impl Serialize for BlobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Provider of retained buffers.
pub trait BlobStore: Send + Sync {
    /// Retain `bytes` and return a fresh id.
    fn create(&self, bytes: Vec<u8>, mime: &'static str) -> BlobId;

    /// Drop the buffer behind `id`. Unknown ids are ignored.
    fn release(&self, id: BlobId);
}

/// Owned reference to one retained buffer.
pub struct BlobHandle {
    id: BlobId,
    mime: &'static str,
    store: Arc<dyn BlobStore>,
}

impl BlobHandle {
    /// Retain `bytes` in `store`.
    pub fn create(store: &Arc<dyn BlobStore>, bytes: Vec<u8>, mime: &'static str) -> Self {
        let id = store.create(bytes, mime);
        Self {
            id,
            mime,
            store: Arc::clone(store),
        }
    }

    pub fn id(&self) -> BlobId {
        self.id
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn release(self) {
        self.store.release(self.id);
    }
}

impl fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobHandle")
            .field("id", &self.id)
            .field("mime", &self.mime)
            .finish_non_exhaustive()
    }
}

impl Serialize for BlobHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

/// A retained buffer and its MIME type.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub mime: &'static str,
}

/// Process-local [`BlobStore`].
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<BlobId, Blob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer behind `id`, unless it has been released.
    pub fn get(&self, id: BlobId) -> Option<Blob> {
        self.lock().get(&id).cloned()
    }

    /// Number of buffers currently retained.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BlobId, Blob>> {
        // The map stays consistent even if a holder panicked.
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlobStore for InMemoryBlobStore {
    fn create(&self, bytes: Vec<u8>, mime: &'static str) -> BlobId {
        let id = BlobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let blob = Blob {
            bytes: bytes.into(),
            mime,
        };
        self.lock().insert(id, blob);
        id
    }

    fn release(&self, id: BlobId) {
        self.lock().remove(&id);
    }
}

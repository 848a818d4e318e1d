//! Shared accumulation buffer
//!
//! The single piece of mutable state shared by every inbound connection and
//! the flush scheduler. Callers never see the lock: the buffer is only
//! reachable through [`SharedBuffer::append`] and
//! [`SharedBuffer::snapshot_and_clear`], each of which holds the lock for
//! exactly its own step.

use bytes::{Bytes, BytesMut};
use tokio::sync::Mutex;

/// Growable byte accumulator guarded by a mutex
#[derive(Debug, Default)]
pub struct SharedBuffer {
    data: Mutex<BytesMut>,
}

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes at the end of the buffer
    pub async fn append(&self, bytes: &[u8]) {
        self.data.lock().await.extend_from_slice(bytes);
    }

    /// Take the current contents and leave the buffer empty, as one step
    ///
    /// The returned `Bytes` shares the allocation with no one else, so
    /// handing clones to several writers does not copy the payload.
    pub async fn snapshot_and_clear(&self) -> Bytes {
        self.data.lock().await.split().freeze()
    }

    /// Snapshot and clear only when `ready` accepts the current length
    ///
    /// The decision and the snapshot happen under the same lock, so no
    /// append can slip between them.
    pub(crate) async fn snapshot_if<F>(&self, ready: F) -> Option<Bytes>
    where
        F: FnOnce(usize) -> bool,
    {
        let mut data = self.data.lock().await;
        if ready(data.len()) {
            Some(data.split().freeze())
        } else {
            None
        }
    }
}

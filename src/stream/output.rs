//! Output stream lifecycle.
//!
//! An `OutputStream` is a local handle the client created; it carries no
//! reference back to the tunnel — sending blobs/ends is the caller's
//! job, using the index this manager hands out. This manager only
//! tracks which indices are live and routes inbound `ack`s to whoever is
//! waiting on one.

use std::collections::HashMap;

use crate::index_pool::IndexPool;
use crate::status::Status;

type AckCallback = Box<dyn FnMut(&Status) + Send>;

struct OutputEntry {
    on_ack: AckCallback,
}

/// Tracks output streams the client itself opened.
#[derive(Default)]
pub struct OutputManager {
    pool: IndexPool,
    streams: HashMap<u32, OutputEntry>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh stream index and registers `on_ack` to be called
    /// for every `ack` the server sends back for it.
    pub fn create_stream(&mut self, on_ack: impl FnMut(&Status) + Send + 'static) -> u32 {
        let index = self.pool.acquire();
        self.streams.insert(index, OutputEntry { on_ack: Box::new(on_ack) });
        index
    }

    pub fn is_open(&self, index: u32) -> bool {
        self.streams.contains_key(&index)
    }

    /// Delivers an `ack(stream, msg, code)` to the matching stream. Any
    /// non-success code frees the stream; returns `true` if the stream
    /// was known.
    pub fn on_ack(&mut self, index: u32, status: &Status) -> bool {
        let Some(entry) = self.streams.get_mut(&index) else {
            return false;
        };
        (entry.on_ack)(status);
        if !status.code.is_success() {
            self.streams.remove(&index);
            self.pool.release(index);
        }
        true
    }

    /// Explicitly closes a stream the caller ended locally. An
    /// `OutputStream` is normally freed once its `end` is acked, but if
    /// no ack is expected at all, callers may free it eagerly via this
    /// method instead.
    pub fn close(&mut self, index: u32) {
        if self.streams.remove(&index).is_some() {
            self.pool.release(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;
    use std::sync::{Arc, Mutex};

    #[test]
    fn ack_delivers_to_callback() {
        let mut mgr = OutputManager::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let idx = mgr.create_stream(move |status| seen2.lock().unwrap().push(status.clone()));

        let ok = Status::success();
        assert!(mgr.on_ack(idx, &ok));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn non_success_ack_frees_the_stream() {
        let mut mgr = OutputManager::new();
        let idx = mgr.create_stream(|_| {});
        let err = Status::new(StatusCode::ResourceClosed, "gone");
        assert!(mgr.on_ack(idx, &err));
        assert!(!mgr.is_open(idx));

        // The freed index is recycled.
        let new_idx = mgr.create_stream(|_| {});
        assert_eq!(new_idx, idx);
    }

    #[test]
    fn success_ack_keeps_the_stream_open() {
        let mut mgr = OutputManager::new();
        let idx = mgr.create_stream(|_| {});
        assert!(mgr.on_ack(idx, &Status::success()));
        assert!(mgr.is_open(idx));
    }

    #[test]
    fn ack_for_unknown_stream_is_ignored() {
        let mut mgr = OutputManager::new();
        assert!(!mgr.on_ack(99, &Status::success()));
    }
}

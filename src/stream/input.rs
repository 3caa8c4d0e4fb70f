//! Input stream lifecycle.
//!
//! Indices for input streams are chosen by the server (carried in the
//! allocating instruction itself), so unlike [`super::output`] this
//! manager needs no [`crate::index_pool::IndexPool`] — it only tracks
//! which server-given indices are currently live.

use std::collections::HashMap;

type BlobCallback = Box<dyn FnMut(&str) + Send>;
type EndCallback = Box<dyn FnOnce() + Send>;

struct InputEntry {
    on_blob: BlobCallback,
    on_end: EndCallback,
}

/// Tracks input streams opened by the server.
#[derive(Default)]
pub struct InputManager {
    streams: HashMap<i64, InputEntry>,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly allocated input stream. The allocating
    /// instruction's handler is expected to have already notified the
    /// relevant sink (audio/clipboard/file/...) of the stream's metadata;
    /// this manager only owns blob/end routing.
    pub fn open(
        &mut self,
        index: i64,
        on_blob: impl FnMut(&str) + Send + 'static,
        on_end: impl FnOnce() + Send + 'static,
    ) {
        self.streams.insert(
            index,
            InputEntry {
                on_blob: Box::new(on_blob),
                on_end: Box::new(on_end),
            },
        );
    }

    pub fn is_open(&self, index: i64) -> bool {
        self.streams.contains_key(&index)
    }

    /// Delivers a `blob` to the stream's consumer. Blobs on an unknown
    /// (already-ended, or never-opened) stream are silently dropped.
    /// Returns `true` if delivered.
    pub fn blob(&mut self, index: i64, data: &str) -> bool {
        let Some(entry) = self.streams.get_mut(&index) else {
            return false;
        };
        (entry.on_blob)(data);
        true
    }

    /// Delivers `end`, then drops and frees the stream. Returns `true` if
    /// the stream was known.
    pub fn end(&mut self, index: i64) -> bool {
        let Some(entry) = self.streams.remove(&index) else {
            return false;
        };
        (entry.on_end)();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn blobs_then_end_arrive_in_order() {
        let mut mgr = InputManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let blob_log = log.clone();
        let end_log = log.clone();
        mgr.open(
            3,
            move |data| blob_log.lock().unwrap().push(format!("blob:{data}")),
            move || end_log.lock().unwrap().push("end".to_string()),
        );

        assert!(mgr.blob(3, "YWJj"));
        assert!(mgr.blob(3, "ZGVm"));
        assert!(mgr.end(3));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["blob:YWJj".to_string(), "blob:ZGVm".to_string(), "end".to_string()]
        );
        assert!(!mgr.is_open(3));
    }

    #[test]
    fn end_releases_the_index_for_reuse_by_the_caller() {
        let mut mgr = InputManager::new();
        mgr.open(3, |_| {}, || {});
        assert!(mgr.end(3));
        // A later allocating instruction may reuse index 3; the manager
        // places no further claim on it.
        mgr.open(3, |_| {}, || {});
        assert!(mgr.is_open(3));
    }

    #[test]
    fn blob_on_unknown_stream_is_ignored_not_panicking() {
        let mut mgr = InputManager::new();
        assert!(!mgr.blob(7, "xx"));
        assert!(!mgr.end(7));
    }
}

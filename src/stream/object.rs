//! Object manager: server-exposed named collections of streams,
//! addressed via `get`/`body`.

use std::collections::{HashMap, VecDeque};

use crate::status::{Status, StatusCode};

/// A single in-flight `get(object, name)` awaiting its `body` response.
struct PendingGet {
    name: String,
    respond: Box<dyn FnOnce(Result<BodyResponse, Status>) + Send>,
}

/// The payload of a `body` instruction resolving a `get` request.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyResponse {
    pub stream: i64,
    pub mimetype: String,
}

struct ObjectEntry {
    pending: VecDeque<PendingGet>,
}

/// Tracks live objects allocated by the server's `filesystem` instruction.
#[derive(Default)]
pub struct ObjectManager {
    objects: HashMap<i64, ObjectEntry>,
}

impl ObjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, object: i64) {
        self.objects.entry(object).or_insert_with(|| ObjectEntry {
            pending: VecDeque::new(),
        });
    }

    pub fn is_defined(&self, object: i64) -> bool {
        self.objects.contains_key(&object)
    }

    /// Registers a pending request for `name` on `object`, to be resolved
    /// by a matching future `body` instruction.
    pub fn request(
        &mut self,
        object: i64,
        name: &str,
        respond: impl FnOnce(Result<BodyResponse, Status>) + Send + 'static,
    ) {
        let entry = self.objects.entry(object).or_insert_with(|| ObjectEntry {
            pending: VecDeque::new(),
        });
        entry.pending.push_back(PendingGet {
            name: name.to_string(),
            respond: Box::new(respond),
        });
    }

    /// Resolves the earliest pending request for `(object, name)`
    /// matching an inbound `body`, FIFO per object. Returns `true` if a
    /// request was matched.
    pub fn body(&mut self, object: i64, name: &str, response: BodyResponse) -> bool {
        let Some(entry) = self.objects.get_mut(&object) else {
            return false;
        };
        let Some(pos) = entry.pending.iter().position(|p| p.name == name) else {
            return false;
        };
        let pending = entry.pending.remove(pos).unwrap();
        (pending.respond)(Ok(response));
        true
    }

    /// Releases the object and fails every pending request with
    /// `RESOURCE_CLOSED`.
    pub fn undefine(&mut self, object: i64) -> bool {
        let Some(entry) = self.objects.remove(&object) else {
            return false;
        };
        for pending in entry.pending {
            (pending.respond)(Err(Status::new(StatusCode::ResourceClosed, "object undefined")));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn resolves_get_by_matching_name_fifo() {
        let mut mgr = ObjectManager::new();
        mgr.define(1);

        let results = Arc::new(Mutex::new(Vec::new()));
        let r1 = results.clone();
        let r2 = results.clone();
        mgr.request(1, "index.html", move |res| r1.lock().unwrap().push(res));
        mgr.request(1, "style.css", move |res| r2.lock().unwrap().push(res));

        assert!(mgr.body(1, "style.css", BodyResponse { stream: 9, mimetype: "text/css".into() }));
        assert!(mgr.body(1, "index.html", BodyResponse { stream: 8, mimetype: "text/html".into() }));

        let got = results.lock().unwrap();
        assert_eq!(got.len(), 2);
        assert!(got[0].as_ref().unwrap().stream == 9);
        assert!(got[1].as_ref().unwrap().stream == 8);
    }

    #[test]
    fn undefine_fails_pending_requests() {
        let mut mgr = ObjectManager::new();
        mgr.define(1);

        let result = Arc::new(Mutex::new(None));
        let r = result.clone();
        mgr.request(1, "foo", move |res| *r.lock().unwrap() = Some(res));

        assert!(mgr.undefine(1));
        let got = result.lock().unwrap().take().unwrap();
        assert_eq!(got.unwrap_err().code, StatusCode::ResourceClosed);
        assert!(!mgr.is_defined(1));
    }

    #[test]
    fn body_with_no_matching_request_is_ignored() {
        let mut mgr = ObjectManager::new();
        mgr.define(1);
        assert!(!mgr.body(1, "nope", BodyResponse { stream: 1, mimetype: "x".into() }));
    }
}

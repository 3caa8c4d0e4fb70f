//! Opcode dispatch: at most one typed handler per opcode plus a single
//! generic listener, invoked synchronously on every dispatch.

use std::collections::HashMap;

use crate::wire::RawInstruction;

type Handler = Box<dyn FnMut(&[String]) + Send>;
type Listener = Box<dyn FnMut(&str, &[String]) + Send>;

/// Demultiplexes decoded instructions to per-opcode handlers.
///
/// Registering a handler for an opcode that already has one replaces it.
/// `dispatch` is synchronous: a handler must not assume later dispatches
/// are deferred past its return.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<String, Handler>,
    listener: Option<Listener>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `opcode`, replacing any prior handler.
    pub fn add_instruction_handler(
        &mut self,
        opcode: impl Into<String>,
        handler: impl FnMut(&[String]) + Send + 'static,
    ) {
        self.handlers.insert(opcode.into(), Box::new(handler));
    }

    pub fn remove_instruction_handler(&mut self, opcode: &str) {
        self.handlers.remove(opcode);
    }

    /// Sets the generic listener invoked for every dispatched
    /// instruction, in addition to any opcode-specific handler.
    pub fn set_listener(&mut self, listener: impl FnMut(&str, &[String]) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn dispatch(&mut self, instruction: &RawInstruction) {
        if let Some(handler) = self.handlers.get_mut(&instruction.opcode) {
            handler(&instruction.params);
        }
        if let Some(listener) = &mut self.listener {
            listener(&instruction.opcode, &instruction.params);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn raw(opcode: &str, params: &[&str]) -> RawInstruction {
        RawInstruction {
            opcode: opcode.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn dispatches_to_matching_handler_only() {
        let mut router = Router::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        router.add_instruction_handler("sync", move |params| {
            seen2.lock().unwrap().push(params.to_vec());
        });

        router.dispatch(&raw("sync", &["1"]));
        router.dispatch(&raw("nop", &[]));

        assert_eq!(*seen.lock().unwrap(), vec![vec!["1".to_string()]]);
    }

    #[test]
    fn later_registration_replaces_earlier_one() {
        let mut router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log1 = log.clone();
        router.add_instruction_handler("nop", move |_| log1.lock().unwrap().push("first"));
        let log2 = log.clone();
        router.add_instruction_handler("nop", move |_| log2.lock().unwrap().push("second"));

        router.dispatch(&raw("nop", &[]));
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn listener_runs_alongside_the_specific_handler() {
        let mut router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handler_log = log.clone();
        router.add_instruction_handler("sync", move |_| handler_log.lock().unwrap().push("handler".to_string()));
        let listener_log = log.clone();
        router.set_listener(move |opcode, _| listener_log.lock().unwrap().push(opcode.to_string()));

        router.dispatch(&raw("sync", &["1"]));
        assert_eq!(*log.lock().unwrap(), vec!["handler", "sync"]);
    }

    #[test]
    fn unregistered_opcode_only_reaches_the_listener() {
        let mut router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        router.set_listener(move |opcode, _| log2.lock().unwrap().push(opcode.to_string()));

        router.dispatch(&raw("mystery", &[]));
        assert_eq!(*log.lock().unwrap(), vec!["mystery"]);
    }
}

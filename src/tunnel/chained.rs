//! Fallback composite that tries a sequence of child tunnels and commits
//! to whichever one first proves live.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::status::{Status, StatusCode};
use crate::wire::Value;

use super::{Tunnel, TunnelError, TunnelEvent, TunnelState};

/// A child tunnel paired with the private receiver end of the channel it
/// was constructed with. `ChainedTunnel` drains this receiver itself
/// while probing the child, then (if the child wins) forwards everything
/// that arrives on it afterward to the chain's own public sender.
pub struct Candidate {
    pub tunnel: Arc<dyn Tunnel>,
    pub events: mpsc::UnboundedReceiver<TunnelEvent>,
    /// Data passed to this child's `connect`, e.g. a child-specific URL
    /// query string. Most callers pass the same handshake data to every
    /// child and can leave this `None`.
    pub connect_data: Option<String>,
}

/// Tries each candidate's `connect` in order; the first one to produce
/// an instruction (or a UUID) before its own `connect` call errors wins
/// and is committed to for the rest of the session. Once committed, the
/// choice is never revisited, matching the spec's "irrevocable" wording:
/// a later connectivity blip on the winning child is reported as an
/// ordinary [`TunnelEvent::Error`], not as a reason to try the next
/// candidate.
pub struct ChainedTunnel {
    candidates: Mutex<Vec<Candidate>>,
    committed: Mutex<Option<Arc<dyn Tunnel>>>,
    events: mpsc::UnboundedSender<TunnelEvent>,
    state: AtomicUsize,
}

fn state_from_usize(v: usize) -> TunnelState {
    match v {
        0 => TunnelState::Connecting,
        1 => TunnelState::Open,
        2 => TunnelState::Unstable,
        3 => TunnelState::Closed,
        _ => TunnelState::ClosedWithError,
    }
}

fn state_to_usize(s: TunnelState) -> usize {
    match s {
        TunnelState::Connecting => 0,
        TunnelState::Open => 1,
        TunnelState::Unstable => 2,
        TunnelState::Closed => 3,
        TunnelState::ClosedWithError => 4,
    }
}

/// Drains `events` until something other than a bare liveness update
/// arrives. Every real [`Tunnel`] emits `StateChange(Open)` as its very
/// first event, before the `ready`/`Uuid` handshake even starts, so the
/// probe loop below has to look past it instead of treating it as "the
/// candidate closed."
async fn next_substantive_event(events: &mut mpsc::UnboundedReceiver<TunnelEvent>) -> Option<TunnelEvent> {
    loop {
        match events.recv().await {
            Some(TunnelEvent::StateChange(TunnelState::Open | TunnelState::Unstable)) => continue,
            other => return other,
        }
    }
}

impl ChainedTunnel {
    pub fn new(candidates: Vec<Candidate>, events: mpsc::UnboundedSender<TunnelEvent>) -> Self {
        Self {
            candidates: Mutex::new(candidates),
            committed: Mutex::new(None),
            events,
            state: AtomicUsize::new(state_to_usize(TunnelState::Connecting)),
        }
    }

    fn set_state(&self, state: TunnelState) {
        self.state.store(state_to_usize(state), Ordering::SeqCst);
        let _ = self.events.send(TunnelEvent::StateChange(state));
    }

    fn commit(&self, mut candidate: Candidate) {
        let tunnel = candidate.tunnel.clone();
        *self.committed.lock().unwrap() = Some(tunnel);
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = candidate.events.recv().await {
                let _ = events.send(event);
            }
        });
    }
}

impl Tunnel for ChainedTunnel {
    fn connect(&self, _data: Option<String>) -> BoxFuture<'_, Result<(), TunnelError>> {
        Box::pin(async move {
            let mut candidates = self.candidates.lock().unwrap().drain(..).collect::<Vec<_>>();
            let mut last_error = None;

            while !candidates.is_empty() {
                let mut candidate = candidates.remove(0);
                let connect_data = candidate.connect_data.clone();

                if let Err(e) = candidate.tunnel.connect(connect_data).await {
                    last_error = Some(e);
                    continue;
                }

                match next_substantive_event(&mut candidate.events).await {
                    Some(TunnelEvent::Instruction(raw)) => {
                        self.set_state(TunnelState::Open);
                        let _ = self.events.send(TunnelEvent::Instruction(raw));
                        self.commit(candidate);
                        return Ok(());
                    },
                    Some(TunnelEvent::Uuid(uuid)) => {
                        let _ = self.events.send(TunnelEvent::Uuid(uuid));
                        match next_substantive_event(&mut candidate.events).await {
                            Some(TunnelEvent::Instruction(raw)) => {
                                self.set_state(TunnelState::Open);
                                let _ = self.events.send(TunnelEvent::Instruction(raw));
                                self.commit(candidate);
                                return Ok(());
                            },
                            Some(TunnelEvent::Error(status)) => {
                                candidate.tunnel.disconnect();
                                last_error = Some(TunnelError::Failed(status));
                                continue;
                            },
                            _ => {
                                candidate.tunnel.disconnect();
                                last_error = Some(TunnelError::Failed(Status::new(
                                    StatusCode::UpstreamError,
                                    "candidate closed before its first instruction",
                                )));
                                continue;
                            },
                        }
                    },
                    Some(TunnelEvent::Error(status)) => {
                        candidate.tunnel.disconnect();
                        last_error = Some(TunnelError::Failed(status));
                        continue;
                    },
                    _ => {
                        candidate.tunnel.disconnect();
                        last_error = Some(TunnelError::Failed(Status::new(
                            StatusCode::UpstreamError,
                            "candidate closed before its first instruction",
                        )));
                        continue;
                    },
                }
            }

            self.set_state(TunnelState::ClosedWithError);
            Err(last_error.unwrap_or(TunnelError::Failed(Status::new(
                StatusCode::UpstreamUnavailable,
                "no candidate tunnels configured",
            ))))
        })
    }

    fn disconnect(&self) {
        if let Some(tunnel) = self.committed.lock().unwrap().as_ref() {
            tunnel.disconnect();
        }
        self.set_state(TunnelState::Closed);
    }

    fn send_message(&self, opcode: &str, params: &[Value]) -> Result<(), TunnelError> {
        let guard = self.committed.lock().unwrap();
        let tunnel = guard.as_ref().ok_or(TunnelError::NotConnected)?;
        tunnel.send_message(opcode, params)
    }

    fn state(&self) -> TunnelState {
        if let Some(tunnel) = self.committed.lock().unwrap().as_ref() {
            return tunnel.state();
        }
        state_from_usize(self.state.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::RawInstruction;

    struct StubTunnel {
        fail: bool,
    }

    impl Tunnel for StubTunnel {
        fn connect(&self, _data: Option<String>) -> BoxFuture<'_, Result<(), TunnelError>> {
            Box::pin(async move {
                if self.fail {
                    Err(TunnelError::Failed(Status::new(StatusCode::UpstreamTimeout, "stub failure")))
                } else {
                    Ok(())
                }
            })
        }

        fn disconnect(&self) {}

        fn send_message(&self, _opcode: &str, _params: &[Value]) -> Result<(), TunnelError> {
            Ok(())
        }

        fn state(&self) -> TunnelState {
            TunnelState::Open
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_candidate_on_first_error() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let (_first_tx, first_rx) = mpsc::unbounded_channel();
        let first = Candidate {
            tunnel: Arc::new(StubTunnel { fail: true }),
            events: first_rx,
            connect_data: None,
        };

        let (second_tx, second_rx) = mpsc::unbounded_channel();
        let second = Candidate {
            tunnel: Arc::new(StubTunnel { fail: false }),
            events: second_rx,
            connect_data: None,
        };
        second_tx
            .send(TunnelEvent::Instruction(RawInstruction {
                opcode: "ready".into(),
                params: vec!["abc".into()],
            }))
            .unwrap();

        let chained = ChainedTunnel::new(vec![first, second], events_tx);
        chained.connect(None).await.unwrap();

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, TunnelEvent::Instruction(_)));
        assert_eq!(chained.state(), TunnelState::Open);
    }

    #[tokio::test]
    async fn looks_past_state_change_events_while_probing() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let (only_tx, only_rx) = mpsc::unbounded_channel();
        let only = Candidate {
            tunnel: Arc::new(StubTunnel { fail: false }),
            events: only_rx,
            connect_data: None,
        };
        only_tx.send(TunnelEvent::StateChange(TunnelState::Open)).unwrap();
        only_tx
            .send(TunnelEvent::Instruction(RawInstruction {
                opcode: "ready".into(),
                params: vec!["abc".into()],
            }))
            .unwrap();

        let chained = ChainedTunnel::new(vec![only], events_tx);
        chained.connect(None).await.unwrap();

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, TunnelEvent::Instruction(_)));
        assert_eq!(chained.state(), TunnelState::Open);
    }

    #[tokio::test]
    async fn reports_last_error_when_every_candidate_fails() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (_tx, rx) = mpsc::unbounded_channel();
        let only = Candidate {
            tunnel: Arc::new(StubTunnel { fail: true }),
            events: rx,
            connect_data: None,
        };

        let chained = ChainedTunnel::new(vec![only], events_tx);
        let result = chained.connect(None).await;
        assert!(result.is_err());
        assert_eq!(chained.state(), TunnelState::ClosedWithError);
    }
}

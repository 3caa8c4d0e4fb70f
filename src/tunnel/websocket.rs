//! Full-duplex tunnel variant over a single WebSocket.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::status::{Status, StatusCode};
use crate::wire::{encode, Decoder, Value};

use super::{Tunnel, TunnelConfig, TunnelError, TunnelEvent, TunnelState};

fn state_from_u8(v: u8) -> TunnelState {
    match v {
        0 => TunnelState::Connecting,
        1 => TunnelState::Open,
        2 => TunnelState::Unstable,
        3 => TunnelState::Closed,
        _ => TunnelState::ClosedWithError,
    }
}

fn state_to_u8(s: TunnelState) -> u8 {
    match s {
        TunnelState::Connecting => 0,
        TunnelState::Open => 1,
        TunnelState::Unstable => 2,
        TunnelState::Closed => 3,
        TunnelState::ClosedWithError => 4,
    }
}

/// A tunnel backed by `tokio-tungstenite`. The idle watchdog (UNSTABLE
/// after 1500ms, full closure after RECEIVE_TIMEOUT) is implemented as a
/// nested `tokio::time::timeout` around the read loop rather than a
/// separate timer task, since the read loop is the only place new
/// "activity" can be observed.
pub struct WebSocketTunnel {
    url: String,
    config: TunnelConfig,
    events: mpsc::UnboundedSender<TunnelEvent>,
    state: Arc<AtomicU8>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    closing: Arc<AtomicBool>,
}

impl WebSocketTunnel {
    pub fn new(url: impl Into<String>, config: TunnelConfig, events: mpsc::UnboundedSender<TunnelEvent>) -> Self {
        Self {
            url: url.into(),
            config,
            events,
            state: Arc::new(AtomicU8::new(state_to_u8(TunnelState::Connecting))),
            outbound: Mutex::new(None),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn set_state(&self, state: TunnelState) {
        self.state.store(state_to_u8(state), Ordering::SeqCst);
        let _ = self.events.send(TunnelEvent::StateChange(state));
    }
}

impl Tunnel for WebSocketTunnel {
    fn connect(&self, data: Option<String>) -> BoxFuture<'_, Result<(), TunnelError>> {
        Box::pin(async move {
            let mut url = Url::parse(&self.url).map_err(|e| {
                TunnelError::Failed(Status::new(StatusCode::ClientBadRequest, e.to_string()))
            })?;
            if let Some(data) = &data {
                url.query_pairs_mut().append_pair("connect", data);
            }

            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TunnelError::Failed(Status::new(StatusCode::UpstreamTimeout, e.to_string())))?;

            let (mut write, mut read) = ws_stream.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
            *self.outbound.lock().unwrap() = Some(out_tx);

            self.set_state(TunnelState::Open);

            tokio::spawn(async move {
                while let Some(msg) = out_rx.recv().await {
                    if write.send(msg).await.is_err() {
                        break;
                    }
                }
            });

            let events = self.events.clone();
            let config = self.config;
            let state = self.state.clone();
            let closing = self.closing.clone();
            tokio::spawn(async move {
                let mut decoder = Decoder::new();
                let mut last_activity = Instant::now();
                let mut seen_ready = false;

                loop {
                    if closing.load(Ordering::SeqCst) {
                        break;
                    }
                    let remaining = config.receive_timeout().saturating_sub(last_activity.elapsed());
                    if remaining.is_zero() {
                        state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                        let _ = events.send(TunnelEvent::Error(Status::new(
                            StatusCode::UpstreamTimeout,
                            "no data received within the receive timeout",
                        )));
                        break;
                    }
                    let step = config.unstable_threshold().min(remaining);

                    match tokio::time::timeout(step, read.next()).await {
                        Ok(Some(Ok(Message::Text(text)))) => {
                            last_activity = Instant::now();
                            if state_from_u8(state.load(Ordering::SeqCst)) == TunnelState::Unstable {
                                state.store(state_to_u8(TunnelState::Open), Ordering::SeqCst);
                                let _ = events.send(TunnelEvent::StateChange(TunnelState::Open));
                            }
                            match decoder.receive(&text) {
                                Ok(instructions) => {
                                    for raw in instructions {
                                        if !seen_ready {
                                            if raw.opcode != "ready" || raw.params.is_empty() {
                                                state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                                                let _ = events.send(TunnelEvent::Error(Status::new(
                                                    StatusCode::ServerError,
                                                    "handshake fault: expected ready as first instruction",
                                                )));
                                                return;
                                            }
                                            seen_ready = true;
                                            let _ = events.send(TunnelEvent::Uuid(raw.params[0].clone()));
                                        }
                                        let _ = events.send(TunnelEvent::Instruction(raw));
                                    }
                                },
                                Err(e) => {
                                    state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                                    let _ = events.send(TunnelEvent::Error(Status::new(
                                        StatusCode::ServerError,
                                        e.to_string(),
                                    )));
                                    return;
                                },
                            }
                        },
                        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                            state.store(state_to_u8(TunnelState::Closed), Ordering::SeqCst);
                            let _ = events.send(TunnelEvent::StateChange(TunnelState::Closed));
                            return;
                        },
                        Ok(Some(Ok(_))) => continue, // ping/pong/binary: ignored
                        Ok(Some(Err(e))) => {
                            state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                            let _ = events.send(TunnelEvent::Error(Status::new(
                                StatusCode::UpstreamError,
                                e.to_string(),
                            )));
                            return;
                        },
                        Err(_elapsed) => {
                            if state_from_u8(state.load(Ordering::SeqCst)) == TunnelState::Open {
                                state.store(state_to_u8(TunnelState::Unstable), Ordering::SeqCst);
                                let _ = events.send(TunnelEvent::StateChange(TunnelState::Unstable));
                            }
                        },
                    }
                }
            });

            Ok(())
        })
    }

    fn disconnect(&self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(sender) = self.outbound.lock().unwrap().take() {
            let _ = sender.send(Message::Close(None));
        }
        self.state.store(state_to_u8(TunnelState::Closed), Ordering::SeqCst);
        let _ = self.events.send(TunnelEvent::StateChange(TunnelState::Closed));
    }

    fn send_message(&self, opcode: &str, params: &[Value]) -> Result<(), TunnelError> {
        let state = self.state();
        if !matches!(state, TunnelState::Open | TunnelState::Unstable) {
            return Err(TunnelError::NotConnected);
        }
        let guard = self.outbound.lock().unwrap();
        let sender = guard.as_ref().ok_or(TunnelError::NotConnected)?;
        let wire = encode(opcode, params);
        sender
            .send(Message::Text(wire))
            .map_err(|_| TunnelError::NotConnected)
    }

    fn state(&self) -> TunnelState {
        state_from_u8(self.state.load(Ordering::SeqCst))
    }
}

//! Half-duplex long-poll tunnel variant over plain HTTP.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::status::{Status, StatusCode};
use crate::wire::{encode, Decoder, Value};

use super::{map_http_status, Tunnel, TunnelConfig, TunnelError, TunnelEvent, TunnelState};

/// Floor the empty-response backoff doubles from. `TunnelConfig::polling_initial`
/// defaults to zero (no delay before the very first poll), so doubling has
/// to start somewhere other than the configured initial value or it never
/// leaves zero.
const POLLING_BACKOFF_FLOOR: std::time::Duration = std::time::Duration::from_millis(25);

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

/// A tunnel backed by two independent HTTP loops: a long-poll GET reader
/// and a coalescing POST writer, matching the spec's description of the
/// half-duplex variant exactly. The two loops share only the `uuid` and
/// communicate with `send_message` through an unbounded channel, so a
/// burst of outbound instructions between POSTs collapses into one
/// request body rather than one request per instruction.
pub struct HttpTunnel {
    base_url: String,
    client: reqwest::Client,
    config: TunnelConfig,
    events: mpsc::UnboundedSender<TunnelEvent>,
    state: Arc<AtomicU8>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl HttpTunnel {
    pub fn new(base_url: impl Into<String>, config: TunnelConfig, events: mpsc::UnboundedSender<TunnelEvent>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            config,
            events,
            state: Arc::new(AtomicU8::new(state_to_u8(TunnelState::Connecting))),
            outbound: Mutex::new(None),
        }
    }

    fn set_state(&self, state: TunnelState) {
        self.state.store(state_to_u8(state), Ordering::SeqCst);
        let _ = self.events.send(TunnelEvent::StateChange(state));
    }
}

impl Tunnel for HttpTunnel {
    fn connect(&self, data: Option<String>) -> BoxFuture<'_, Result<(), TunnelError>> {
        Box::pin(async move {
            let connect_url = format!("{}?connect", self.base_url);
            let response = self
                .client
                .post(&connect_url)
                .body(data.unwrap_or_default())
                .send()
                .await
                .map_err(|_| TunnelError::Failed(Status::new(StatusCode::UpstreamTimeout, "connect request failed")))?;

            if !response.status().is_success() {
                let mapped = map_http_status(response.status().as_u16());
                return Err(TunnelError::Failed(Status::new(mapped, "connect handshake rejected")));
            }

            let uuid = response
                .text()
                .await
                .map_err(|_| TunnelError::Failed(Status::new(StatusCode::ServerError, "unreadable connect response")))?
                .trim()
                .to_string();
            if uuid.is_empty() {
                return Err(TunnelError::Failed(Status::new(
                    StatusCode::ServerError,
                    "handshake fault: empty connection id",
                )));
            }

            let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
            *self.outbound.lock().unwrap() = Some(out_tx);

            self.set_state(TunnelState::Open);
            let _ = self.events.send(TunnelEvent::Uuid(uuid.clone()));

            spawn_reader(
                self.client.clone(),
                format!("{}?read:{}", self.base_url, uuid),
                self.config,
                self.state.clone(),
                self.events.clone(),
            );
            spawn_writer(
                self.client.clone(),
                format!("{}?write:{}", self.base_url, uuid),
                out_rx,
            );

            Ok(())
        })
    }

    fn disconnect(&self) {
        self.outbound.lock().unwrap().take();
        self.state.store(state_to_u8(TunnelState::Closed), Ordering::SeqCst);
        let _ = self.events.send(TunnelEvent::StateChange(TunnelState::Closed));
    }

    fn send_message(&self, opcode: &str, params: &[Value]) -> Result<(), TunnelError> {
        if !matches!(self.state(), TunnelState::Open | TunnelState::Unstable) {
            return Err(TunnelError::NotConnected);
        }
        let guard = self.outbound.lock().unwrap();
        let sender = guard.as_ref().ok_or(TunnelError::NotConnected)?;
        sender
            .send(encode(opcode, params))
            .map_err(|_| TunnelError::NotConnected)
    }

    fn state(&self) -> TunnelState {
        state_from_u8(self.state.load(Ordering::SeqCst))
    }
}

fn spawn_reader(
    client: reqwest::Client,
    read_url: String,
    config: TunnelConfig,
    state: Arc<AtomicU8>,
    events: mpsc::UnboundedSender<TunnelEvent>,
) {
    tokio::spawn(async move {
        let mut decoder = Decoder::new();
        let mut poll_interval = config.polling_initial();

        loop {
            let attempt = tokio::time::timeout(config.receive_timeout(), client.get(&read_url).send()).await;

            let response = match attempt {
                Ok(Ok(response)) => response,
                Ok(Err(_)) => {
                    state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                    let _ = events.send(TunnelEvent::Error(Status::new(StatusCode::UpstreamError, "read request failed")));
                    return;
                },
                Err(_elapsed) => {
                    state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                    let _ = events.send(TunnelEvent::Error(Status::new(
                        StatusCode::UpstreamTimeout,
                        "no data received within the receive timeout",
                    )));
                    return;
                },
            };

            if !response.status().is_success() {
                let mapped = map_http_status(response.status().as_u16());
                state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                let _ = events.send(TunnelEvent::Error(Status::new(mapped, "read request rejected")));
                return;
            }

            let text = match response.text().await {
                Ok(text) => text,
                Err(_) => {
                    state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                    let _ = events.send(TunnelEvent::Error(Status::new(StatusCode::UpstreamError, "unreadable read response")));
                    return;
                },
            };

            if text.is_empty() {
                poll_interval = if poll_interval.is_zero() {
                    POLLING_BACKOFF_FLOOR.min(config.polling_max())
                } else {
                    (poll_interval * 2).min(config.polling_max())
                };
                if state_from_u8(state.load(Ordering::SeqCst)) == TunnelState::Open
                    && poll_interval >= config.unstable_threshold()
                {
                    state.store(state_to_u8(TunnelState::Unstable), Ordering::SeqCst);
                    let _ = events.send(TunnelEvent::StateChange(TunnelState::Unstable));
                }
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            poll_interval = config.polling_initial();
            if state_from_u8(state.load(Ordering::SeqCst)) == TunnelState::Unstable {
                state.store(state_to_u8(TunnelState::Open), Ordering::SeqCst);
                let _ = events.send(TunnelEvent::StateChange(TunnelState::Open));
            }

            match decoder.receive(&text) {
                Ok(instructions) => {
                    for raw in instructions {
                        let _ = events.send(TunnelEvent::Instruction(raw));
                    }
                },
                Err(e) => {
                    state.store(state_to_u8(TunnelState::ClosedWithError), Ordering::SeqCst);
                    let _ = events.send(TunnelEvent::Error(Status::new(StatusCode::ServerError, e.to_string())));
                    return;
                },
            }
        }
    });
}

fn spawn_writer(client: reqwest::Client, write_url: String, mut rx: mpsc::UnboundedReceiver<String>) {
    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            let mut body = first;
            while let Ok(more) = rx.try_recv() {
                body.push_str(&more);
            }
            let _ = client.post(&write_url).body(body).send().await;
        }
    });
}

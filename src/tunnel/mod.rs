//! Transport layer: connection lifecycle, the two wire transports, and
//! the chained-fallback composite that picks between them.
//!
//! A [`Tunnel`] owns its own [`crate::wire::Decoder`] and feeds every
//! decoded instruction, state transition, and UUID/error notice to a
//! single `mpsc` channel ([`TunnelEvent`]) rather than invoking
//! caller-supplied callbacks directly. [`crate::client::Client`] is the
//! sole consumer of that channel, which is what gives the whole stack
//! its single-threaded cooperative processing order (spec's
//! concurrency model): events from background transport tasks only take
//! effect once the client's own loop gets around to them.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::status::{Status, StatusCode};
use crate::wire::{RawInstruction, Value};

pub mod chained;
pub mod http;
pub mod websocket;

pub use chained::ChainedTunnel;
pub use http::HttpTunnel;
pub use websocket::WebSocketTunnel;

/// Mirrors the data-model invariant that a tunnel occupies exactly one
/// of these states at a time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TunnelState {
    Connecting,
    Open,
    Unstable,
    Closed,
    ClosedWithError,
}

/// Everything a tunnel implementation reports back to its owner.
/// Delivered over an unbounded `mpsc` channel rather than as direct
/// callback invocations, so a transport task never blocks on the
/// consumer and never observes reentrancy into tunnel state.
#[derive(Clone, Debug)]
pub enum TunnelEvent {
    Instruction(RawInstruction),
    StateChange(TunnelState),
    Error(Status),
    Uuid(String),
}

#[derive(Debug)]
pub enum TunnelError {
    /// A protocol status describing why the tunnel failed (transport
    /// error, handshake fault, or receive timeout; see spec's error
    /// handling design).
    Failed(Status),
    /// `send_message` was attempted while the tunnel was not open.
    NotConnected,
}

impl fmt::Display for TunnelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelError::Failed(status) => write!(f, "tunnel failed: {status}"),
            TunnelError::NotConnected => write!(f, "tunnel is not connected"),
        }
    }
}

impl std::error::Error for TunnelError {}

impl From<Status> for TunnelError {
    fn from(status: Status) -> Self {
        TunnelError::Failed(status)
    }
}

/// The shared surface every transport variant implements: connect,
/// disconnect, send, and a state query. Events flow out-of-band over
/// the `mpsc::UnboundedSender<TunnelEvent>` supplied at construction,
/// not through trait methods, which is what keeps this trait object
/// safe and lets [`ChainedTunnel`] hold a heterogeneous list of
/// children.
pub trait Tunnel: Send + Sync {
    /// Establishes the transport. Resolves once the underlying
    /// connection is usable (a WebSocket handshake completed, or an
    /// HTTP tunnel's connect POST returned a UUID) — not once the
    /// Guacamole protocol handshake (`ready`, etc.) has happened; that
    /// arrives later as ordinary [`TunnelEvent`]s.
    fn connect(&self, data: Option<String>) -> BoxFuture<'_, Result<(), TunnelError>>;

    /// Tears the transport down. Idempotent.
    fn disconnect(&self);

    /// Encodes `opcode`/`params` and hands the result to the transport.
    fn send_message(&self, opcode: &str, params: &[Value]) -> Result<(), TunnelError>;

    fn state(&self) -> TunnelState;
}

/// Timing knobs for both transport variants, defaulted to the spec's
/// constants but overridable — ambient configurability, not a scope
/// change.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    pub unstable_threshold_ms: u64,
    pub receive_timeout_ms: u64,
    pub polling_initial_ms: u64,
    pub polling_max_ms: u64,
}

impl TunnelConfig {
    pub fn unstable_threshold(&self) -> Duration {
        Duration::from_millis(self.unstable_threshold_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn polling_initial(&self) -> Duration {
        Duration::from_millis(self.polling_initial_ms)
    }

    pub fn polling_max(&self) -> Duration {
        Duration::from_millis(self.polling_max_ms)
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            unstable_threshold_ms: 1500,
            receive_timeout_ms: 15_000,
            polling_initial_ms: 0,
            polling_max_ms: 5_000,
        }
    }
}

/// Maps an HTTP response status to a protocol [`StatusCode`], per the
/// spec's transport-endpoint table.
pub fn map_http_status(code: u16) -> StatusCode {
    match code {
        403 => StatusCode::ClientForbidden,
        404 => StatusCode::UpstreamNotFound,
        500..=599 => StatusCode::UpstreamError,
        _ => StatusCode::UpstreamError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let cfg = TunnelConfig::default();
        assert_eq!(cfg.unstable_threshold(), Duration::from_millis(1500));
        assert_eq!(cfg.receive_timeout(), Duration::from_millis(15_000));
        assert_eq!(cfg.polling_initial(), Duration::from_millis(0));
        assert_eq!(cfg.polling_max(), Duration::from_millis(5_000));
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(map_http_status(403), StatusCode::ClientForbidden);
        assert_eq!(map_http_status(404), StatusCode::UpstreamNotFound);
        assert_eq!(map_http_status(503), StatusCode::UpstreamError);
        assert_eq!(map_http_status(500), StatusCode::UpstreamError);
    }
}

//! Core protocol runtime for a Guacamole remote-desktop gateway client:
//! the wire codec and instruction catalog, the tunnel transport layer
//! (WebSocket, HTTP long-poll, and chained fallback), the stream
//! managers that back blob/object transfer, and the [`client::Client`]
//! state machine tying them together behind a set of sink traits.
//!
//! This crate draws no pixels, plays no audio, and renders no UI: it
//! speaks the wire protocol and hands typed calls to whatever
//! [`sink::DisplaySink`]/[`sink::AudioSink`]/[`sink::ClipboardSink`]/
//! [`sink::FileSink`]/[`sink::PipeSink`]/[`sink::FilesystemSink`]
//! implementation the caller supplies.

pub mod client;
pub mod index_pool;
pub mod router;
pub mod sink;
pub mod status;
pub mod stream;
pub mod tunnel;
pub mod wire;

pub use client::{Client, ClientConfig, ClientError, ClientState, ConnectParams, Sinks};
pub use status::{Status, StatusCode};

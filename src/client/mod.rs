//! The client state machine: handshake, keep-alive, the sync protocol,
//! nested decoders, and outbound guards, tying the wire codec, stream
//! managers, and tunnel layer together behind the sink traits.
//!
//! [`Client`] is the single consumer of a tunnel's [`TunnelEvent`]
//! stream; every instruction dispatch, state transition, and stream
//! callback happens inside [`Client::run`], matching the single-threaded
//! cooperative processing model the tunnel layer is built around.

mod dispatch;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::router::Router;
use crate::sink::{
    AudioSink, ClipboardSink, DisplaySink, FileSink, FilesystemSink, NullAudioSink, NullClipboardSink,
    NullDisplaySink, NullFileSink, NullFilesystemSink, NullPipeSink, PipeSink,
};
use crate::status::{Status, StatusCode};
use crate::stream::object::BodyResponse;
use crate::stream::{InputManager, ObjectManager, OutputManager};
use crate::tunnel::{Tunnel, TunnelError, TunnelEvent};
use crate::wire::decoder::Error as DecodeError;
use crate::wire::instructions::{self, CatalogError, Layer, ServerInstruction};
use crate::wire::{Decoder, Value};

/// Mirrors the connection lifecycle exactly: IDLE before the first
/// `connect`, CONNECTING while the transport is being established,
/// WAITING once the handshake group has been sent but no `sync` has
/// arrived yet, CONNECTED after the first `sync`, then DISCONNECTING and
/// DISCONNECTED.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientState {
    Idle,
    Connecting,
    Waiting,
    Connected,
    Disconnecting,
    Disconnected,
}

/// Timing knobs for the client's own bookkeeping, as opposed to
/// [`crate::tunnel::TunnelConfig`]'s transport-level timing.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub keep_alive_interval_ms: u64,
}

impl ClientConfig {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { keep_alive_interval_ms: 5000 }
    }
}

/// The handshake instruction group sent immediately after the transport
/// connects, in wire order: `select, size, audio, video, image,
/// timezone, connect`.
#[derive(Clone, Debug, Default)]
pub struct ConnectParams {
    pub protocol: String,
    pub width: i64,
    pub height: i64,
    pub dpi: Option<i64>,
    pub audio_mimetypes: Vec<String>,
    pub video_mimetypes: Vec<String>,
    pub image_mimetypes: Vec<String>,
    pub timezone: Option<String>,
    pub connect_args: Vec<String>,
}

/// The five external collaborators spec's Non-goals name, bundled as
/// trait objects supplied at construction. Each defaults to its `Null*`
/// implementation, so a `Client` can be built and driven without any
/// real consumer attached (as the test suite below does).
pub struct Sinks {
    pub display: Box<dyn DisplaySink>,
    pub audio: Box<dyn AudioSink>,
    pub clipboard: Box<dyn ClipboardSink>,
    pub file: Box<dyn FileSink>,
    pub pipe: Box<dyn PipeSink>,
    pub filesystem: Box<dyn FilesystemSink>,
}

impl Default for Sinks {
    fn default() -> Self {
        Self {
            display: Box::new(NullDisplaySink),
            audio: Box::new(NullAudioSink),
            clipboard: Box::new(NullClipboardSink),
            file: Box::new(NullFileSink),
            pipe: Box::new(NullPipeSink),
            filesystem: Box::new(NullFilesystemSink),
        }
    }
}

#[derive(Debug)]
pub enum ClientError {
    /// A decode fault in the top-level stream or a nested decoder.
    /// Fatal; the connection is torn down.
    Codec(DecodeError),
    /// A recognized opcode whose elements didn't parse (bad arity, a
    /// non-numeric field, an out-of-range enum code).
    Catalog(CatalogError),
    /// The tunnel failed to connect or a `send_message` call failed.
    Transport(TunnelError),
    /// `connect` was called outside IDLE, or the handshake group could
    /// not be sent.
    Handshake(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Codec(e) => write!(f, "codec fault: {e}"),
            ClientError::Catalog(e) => write!(f, "instruction catalog fault: {e}"),
            ClientError::Transport(e) => write!(f, "transport fault: {e}"),
            ClientError::Handshake(msg) => write!(f, "handshake fault: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<DecodeError> for ClientError {
    fn from(e: DecodeError) -> Self {
        ClientError::Codec(e)
    }
}

impl From<CatalogError> for ClientError {
    fn from(e: CatalogError) -> Self {
        ClientError::Catalog(e)
    }
}

impl From<TunnelError> for ClientError {
    fn from(e: TunnelError) -> Self {
        ClientError::Transport(e)
    }
}

/// An image stream opened by the server's `img` instruction, accumulated
/// here (not in [`InputManager`]) because decoding it into a drawing
/// call is this crate's own responsibility, not a sink's.
struct ImageStream {
    channel_mask: i64,
    layer: Layer,
    mimetype: String,
    x: i64,
    y: i64,
    data: String,
}

/// The outcome of an earlier [`Client::request_body`], bridged back from
/// [`ObjectManager`]'s completion closure (which cannot itself hold a
/// `&mut Client`) through a shared queue that [`Client`] drains
/// synchronously right after triggering it.
struct ResolvedBody {
    object: i64,
    name: String,
    result: Result<BodyResponse, Status>,
}

/// Ties the wire codec, stream managers, and a [`Tunnel`] together into
/// the connection state machine described in the module docs.
pub struct Client {
    tunnel: Arc<dyn Tunnel>,
    events: mpsc::UnboundedReceiver<TunnelEvent>,
    config: ClientConfig,
    state: ClientState,
    sinks: Sinks,
    router: Router,
    input: InputManager,
    output: OutputManager,
    objects: ObjectManager,
    nested: HashMap<i64, Decoder>,
    image_streams: HashMap<i64, ImageStream>,
    body_results: Arc<Mutex<VecDeque<ResolvedBody>>>,
    keep_alive_token: Option<CancellationToken>,
    last_server_timestamp: i64,
    uuid: Option<String>,
    error_listener: Option<Box<dyn FnMut(&Status) + Send>>,
}

impl Client {
    /// `tunnel`/`events` must be the matching pair a [`Tunnel`]
    /// implementation was constructed with: `events` is the receiving
    /// end of the channel `tunnel` was given its sender from.
    pub fn new(tunnel: Arc<dyn Tunnel>, events: mpsc::UnboundedReceiver<TunnelEvent>, sinks: Sinks, config: ClientConfig) -> Self {
        Self {
            tunnel,
            events,
            config,
            state: ClientState::Idle,
            sinks,
            router: Router::new(),
            input: InputManager::new(),
            output: OutputManager::new(),
            objects: ObjectManager::new(),
            nested: HashMap::new(),
            image_streams: HashMap::new(),
            body_results: Arc::new(Mutex::new(VecDeque::new())),
            keep_alive_token: None,
            // Guarantees the first `sync` is always echoed regardless of
            // what timestamp the server happens to choose.
            last_server_timestamp: i64::MIN,
            uuid: None,
            error_listener: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The connection UUID surfaced by the tunnel's handshake, once known.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Grants access to the generic opcode router, e.g. to observe raw
    /// instructions the built-in handling doesn't otherwise surface.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Registers a callback for `error` instructions and tunnel-level
    /// failures. At most one listener; a later call replaces an earlier
    /// one.
    pub fn set_error_listener(&mut self, listener: impl FnMut(&Status) + Send + 'static) {
        self.error_listener = Some(Box::new(listener));
    }

    fn outbound_allowed(&self) -> bool {
        matches!(self.state, ClientState::Connected | ClientState::Waiting)
    }

    fn send_now(&self, message: (&'static str, Vec<Value>)) -> Result<(), ClientError> {
        self.tunnel.send_message(message.0, &message.1).map_err(ClientError::Transport)
    }

    /// Establishes the transport and sends the handshake group. Resolves
    /// once the client has reached WAITING; the first `sync` from the
    /// server later promotes it to CONNECTED.
    pub async fn connect(&mut self, data: Option<String>, params: ConnectParams) -> Result<(), ClientError> {
        if self.state != ClientState::Idle {
            return Err(ClientError::Handshake("connect called outside IDLE".into()));
        }
        self.state = ClientState::Connecting;

        if let Err(e) = self.tunnel.connect(data).await {
            self.state = ClientState::Idle;
            return Err(ClientError::Transport(e));
        }

        self.send_now(instructions::write::select(&params.protocol))?;
        self.send_now(instructions::write::size(params.width, params.height, params.dpi))?;
        self.send_now(instructions::write::audio(&params.audio_mimetypes))?;
        self.send_now(instructions::write::video(&params.video_mimetypes))?;
        self.send_now(instructions::write::image(&params.image_mimetypes))?;
        if let Some(tz) = &params.timezone {
            self.send_now(instructions::write::timezone(tz))?;
        }
        self.send_now(instructions::write::connect(&params.connect_args))?;

        self.start_keep_alive();
        self.state = ClientState::Waiting;
        Ok(())
    }

    fn start_keep_alive(&mut self) {
        let token = CancellationToken::new();
        let child = token.clone();
        let tunnel = self.tunnel.clone();
        let interval = self.config.keep_alive_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let (opcode, params) = instructions::write::nop();
                        let _ = tunnel.send_message(opcode, &params);
                    }
                }
            }
        });

        self.keep_alive_token = Some(token);
    }

    fn stop_keep_alive(&mut self) {
        if let Some(token) = self.keep_alive_token.take() {
            token.cancel();
        }
    }

    /// Drives the connection until the tunnel closes or `disconnect` is
    /// called from elsewhere (e.g. another task holding a clone of the
    /// underlying tunnel). Every instruction dispatch and stream callback
    /// happens on this task.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        while let Some(event) = self.events.recv().await {
            match event {
                TunnelEvent::Instruction(raw) => {
                    self.process_raw(raw).await?;
                },
                TunnelEvent::StateChange(state) if matches!(state, crate::tunnel::TunnelState::Closed | crate::tunnel::TunnelState::ClosedWithError) => {
                    self.close();
                },
                TunnelEvent::StateChange(_) => {},
                TunnelEvent::Error(status) => {
                    self.notify_error(&status);
                    self.close();
                },
                TunnelEvent::Uuid(id) => {
                    self.uuid = Some(id);
                },
            }

            if self.state == ClientState::Disconnected {
                break;
            }
        }
        Ok(())
    }

    async fn process_raw(&mut self, raw: crate::wire::RawInstruction) -> Result<(), ClientError> {
        let mut queue = VecDeque::new();
        queue.push_back(raw);

        while let Some(raw) = queue.pop_front() {
            self.router.dispatch(&raw);
            if let Some(instr) = instructions::parse(&raw)? {
                self.apply(instr, &mut queue).await?;
            }
        }
        Ok(())
    }

    fn notify_error(&mut self, status: &Status) {
        tracing::warn!(%status, "guacamole protocol error");
        if let Some(listener) = &mut self.error_listener {
            listener(status);
        }
    }

    /// Tears the connection down in response to a server-driven event
    /// (`disconnect`, `error`, or the tunnel closing) — no outbound
    /// `disconnect` instruction is sent, since the server has already
    /// ended the session or the transport is already gone.
    fn close(&mut self) {
        if matches!(self.state, ClientState::Disconnected | ClientState::Disconnecting) {
            return;
        }
        self.state = ClientState::Disconnecting;
        self.stop_keep_alive();
        self.tunnel.disconnect();
        self.state = ClientState::Disconnected;
    }

    /// User-initiated disconnect: sends `disconnect`, then tears the
    /// transport down. Idempotent.
    pub fn disconnect(&mut self) {
        if matches!(self.state, ClientState::Disconnected | ClientState::Disconnecting) {
            return;
        }
        self.state = ClientState::Disconnecting;
        self.stop_keep_alive();
        let _ = self.send_now(instructions::write::disconnect());
        self.tunnel.disconnect();
        self.state = ClientState::Disconnected;
    }

    /// No-op unless CONNECTED or WAITING.
    pub fn send_key_event(&self, keysym: i64, pressed: bool) {
        if !self.outbound_allowed() {
            return;
        }
        let _ = self.send_now(instructions::write::key(keysym, pressed));
    }

    /// No-op unless CONNECTED or WAITING.
    pub fn send_mouse_event(&self, x: i64, y: i64, button_mask: i64) {
        if !self.outbound_allowed() {
            return;
        }
        let _ = self.send_now(instructions::write::mouse(x, y, button_mask));
    }

    /// No-op unless CONNECTED or WAITING.
    pub fn send_size(&self, width: i64, height: i64) {
        if !self.outbound_allowed() {
            return;
        }
        let _ = self.send_now(instructions::write::size(width, height, None));
    }

    /// No-op unless CONNECTED or WAITING.
    pub fn send_message(&self, opcode: &str, params: &[Value]) {
        if !self.outbound_allowed() {
            return;
        }
        let _ = self.tunnel.send_message(opcode, params);
    }

    /// Allocates a new client-opened output stream, routing future
    /// `ack`s for it to `on_ack`.
    pub fn create_output_stream(&mut self, on_ack: impl FnMut(&Status) + Send + 'static) -> u32 {
        self.output.create_stream(on_ack)
    }

    /// No-op unless CONNECTED or WAITING.
    pub fn send_blob(&self, stream: u32, base64_data: &str) {
        if !self.outbound_allowed() {
            return;
        }
        let _ = self.send_now(instructions::write::blob(stream as i64, base64_data));
    }

    /// No-op unless CONNECTED or WAITING.
    pub fn end_output_stream(&mut self, stream: u32) {
        if !self.outbound_allowed() {
            return;
        }
        let _ = self.send_now(instructions::write::end(stream as i64));
        self.output.close(stream);
    }

    /// Opens an audio output stream and announces it to the server.
    /// Returns `None` if the client isn't CONNECTED or WAITING.
    pub fn open_audio_output(&mut self, mimetype: &str, on_ack: impl FnMut(&Status) + Send + 'static) -> Option<u32> {
        if !self.outbound_allowed() {
            return None;
        }
        let index = self.output.create_stream(on_ack);
        self.send_now(instructions::write::audio_stream(index as i64, mimetype)).ok()?;
        Some(index)
    }

    /// Opens a clipboard output stream and announces it to the server.
    pub fn open_clipboard_output(&mut self, mimetype: &str, on_ack: impl FnMut(&Status) + Send + 'static) -> Option<u32> {
        if !self.outbound_allowed() {
            return None;
        }
        let index = self.output.create_stream(on_ack);
        self.send_now(instructions::write::clipboard_stream(index as i64, mimetype)).ok()?;
        Some(index)
    }

    /// Opens a named file output stream and announces it to the server.
    pub fn open_file_output(&mut self, mimetype: &str, name: &str, on_ack: impl FnMut(&Status) + Send + 'static) -> Option<u32> {
        if !self.outbound_allowed() {
            return None;
        }
        let index = self.output.create_stream(on_ack);
        self.send_now(instructions::write::file_stream(index as i64, mimetype, name)).ok()?;
        Some(index)
    }

    /// Requests the body of `name` from a server-exposed filesystem
    /// object. The result resolves through [`FilesystemSink::body_opened`]
    /// once a matching `body` instruction arrives. No-op unless CONNECTED
    /// or WAITING.
    pub fn request_body(&mut self, object: i64, name: &str) -> Result<(), ClientError> {
        if !self.outbound_allowed() {
            return Ok(());
        }
        let results = self.body_results.clone();
        let pending_object = object;
        let pending_name = name.to_string();
        self.objects.request(object, name, move |result| {
            results.lock().unwrap().push_back(ResolvedBody {
                object: pending_object,
                name: pending_name,
                result,
            });
        });
        self.send_now(instructions::write::get(object, name))
    }

    fn drain_body_results(&mut self) {
        loop {
            let next = self.body_results.lock().unwrap().pop_front();
            let Some(resolved) = next else { break };
            match resolved.result {
                Ok(body) => {
                    let handlers = self.sinks.filesystem.body_opened(resolved.object, body.stream, &body.mimetype, &resolved.name);
                    if let Some((on_blob, on_end)) = handlers {
                        self.input.open(body.stream, on_blob, on_end);
                    }
                },
                Err(status) => {
                    tracing::debug!(object = resolved.object, name = %resolved.name, %status, "object body request failed");
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::future::BoxFuture;
    use tokio::sync::oneshot;

    use super::*;
    use crate::sink::StreamHandlers;
    use crate::tunnel::TunnelState;
    use crate::wire::instructions::Layer;
    use crate::wire::RawInstruction;

    struct RecordingTunnel {
        sent: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl RecordingTunnel {
        fn new() -> Self {
            Self { sent: Mutex::new(Vec::new()) }
        }
    }

    impl Tunnel for RecordingTunnel {
        fn connect(&self, _data: Option<String>) -> BoxFuture<'_, Result<(), TunnelError>> {
            Box::pin(async { Ok(()) })
        }

        fn disconnect(&self) {}

        fn send_message(&self, opcode: &str, params: &[Value]) -> Result<(), TunnelError> {
            self.sent.lock().unwrap().push((opcode.to_string(), params.to_vec()));
            Ok(())
        }

        fn state(&self) -> crate::tunnel::TunnelState {
            TunnelState::Open
        }
    }

    struct RecordingDisplaySink {
        cursor_positions: Arc<Mutex<Vec<(i64, i64)>>>,
    }

    impl DisplaySink for RecordingDisplaySink {
        fn cursor_hotspot(&mut self, x: i64, y: i64) {
            self.cursor_positions.lock().unwrap().push((x, y));
        }
    }

    fn harness() -> (Client, Arc<RecordingTunnel>, mpsc::UnboundedSender<TunnelEvent>) {
        let tunnel = Arc::new(RecordingTunnel::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::new(tunnel.clone(), rx, Sinks::default(), ClientConfig::default());
        (client, tunnel, tx)
    }

    fn connect_params() -> ConnectParams {
        ConnectParams {
            protocol: "vnc".into(),
            width: 1024,
            height: 768,
            dpi: Some(96),
            audio_mimetypes: vec!["audio/L16".into()],
            video_mimetypes: vec![],
            image_mimetypes: vec!["image/png".into()],
            timezone: Some("UTC".into()),
            connect_args: vec!["password".into()],
        }
    }

    #[tokio::test]
    async fn connect_sends_handshake_group_in_order_and_reaches_waiting() {
        let (mut client, tunnel, _events) = harness();
        client.connect(None, connect_params()).await.unwrap();

        assert_eq!(client.state(), ClientState::Waiting);
        let sent = tunnel.sent.lock().unwrap();
        let opcodes: Vec<&str> = sent.iter().map(|(op, _)| op.as_str()).collect();
        assert_eq!(opcodes, vec!["select", "size", "audio", "video", "image", "timezone", "connect"]);
    }

    #[tokio::test]
    async fn outbound_guard_drops_events_before_waiting() {
        let (client, tunnel, _events) = harness();
        client.send_key_event(0xffe1, true);
        assert!(tunnel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_sync_promotes_to_connected_and_always_echoes() {
        let (mut client, tunnel, _events) = harness();
        client.connect(None, connect_params()).await.unwrap();
        tunnel.sent.lock().unwrap().clear();

        let mut queue = VecDeque::new();
        client.apply(ServerInstruction::Sync { timestamp: 42 }, &mut queue).await.unwrap();

        assert_eq!(client.state(), ClientState::Connected);
        let sent = tunnel.sent.lock().unwrap();
        assert_eq!(sent.last().unwrap().0, "sync");
    }

    #[tokio::test]
    async fn repeated_sync_with_same_timestamp_is_not_re_echoed() {
        let (mut client, tunnel, _events) = harness();
        client.connect(None, connect_params()).await.unwrap();

        let mut queue = VecDeque::new();
        client.apply(ServerInstruction::Sync { timestamp: 7 }, &mut queue).await.unwrap();
        tunnel.sent.lock().unwrap().clear();
        client.apply(ServerInstruction::Sync { timestamp: 7 }, &mut queue).await.unwrap();

        assert!(tunnel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mouse_instruction_forwards_cursor_hotspot_to_display() {
        let (mut client, _tunnel, _events) = harness();
        let positions = Arc::new(Mutex::new(Vec::new()));
        client.sinks.display = Box::new(RecordingDisplaySink { cursor_positions: positions.clone() });

        let mut queue = VecDeque::new();
        client.apply(ServerInstruction::Mouse { x: 12, y: 34 }, &mut queue).await.unwrap();

        assert_eq!(*positions.lock().unwrap(), vec![(12, 34)]);
    }

    #[tokio::test]
    async fn nest_feeds_inner_instructions_back_through_the_same_path() {
        let (mut client, _tunnel, _events) = harness();
        client.connect(None, connect_params()).await.unwrap();

        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        client.router_mut().set_listener(move |opcode, _| {
            if opcode == "nop" {
                flag.store(true, Ordering::SeqCst);
            }
        });

        client
            .process_raw(RawInstruction { opcode: "nest".into(), params: vec!["3".into(), "3.nop;".into()] })
            .await
            .unwrap();

        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn img_stream_accumulates_blobs_and_draws_on_end() {
        struct CapturingDisplay {
            drawn: Arc<Mutex<Option<String>>>,
        }
        impl DisplaySink for CapturingDisplay {
            fn image(&mut self, _channel_mask: i64, _layer: Layer, _mimetype: &str, _x: i64, _y: i64, base64_data: &str) {
                *self.drawn.lock().unwrap() = Some(base64_data.to_string());
            }
        }

        let (mut client, _tunnel, _events) = harness();
        let drawn = Arc::new(Mutex::new(None));
        client.sinks.display = Box::new(CapturingDisplay { drawn: drawn.clone() });

        let mut queue = VecDeque::new();
        client
            .apply(
                ServerInstruction::Img { stream: 5, channel_mask: 255, layer: 0, mimetype: "image/png".into(), x: 0, y: 0 },
                &mut queue,
            )
            .await
            .unwrap();
        client.apply(ServerInstruction::Blob { stream: 5, base64_data: "aGVs".into() }, &mut queue).await.unwrap();
        client.apply(ServerInstruction::Blob { stream: 5, base64_data: "bG8=".into() }, &mut queue).await.unwrap();
        client.apply(ServerInstruction::End { stream: 5 }, &mut queue).await.unwrap();

        assert_eq!(drawn.lock().unwrap().as_deref(), Some("aGVsbG8="));
    }

    #[tokio::test]
    async fn ack_routes_to_the_matching_output_stream() {
        let (mut client, _tunnel, _events) = harness();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let index = client.create_output_stream(move |status| seen2.lock().unwrap().push(status.clone()));

        let mut queue = VecDeque::new();
        client
            .apply(ServerInstruction::Ack { stream: index as i64, message: "ok".into(), code: 0 }, &mut queue)
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (mut client, tunnel, _events) = harness();
        client.connect(None, connect_params()).await.unwrap();
        client.disconnect();
        let count_after_first = tunnel.sent.lock().unwrap().len();
        client.disconnect();
        assert_eq!(tunnel.sent.lock().unwrap().len(), count_after_first);
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn filesystem_object_defined_notifies_sink_and_body_resolves_via_sink() {
        struct RecordingFilesystem {
            defined: Arc<Mutex<Vec<(i64, String)>>>,
            opened: Arc<Mutex<Vec<(i64, i64, String, String)>>>,
        }
        impl FilesystemSink for RecordingFilesystem {
            fn object_defined(&mut self, object: i64, name: &str) {
                self.defined.lock().unwrap().push((object, name.to_string()));
            }
            fn body_opened(&mut self, object: i64, stream: i64, mimetype: &str, name: &str) -> StreamHandlers {
                self.opened.lock().unwrap().push((object, stream, mimetype.to_string(), name.to_string()));
                None
            }
        }

        let (mut client, _tunnel, _events) = harness();
        client.connect(None, connect_params()).await.unwrap();

        let defined = Arc::new(Mutex::new(Vec::new()));
        let opened = Arc::new(Mutex::new(Vec::new()));
        client.sinks.filesystem = Box::new(RecordingFilesystem { defined: defined.clone(), opened: opened.clone() });

        let mut queue = VecDeque::new();
        client.apply(ServerInstruction::Filesystem { object: 1, name: "drive".into() }, &mut queue).await.unwrap();
        assert_eq!(*defined.lock().unwrap(), vec![(1, "drive".to_string())]);

        client.request_body(1, "index.html").unwrap();
        client
            .apply(
                ServerInstruction::Body { object: 1, stream: 9, mimetype: "text/html".into(), name: "index.html".into() },
                &mut queue,
            )
            .await
            .unwrap();

        assert_eq!(opened.lock().unwrap().len(), 1);
        assert_eq!(opened.lock().unwrap()[0].1, 9);
    }
}

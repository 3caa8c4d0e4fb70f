//! Consumer interfaces for subsystems that live outside this crate:
//! display rasterization, audio playback, clipboard, and virtual
//! filesystem UI.
//!
//! The client core depends only on these traits; it never implements
//! rendering, playback, or UI itself. Each comes with a `Null*`
//! implementation so the core and its tests can run without a real
//! consumer attached.

use tokio::sync::oneshot;

use crate::wire::instructions::{LineCap, LineJoin, Layer, RasterOp};

/// Called for every blob received on a stream a sink opted into.
pub type BlobHandler = Box<dyn FnMut(&str) + Send>;
/// Called once when a stream a sink opted into ends.
pub type EndHandler = Box<dyn FnOnce() + Send>;
/// What a sink hands back from a `*_opened` call to keep receiving that
/// stream's data: `None` means "notification only, not interested in the
/// bytes" (the default), matching this crate's stance that blob content
/// handling belongs to the subsystem, not the core.
pub type StreamHandlers = Option<(BlobHandler, EndHandler)>;

/// Receives typed calls for every drawing opcode, plus the cursor
/// hotspot carried by the server's `mouse` instruction and the flush
/// handshake the sync protocol depends on.
pub trait DisplaySink: Send {
    fn arc(&mut self, layer: Layer, x: i64, y: i64, radius: i64, start_angle: f64, end_angle: f64, negative: bool) {
        let _ = (layer, x, y, radius, start_angle, end_angle, negative);
    }
    fn cfill(&mut self, channel_mask: i64, layer: Layer, r: u8, g: u8, b: u8, a: u8) {
        let _ = (channel_mask, layer, r, g, b, a);
    }
    fn clip(&mut self, layer: Layer) {
        let _ = layer;
    }
    fn close(&mut self, layer: Layer) {
        let _ = layer;
    }
    #[allow(clippy::too_many_arguments)]
    fn copy(&mut self, src_layer: Layer, src_x: i64, src_y: i64, width: i64, height: i64, op: RasterOp, dst_layer: Layer, dst_x: i64, dst_y: i64) {
        let _ = (src_layer, src_x, src_y, width, height, op, dst_layer, dst_x, dst_y);
    }
    #[allow(clippy::too_many_arguments)]
    fn cstroke(&mut self, channel_mask: i64, layer: Layer, cap: LineCap, join: LineJoin, thickness: i64, r: u8, g: u8, b: u8, a: u8) {
        let _ = (channel_mask, layer, cap, join, thickness, r, g, b, a);
    }
    #[allow(clippy::too_many_arguments)]
    fn cursor(&mut self, layer: Layer, hotspot_x: i64, hotspot_y: i64, src_layer: Layer, src_x: i64, src_y: i64, width: i64, height: i64) {
        let _ = (layer, hotspot_x, hotspot_y, src_layer, src_x, src_y, width, height);
    }
    fn curve(&mut self, layer: Layer, cp1x: i64, cp1y: i64, cp2x: i64, cp2y: i64, x: i64, y: i64) {
        let _ = (layer, cp1x, cp1y, cp2x, cp2y, x, y);
    }
    fn dispose(&mut self, layer: Layer) {
        let _ = layer;
    }
    fn distort(&mut self, layer: Layer, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        let _ = (layer, a, b, c, d, e, f);
    }
    fn identity(&mut self, layer: Layer) {
        let _ = layer;
    }
    fn jpeg(&mut self, layer: Layer, x: i64, y: i64, base64_data: &str) {
        let _ = (layer, x, y, base64_data);
    }
    /// A stream opened by the server's `img` instruction finished
    /// accumulating blobs; `base64_data` is the full assembled payload,
    /// to be decoded and drawn exactly like an inline `png`/`jpeg` op.
    #[allow(clippy::too_many_arguments)]
    fn image(&mut self, channel_mask: i64, layer: Layer, mimetype: &str, x: i64, y: i64, base64_data: &str) {
        let _ = (channel_mask, layer, mimetype, x, y, base64_data);
    }
    fn lfill(&mut self, layer: Layer, src_layer: Layer) {
        let _ = (layer, src_layer);
    }
    fn line(&mut self, layer: Layer, x: i64, y: i64) {
        let _ = (layer, x, y);
    }
    fn lstroke(&mut self, layer: Layer, src_layer: Layer) {
        let _ = (layer, src_layer);
    }
    fn move_layer(&mut self, layer: Layer, parent: Layer, x: i64, y: i64, z: i64) {
        let _ = (layer, parent, x, y, z);
    }
    fn png(&mut self, layer: Layer, x: i64, y: i64, base64_data: &str) {
        let _ = (layer, x, y, base64_data);
    }
    fn pop(&mut self, layer: Layer) {
        let _ = layer;
    }
    fn push(&mut self, layer: Layer) {
        let _ = layer;
    }
    fn rect(&mut self, layer: Layer, x: i64, y: i64, width: i64, height: i64) {
        let _ = (layer, x, y, width, height);
    }
    fn reset(&mut self, layer: Layer) {
        let _ = layer;
    }
    fn set(&mut self, layer: Layer, name: &str, value: &str) {
        let _ = (layer, name, value);
    }
    fn shade(&mut self, layer: Layer, alpha: u8) {
        let _ = (layer, alpha);
    }
    fn size(&mut self, layer: Layer, width: i64, height: i64) {
        let _ = (layer, width, height);
    }
    fn start(&mut self, layer: Layer, x: i64, y: i64) {
        let _ = (layer, x, y);
    }
    #[allow(clippy::too_many_arguments)]
    fn transfer(&mut self, src_layer: Layer, src_x: i64, src_y: i64, width: i64, height: i64, op: RasterOp, dst_layer: Layer, dst_x: i64, dst_y: i64) {
        let _ = (src_layer, src_x, src_y, width, height, op, dst_layer, dst_x, dst_y);
    }
    fn transform(&mut self, layer: Layer, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        let _ = (layer, a, b, c, d, e, f);
    }

    /// The server's `mouse` instruction: move the rendered software
    /// cursor.
    fn cursor_hotspot(&mut self, x: i64, y: i64) {
        let _ = (x, y);
    }

    /// A `video` stream was opened targeting `layer`. Returning handlers
    /// opts into receiving the encoded video blobs for that layer.
    fn video_stream_opened(&mut self, stream: i64, layer: Layer, mimetype: &str) -> StreamHandlers {
        let _ = (stream, layer, mimetype);
        None
    }

    /// Requests that all drawing operations received so far be applied
    /// and rendered, signalling completion on `done`. The outbound
    /// `sync` reply waits for this to fire. A sink with nothing to
    /// flush can signal immediately.
    fn flush(&mut self, done: oneshot::Sender<()>) {
        let _ = done.send(());
    }
}

/// A `DisplaySink` that discards every call and flushes immediately.
#[derive(Debug, Default)]
pub struct NullDisplaySink;

impl DisplaySink for NullDisplaySink {}

/// Receives notice of new audio output streams from the server and the
/// sync timestamp, once the display has finished flushing.
pub trait AudioSink: Send {
    /// A new audio stream opened. Returning handlers opts into receiving
    /// its blobs/end; returning `None` (the default) only records that
    /// playback of `mimetype` was offered.
    fn stream_opened(&mut self, stream: i64, mimetype: &str) -> StreamHandlers {
        let _ = (stream, mimetype);
        None
    }
    fn notify_sync(&mut self, timestamp: i64) {
        let _ = timestamp;
    }
}

#[derive(Debug, Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {}

/// Receives notice of new clipboard streams, in either direction.
pub trait ClipboardSink: Send {
    fn stream_opened(&mut self, stream: i64, mimetype: &str) -> StreamHandlers {
        let _ = (stream, mimetype);
        None
    }
}

#[derive(Debug, Default)]
pub struct NullClipboardSink;

impl ClipboardSink for NullClipboardSink {}

/// Receives notice of inbound file transfers (the server's `file`
/// instruction).
pub trait FileSink: Send {
    fn stream_opened(&mut self, stream: i64, mimetype: &str, name: &str) -> StreamHandlers {
        let _ = (stream, mimetype, name);
        None
    }
}

#[derive(Debug, Default)]
pub struct NullFileSink;

impl FileSink for NullFileSink {}

/// Receives notice of inbound named pipes (the server's `pipe`
/// instruction).
pub trait PipeSink: Send {
    fn stream_opened(&mut self, stream: i64, mimetype: &str, name: &str) -> StreamHandlers {
        let _ = (stream, mimetype, name);
        None
    }
}

#[derive(Debug, Default)]
pub struct NullPipeSink;

impl PipeSink for NullPipeSink {}

/// Receives notice of server-exposed virtual filesystem objects, as
/// announced by the server's `filesystem` instruction, and the bodies
/// returned for `get` requests made against them.
pub trait FilesystemSink: Send {
    fn object_defined(&mut self, object: i64, name: &str) {
        let _ = (object, name);
    }

    /// A `body` arrived resolving some earlier `get`. Returning handlers
    /// opts into receiving the object's content.
    fn body_opened(&mut self, object: i64, stream: i64, mimetype: &str, name: &str) -> StreamHandlers {
        let _ = (object, stream, mimetype, name);
        None
    }
}

#[derive(Debug, Default)]
pub struct NullFilesystemSink;

impl FilesystemSink for NullFilesystemSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_display_sink_flushes_immediately() {
        let mut sink = NullDisplaySink;
        let (tx, mut rx) = oneshot::channel();
        sink.flush(tx);
        assert!(rx.try_recv().is_ok());
    }
}

//! Per-opcode handling: the typed counterpart to [`crate::router::Router`]'s
//! raw dispatch. `Client` matches on the parsed [`ServerInstruction`]
//! directly rather than registering closures on its own `Router` — doing
//! so would require handler closures to hold a mutable reference back
//! into the very `Client` that owns them.

use std::collections::VecDeque;

use super::{Client, ClientState, ImageStream};
use crate::status::{Status, StatusCode};
use crate::stream::object::BodyResponse;
use crate::wire::instructions::{self, ServerInstruction};
use crate::wire::RawInstruction;

impl Client {
    /// `queue` collects instructions produced by unwrapping a `nest`, so
    /// they get processed in the same pass as everything already queued,
    /// exactly as if they had arrived on the wire directly.
    pub(super) async fn apply(&mut self, instr: ServerInstruction, queue: &mut VecDeque<RawInstruction>) -> Result<(), super::ClientError> {
        use ServerInstruction::*;

        match instr {
            Args { params } => {
                tracing::trace!(?params, "server args");
            },
            Disconnect => {
                self.close();
            },
            Error { code, message } => {
                let status = Status::new(StatusCode::from_code(u16::try_from(code).unwrap_or(u16::MAX)), message);
                self.notify_error(&status);
                self.disconnect();
            },
            Log { message } => {
                tracing::debug!(target: "guac_client_core::server_log", "{message}");
            },
            Mouse { x, y } => {
                self.sinks.display.cursor_hotspot(x, y);
            },
            Nop => {},
            Ready { id } => {
                self.uuid = Some(id);
            },
            Sync { timestamp } => {
                let (done_tx, done_rx) = tokio::sync::oneshot::channel();
                self.sinks.display.flush(done_tx);
                let _ = done_rx.await;
                self.sinks.audio.notify_sync(timestamp);

                if self.state == ClientState::Waiting {
                    self.state = ClientState::Connected;
                }
                if timestamp != self.last_server_timestamp {
                    self.send_now(instructions::write::sync(timestamp))?;
                    self.last_server_timestamp = timestamp;
                }
            },
            Required { params } => {
                tracing::debug!(?params, "server requires additional connection parameters");
            },
            Name { name } => {
                tracing::debug!(%name, "server assigned connection name");
            },

            Audio { stream, mimetype } => {
                if let Some((on_blob, on_end)) = self.sinks.audio.stream_opened(stream, &mimetype) {
                    self.input.open(stream, on_blob, on_end);
                }
            },
            Clipboard { stream, mimetype } => {
                if let Some((on_blob, on_end)) = self.sinks.clipboard.stream_opened(stream, &mimetype) {
                    self.input.open(stream, on_blob, on_end);
                }
            },
            File { stream, mimetype, name } => {
                if let Some((on_blob, on_end)) = self.sinks.file.stream_opened(stream, &mimetype, &name) {
                    self.input.open(stream, on_blob, on_end);
                }
            },
            Pipe { stream, mimetype, name } => {
                if let Some((on_blob, on_end)) = self.sinks.pipe.stream_opened(stream, &mimetype, &name) {
                    self.input.open(stream, on_blob, on_end);
                }
            },
            Img { stream, channel_mask, layer, mimetype, x, y } => {
                self.image_streams.insert(
                    stream,
                    ImageStream { channel_mask, layer, mimetype, x, y, data: String::new() },
                );
            },
            Video { stream, layer, mimetype } => {
                if let Some((on_blob, on_end)) = self.sinks.display.video_stream_opened(stream, layer, &mimetype) {
                    self.input.open(stream, on_blob, on_end);
                }
            },
            Argv { stream, mimetype, name } => {
                // Dynamically-settable connection arguments are streamed
                // the same way a named pipe is; there is no dedicated
                // sink for them.
                if let Some((on_blob, on_end)) = self.sinks.pipe.stream_opened(stream, &mimetype, &name) {
                    self.input.open(stream, on_blob, on_end);
                }
            },
            Body { object, stream, mimetype, name } => {
                self.objects.body(object, &name, BodyResponse { stream, mimetype });
                self.drain_body_results();
            },

            Blob { stream, base64_data } => {
                if let Some(entry) = self.image_streams.get_mut(&stream) {
                    entry.data.push_str(&base64_data);
                } else {
                    self.input.blob(stream, &base64_data);
                }
            },
            End { stream } => {
                if let Some(entry) = self.image_streams.remove(&stream) {
                    self.sinks.display.image(entry.channel_mask, entry.layer, &entry.mimetype, entry.x, entry.y, &entry.data);
                } else {
                    self.input.end(stream);
                }
            },
            Ack { stream, message, code } => {
                if let Ok(index) = u32::try_from(stream) {
                    self.output.on_ack(index, &Status::new(StatusCode::from_code(code), message));
                }
            },
            Nest { parser_index, packet } => {
                let decoder = self.nested.entry(parser_index).or_default();
                let nested = decoder.receive(&packet)?;
                queue.extend(nested);
            },

            Filesystem { object, name } => {
                self.objects.define(object);
                self.sinks.filesystem.object_defined(object, &name);
            },
            Get { object, name } => {
                // The server requesting a body from a client-exposed
                // object (device redirection) is filesystem-UI territory
                // and out of this crate's scope; surfaced only via the
                // generic router listener.
                tracing::trace!(object, %name, "server requested a body from a client-exposed object");
            },
            Put { object, stream, mimetype, name } => {
                tracing::trace!(object, stream, %mimetype, %name, "server offered a writable stream into a client-exposed object");
            },
            Undefine { object } => {
                self.objects.undefine(object);
                self.drain_body_results();
            },

            Arc { layer, x, y, radius, start_angle, end_angle, negative } => {
                self.sinks.display.arc(layer, x, y, radius, start_angle, end_angle, negative);
            },
            Cfill { channel_mask, layer, r, g, b, a } => {
                self.sinks.display.cfill(channel_mask, layer, r, g, b, a);
            },
            Clip { layer } => {
                self.sinks.display.clip(layer);
            },
            Close { layer } => {
                self.sinks.display.close(layer);
            },
            Copy { src_layer, src_x, src_y, width, height, op, dst_layer, dst_x, dst_y } => {
                self.sinks.display.copy(src_layer, src_x, src_y, width, height, op, dst_layer, dst_x, dst_y);
            },
            Cstroke { channel_mask, layer, cap, join, thickness, r, g, b, a } => {
                self.sinks.display.cstroke(channel_mask, layer, cap, join, thickness, r, g, b, a);
            },
            Cursor { layer, hotspot_x, hotspot_y, src_layer, src_x, src_y, width, height } => {
                self.sinks.display.cursor(layer, hotspot_x, hotspot_y, src_layer, src_x, src_y, width, height);
            },
            Curve { layer, cp1x, cp1y, cp2x, cp2y, x, y } => {
                self.sinks.display.curve(layer, cp1x, cp1y, cp2x, cp2y, x, y);
            },
            Dispose { layer } => {
                self.sinks.display.dispose(layer);
            },
            Distort { layer, a, b, c, d, e, f } => {
                self.sinks.display.distort(layer, a, b, c, d, e, f);
            },
            Identity { layer } => {
                self.sinks.display.identity(layer);
            },
            Jpeg { layer, x, y, base64_data } => {
                self.sinks.display.jpeg(layer, x, y, &base64_data);
            },
            Lfill { layer, src_layer } => {
                self.sinks.display.lfill(layer, src_layer);
            },
            Line { layer, x, y } => {
                self.sinks.display.line(layer, x, y);
            },
            Lstroke { layer, src_layer } => {
                self.sinks.display.lstroke(layer, src_layer);
            },
            Move { layer, parent, x, y, z } => {
                self.sinks.display.move_layer(layer, parent, x, y, z);
            },
            Png { layer, x, y, base64_data } => {
                self.sinks.display.png(layer, x, y, &base64_data);
            },
            Pop { layer } => {
                self.sinks.display.pop(layer);
            },
            Push { layer } => {
                self.sinks.display.push(layer);
            },
            Rect { layer, x, y, width, height } => {
                self.sinks.display.rect(layer, x, y, width, height);
            },
            Reset { layer } => {
                self.sinks.display.reset(layer);
            },
            Set { layer, name, value } => {
                self.sinks.display.set(layer, &name, &value);
            },
            Shade { layer, alpha } => {
                self.sinks.display.shade(layer, alpha);
            },
            SizeLayer { layer, width, height } => {
                self.sinks.display.size(layer, width, height);
            },
            Start { layer, x, y } => {
                self.sinks.display.start(layer, x, y);
            },
            Transfer { src_layer, src_x, src_y, width, height, op, dst_layer, dst_x, dst_y } => {
                self.sinks.display.transfer(src_layer, src_x, src_y, width, height, op, dst_layer, dst_x, dst_y);
            },
            Transform { layer, a, b, c, d, e, f } => {
                self.sinks.display.transform(layer, a, b, c, d, e, f);
            },
        }

        Ok(())
    }
}

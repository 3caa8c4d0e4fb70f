//! The instruction catalog: a typed writer and parser for every opcode.
//! Unlike a string-keyed map of closures, unknown-at-compile-time
//! opcodes are not representable here — [`RawInstruction`]s that name an
//! opcode this crate doesn't recognize simply fail to parse into a
//! [`ServerInstruction`] and are left to the generic listener
//! ([`crate::router::Router`]).

use std::{error, fmt};

use super::decoder::RawInstruction;
use super::value::{parse_bool, parse_int, Value};

/// Line cap styles used by `cstroke`/`lstroke`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

impl LineCap {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Butt),
            1 => Some(Self::Round),
            2 => Some(Self::Square),
            _ => None,
        }
    }
}

/// Line join styles used by `cstroke`/`lstroke`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineJoin {
    Bevel,
    Miter,
    Round,
}

impl LineJoin {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Bevel),
            1 => Some(Self::Miter),
            2 => Some(Self::Round),
            _ => None,
        }
    }
}

/// The sixteen fixed raster operations selected by `transfer`/`copy`.
/// The codec preserves the function index verbatim; this enum is for
/// the display consumer's benefit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RasterOp {
    Black,
    And,
    AndInvDst,
    Src,
    AndInvSrc,
    Dest,
    Xor,
    Or,
    Nor,
    Xnor,
    InvDest,
    OrInvDst,
    InvSrc,
    OrInvSrc,
    Nand,
    White,
}

impl RasterOp {
    fn from_code(code: i64) -> Option<Self> {
        use RasterOp::*;
        Some(match code {
            0x0 => Black,
            0x1 => And,
            0x2 => AndInvDst,
            0x3 => Src,
            0x4 => AndInvSrc,
            0x5 => Dest,
            0x6 => Xor,
            0x7 => Or,
            0x8 => Nor,
            0x9 => Xnor,
            0xA => InvDest,
            0xB => OrInvDst,
            0xC => InvSrc,
            0xD => OrInvSrc,
            0xE => Nand,
            0xF => White,
            _ => return None,
        })
    }
}

/// A drawing-layer index: negative selects an off-screen buffer,
/// non-negative a visible layer.
pub type Layer = i64;

#[derive(Debug, Eq, PartialEq)]
pub enum CatalogError {
    /// Too few elements were present for the opcode's declared arity.
    Arity { opcode: String, expected: usize, got: usize },
    /// An element that should parse as an integer did not.
    BadInt { opcode: String, field: &'static str },
    /// An enumerated field (raster op, line cap/join) held an out-of-range
    /// code.
    BadEnum { opcode: String, field: &'static str },
}

impl error::Error for CatalogError {}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

fn want(raw: &RawInstruction, n: usize) -> Result<(), CatalogError> {
    if raw.params.len() < n {
        Err(CatalogError::Arity {
            opcode: raw.opcode.clone(),
            expected: n,
            got: raw.params.len(),
        })
    } else {
        Ok(())
    }
}

fn int(raw: &RawInstruction, field: &'static str, idx: usize) -> Result<i64, CatalogError> {
    parse_int(&raw.params[idx]).map_err(|_| CatalogError::BadInt {
        opcode: raw.opcode.clone(),
        field,
    })
}

fn text(raw: &RawInstruction, idx: usize) -> String {
    raw.params[idx].clone()
}

fn boolean(raw: &RawInstruction, idx: usize) -> bool {
    parse_bool(&raw.params[idx])
}

// ---------------------------------------------------------------------
// Outbound writers: client → server.
// ---------------------------------------------------------------------

/// Typed writers for every instruction this crate ever sends. Each
/// returns `(opcode, elements)`; pair with [`super::encoder::encode`] to
/// produce wire bytes.
pub mod write {
    use super::Value;

    pub fn select(protocol: &str) -> (&'static str, Vec<Value>) {
        ("select", vec![Value::from(protocol)])
    }

    pub fn size(width: i64, height: i64, dpi: Option<i64>) -> (&'static str, Vec<Value>) {
        let mut params = vec![Value::from(width), Value::from(height)];
        if let Some(dpi) = dpi {
            params.push(Value::from(dpi));
        }
        ("size", params)
    }

    pub fn audio(mimetypes: &[String]) -> (&'static str, Vec<Value>) {
        ("audio", mimetypes.iter().map(|s| Value::from(s.as_str())).collect())
    }

    pub fn video(mimetypes: &[String]) -> (&'static str, Vec<Value>) {
        ("video", mimetypes.iter().map(|s| Value::from(s.as_str())).collect())
    }

    pub fn image(mimetypes: &[String]) -> (&'static str, Vec<Value>) {
        ("image", mimetypes.iter().map(|s| Value::from(s.as_str())).collect())
    }

    pub fn timezone(tz: &str) -> (&'static str, Vec<Value>) {
        ("timezone", vec![Value::from(tz)])
    }

    pub fn connect(params: &[String]) -> (&'static str, Vec<Value>) {
        ("connect", params.iter().map(|s| Value::from(s.as_str())).collect())
    }

    pub fn disconnect() -> (&'static str, Vec<Value>) {
        ("disconnect", vec![])
    }

    pub fn nop() -> (&'static str, Vec<Value>) {
        ("nop", vec![])
    }

    pub fn sync(timestamp: i64) -> (&'static str, Vec<Value>) {
        ("sync", vec![Value::from(timestamp)])
    }

    pub fn key(keysym: i64, pressed: bool) -> (&'static str, Vec<Value>) {
        ("key", vec![Value::from(keysym), Value::from(pressed)])
    }

    pub fn mouse(x: i64, y: i64, button_mask: i64) -> (&'static str, Vec<Value>) {
        (
            "mouse",
            vec![Value::from(x), Value::from(y), Value::from(button_mask)],
        )
    }

    pub fn blob(stream: i64, base64_data: &str) -> (&'static str, Vec<Value>) {
        ("blob", vec![Value::from(stream), Value::from(base64_data)])
    }

    pub fn end(stream: i64) -> (&'static str, Vec<Value>) {
        ("end", vec![Value::from(stream)])
    }

    /// `code` is sent as its numeric status value.
    pub fn ack(stream: i64, message: &str, code: u16) -> (&'static str, Vec<Value>) {
        (
            "ack",
            vec![Value::from(stream), Value::from(message), Value::from(code as i64)],
        )
    }

    pub fn audio_stream(stream: i64, mimetype: &str) -> (&'static str, Vec<Value>) {
        ("audio", vec![Value::from(stream), Value::from(mimetype)])
    }

    pub fn clipboard_stream(stream: i64, mimetype: &str) -> (&'static str, Vec<Value>) {
        ("clipboard", vec![Value::from(stream), Value::from(mimetype)])
    }

    pub fn file_stream(stream: i64, mimetype: &str, name: &str) -> (&'static str, Vec<Value>) {
        (
            "file",
            vec![Value::from(stream), Value::from(mimetype), Value::from(name)],
        )
    }

    pub fn pipe_stream(stream: i64, mimetype: &str, name: &str) -> (&'static str, Vec<Value>) {
        (
            "pipe",
            vec![Value::from(stream), Value::from(mimetype), Value::from(name)],
        )
    }

    pub fn argv_stream(stream: i64, mimetype: &str, name: &str) -> (&'static str, Vec<Value>) {
        (
            "argv",
            vec![Value::from(stream), Value::from(mimetype), Value::from(name)],
        )
    }

    /// Field order: `(stream, channel_mask, layer, mimetype, x, y)`.
    pub fn img_stream(
        stream: i64,
        channel_mask: i64,
        layer: i64,
        mimetype: &str,
        x: i64,
        y: i64,
    ) -> (&'static str, Vec<Value>) {
        (
            "img",
            vec![
                Value::from(stream),
                Value::from(channel_mask),
                Value::from(layer),
                Value::from(mimetype),
                Value::from(x),
                Value::from(y),
            ],
        )
    }

    pub fn nest(parser_index: i64, packet: &str) -> (&'static str, Vec<Value>) {
        ("nest", vec![Value::from(parser_index), Value::from(packet)])
    }

    pub fn get(object: i64, name: &str) -> (&'static str, Vec<Value>) {
        ("get", vec![Value::from(object), Value::from(name)])
    }

    pub fn put(object: i64, stream: i64, mimetype: &str, name: &str) -> (&'static str, Vec<Value>) {
        (
            "put",
            vec![
                Value::from(object),
                Value::from(stream),
                Value::from(mimetype),
                Value::from(name),
            ],
        )
    }
}

// ---------------------------------------------------------------------
// Inbound parsing: server → client.
// ---------------------------------------------------------------------

/// Every instruction the client may receive from the server, already
/// parsed into typed fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerInstruction {
    // Server handshake
    Args { params: Vec<String> },
    // Server control
    Disconnect,
    Error { code: i64, message: String },
    Log { message: String },
    Mouse { x: i64, y: i64 },
    Nop,
    Ready { id: String },
    Sync { timestamp: i64 },
    Required { params: Vec<String> },
    Name { name: String },

    // Streaming: allocating instructions
    Audio { stream: i64, mimetype: String },
    Clipboard { stream: i64, mimetype: String },
    File { stream: i64, mimetype: String, name: String },
    Pipe { stream: i64, mimetype: String, name: String },
    Img { stream: i64, channel_mask: i64, layer: Layer, mimetype: String, x: i64, y: i64 },
    Video { stream: i64, layer: Layer, mimetype: String },
    Argv { stream: i64, mimetype: String, name: String },
    Body { object: i64, stream: i64, mimetype: String, name: String },

    // Streaming: blob lifecycle
    Blob { stream: i64, base64_data: String },
    End { stream: i64 },
    Ack { stream: i64, message: String, code: u16 },
    Nest { parser_index: i64, packet: String },

    // Object management
    Filesystem { object: i64, name: String },
    Get { object: i64, name: String },
    Put { object: i64, stream: i64, mimetype: String, name: String },
    Undefine { object: i64 },

    // Drawing
    Arc { layer: Layer, x: i64, y: i64, radius: i64, start_angle: f64, end_angle: f64, negative: bool },
    Cfill { channel_mask: i64, layer: Layer, r: u8, g: u8, b: u8, a: u8 },
    Clip { layer: Layer },
    Close { layer: Layer },
    Copy { src_layer: Layer, src_x: i64, src_y: i64, width: i64, height: i64, op: RasterOp, dst_layer: Layer, dst_x: i64, dst_y: i64 },
    Cstroke { channel_mask: i64, layer: Layer, cap: LineCap, join: LineJoin, thickness: i64, r: u8, g: u8, b: u8, a: u8 },
    Cursor { layer: Layer, hotspot_x: i64, hotspot_y: i64, src_layer: Layer, src_x: i64, src_y: i64, width: i64, height: i64 },
    Curve { layer: Layer, cp1x: i64, cp1y: i64, cp2x: i64, cp2y: i64, x: i64, y: i64 },
    Dispose { layer: Layer },
    Distort { layer: Layer, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64 },
    Identity { layer: Layer },
    Jpeg { layer: Layer, x: i64, y: i64, base64_data: String },
    Lfill { layer: Layer, src_layer: Layer },
    Line { layer: Layer, x: i64, y: i64 },
    Lstroke { layer: Layer, src_layer: Layer },
    Move { layer: Layer, parent: Layer, x: i64, y: i64, z: i64 },
    Png { layer: Layer, x: i64, y: i64, base64_data: String },
    Pop { layer: Layer },
    Push { layer: Layer },
    Rect { layer: Layer, x: i64, y: i64, width: i64, height: i64 },
    Reset { layer: Layer },
    Set { layer: Layer, name: String, value: String },
    Shade { layer: Layer, alpha: u8 },
    SizeLayer { layer: Layer, width: i64, height: i64 },
    Start { layer: Layer, x: i64, y: i64 },
    Transfer { src_layer: Layer, src_x: i64, src_y: i64, width: i64, height: i64, op: RasterOp, dst_layer: Layer, dst_x: i64, dst_y: i64 },
    Transform { layer: Layer, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64 },
}

fn f64_field(raw: &RawInstruction, field: &'static str, idx: usize) -> Result<f64, CatalogError> {
    raw.params[idx].parse().map_err(|_| CatalogError::BadInt {
        opcode: raw.opcode.clone(),
        field,
    })
}

fn u8_field(raw: &RawInstruction, field: &'static str, idx: usize) -> Result<u8, CatalogError> {
    let v = int(raw, field, idx)?;
    u8::try_from(v).map_err(|_| CatalogError::BadInt {
        opcode: raw.opcode.clone(),
        field,
    })
}

/// Parses a raw inbound instruction into its typed form. Returns `Ok(None)`
/// for opcodes this catalog doesn't recognize — the router still invokes
/// the generic listener for these.
pub fn parse(raw: &RawInstruction) -> Result<Option<ServerInstruction>, CatalogError> {
    use ServerInstruction::*;

    Ok(Some(match raw.opcode.as_str() {
        "args" => Args { params: raw.params.clone() },
        "disconnect" => Disconnect,
        "error" => {
            want(raw, 2)?;
            Error { message: text(raw, 0), code: int(raw, "code", 1)? }
        },
        "log" => {
            want(raw, 1)?;
            Log { message: text(raw, 0) }
        },
        "mouse" => {
            want(raw, 2)?;
            Mouse { x: int(raw, "x", 0)?, y: int(raw, "y", 1)? }
        },
        "nop" => Nop,
        "ready" => {
            want(raw, 1)?;
            Ready { id: text(raw, 0) }
        },
        "sync" => {
            want(raw, 1)?;
            Sync { timestamp: int(raw, "timestamp", 0)? }
        },
        "required" => Required { params: raw.params.clone() },
        "name" => {
            want(raw, 1)?;
            Name { name: text(raw, 0) }
        },

        "audio" => {
            want(raw, 2)?;
            Audio { stream: int(raw, "stream", 0)?, mimetype: text(raw, 1) }
        },
        "clipboard" => {
            want(raw, 2)?;
            Clipboard { stream: int(raw, "stream", 0)?, mimetype: text(raw, 1) }
        },
        "file" => {
            want(raw, 3)?;
            File { stream: int(raw, "stream", 0)?, mimetype: text(raw, 1), name: text(raw, 2) }
        },
        "pipe" => {
            want(raw, 3)?;
            Pipe { stream: int(raw, "stream", 0)?, mimetype: text(raw, 1), name: text(raw, 2) }
        },
        "img" => {
            want(raw, 6)?;
            Img {
                stream: int(raw, "stream", 0)?,
                channel_mask: int(raw, "channel_mask", 1)?,
                layer: int(raw, "layer", 2)?,
                mimetype: text(raw, 3),
                x: int(raw, "x", 4)?,
                y: int(raw, "y", 5)?,
            }
        },
        "video" => {
            want(raw, 3)?;
            Video { stream: int(raw, "stream", 0)?, layer: int(raw, "layer", 1)?, mimetype: text(raw, 2) }
        },
        "argv" => {
            want(raw, 3)?;
            Argv { stream: int(raw, "stream", 0)?, mimetype: text(raw, 1), name: text(raw, 2) }
        },
        "body" => {
            want(raw, 4)?;
            Body {
                object: int(raw, "object", 0)?,
                stream: int(raw, "stream", 1)?,
                mimetype: text(raw, 2),
                name: text(raw, 3),
            }
        },

        "blob" => {
            want(raw, 2)?;
            Blob { stream: int(raw, "stream", 0)?, base64_data: text(raw, 1) }
        },
        "end" => {
            want(raw, 1)?;
            End { stream: int(raw, "stream", 0)? }
        },
        "ack" => {
            want(raw, 3)?;
            Ack {
                stream: int(raw, "stream", 0)?,
                message: text(raw, 1),
                code: u16::try_from(int(raw, "code", 2)?).map_err(|_| CatalogError::BadInt {
                    opcode: raw.opcode.clone(),
                    field: "code",
                })?,
            }
        },
        "nest" => {
            want(raw, 2)?;
            Nest { parser_index: int(raw, "parser_index", 0)?, packet: text(raw, 1) }
        },

        "filesystem" => {
            want(raw, 2)?;
            Filesystem { object: int(raw, "object", 0)?, name: text(raw, 1) }
        },
        "get" => {
            want(raw, 2)?;
            Get { object: int(raw, "object", 0)?, name: text(raw, 1) }
        },
        "put" => {
            want(raw, 4)?;
            Put {
                object: int(raw, "object", 0)?,
                stream: int(raw, "stream", 1)?,
                mimetype: text(raw, 2),
                name: text(raw, 3),
            }
        },
        "undefine" => {
            want(raw, 1)?;
            Undefine { object: int(raw, "object", 0)? }
        },

        "arc" => {
            want(raw, 7)?;
            Arc {
                layer: int(raw, "layer", 0)?,
                x: int(raw, "x", 1)?,
                y: int(raw, "y", 2)?,
                radius: int(raw, "radius", 3)?,
                start_angle: f64_field(raw, "start_angle", 4)?,
                end_angle: f64_field(raw, "end_angle", 5)?,
                negative: boolean(raw, 6),
            }
        },
        "cfill" => {
            want(raw, 6)?;
            Cfill {
                channel_mask: int(raw, "channel_mask", 0)?,
                layer: int(raw, "layer", 1)?,
                r: u8_field(raw, "r", 2)?,
                g: u8_field(raw, "g", 3)?,
                b: u8_field(raw, "b", 4)?,
                a: u8_field(raw, "a", 5)?,
            }
        },
        "clip" => {
            want(raw, 1)?;
            Clip { layer: int(raw, "layer", 0)? }
        },
        "close" => {
            want(raw, 1)?;
            Close { layer: int(raw, "layer", 0)? }
        },
        "copy" => {
            want(raw, 9)?;
            Copy {
                src_layer: int(raw, "src_layer", 0)?,
                src_x: int(raw, "src_x", 1)?,
                src_y: int(raw, "src_y", 2)?,
                width: int(raw, "width", 3)?,
                height: int(raw, "height", 4)?,
                op: RasterOp::from_code(int(raw, "op", 5)?).ok_or_else(|| CatalogError::BadEnum {
                    opcode: raw.opcode.clone(),
                    field: "op",
                })?,
                dst_layer: int(raw, "dst_layer", 6)?,
                dst_x: int(raw, "dst_x", 7)?,
                dst_y: int(raw, "dst_y", 8)?,
            }
        },
        "cstroke" => {
            want(raw, 9)?;
            Cstroke {
                channel_mask: int(raw, "channel_mask", 0)?,
                layer: int(raw, "layer", 1)?,
                cap: LineCap::from_code(int(raw, "cap", 2)?).ok_or_else(|| CatalogError::BadEnum {
                    opcode: raw.opcode.clone(),
                    field: "cap",
                })?,
                join: LineJoin::from_code(int(raw, "join", 3)?).ok_or_else(|| CatalogError::BadEnum {
                    opcode: raw.opcode.clone(),
                    field: "join",
                })?,
                thickness: int(raw, "thickness", 4)?,
                r: u8_field(raw, "r", 5)?,
                g: u8_field(raw, "g", 6)?,
                b: u8_field(raw, "b", 7)?,
                a: u8_field(raw, "a", 8)?,
            }
        },
        "cursor" => {
            want(raw, 8)?;
            Cursor {
                layer: int(raw, "layer", 0)?,
                hotspot_x: int(raw, "hotspot_x", 1)?,
                hotspot_y: int(raw, "hotspot_y", 2)?,
                src_layer: int(raw, "src_layer", 3)?,
                src_x: int(raw, "src_x", 4)?,
                src_y: int(raw, "src_y", 5)?,
                width: int(raw, "width", 6)?,
                height: int(raw, "height", 7)?,
            }
        },
        "curve" => {
            want(raw, 7)?;
            Curve {
                layer: int(raw, "layer", 0)?,
                cp1x: int(raw, "cp1x", 1)?,
                cp1y: int(raw, "cp1y", 2)?,
                cp2x: int(raw, "cp2x", 3)?,
                cp2y: int(raw, "cp2y", 4)?,
                x: int(raw, "x", 5)?,
                y: int(raw, "y", 6)?,
            }
        },
        "dispose" => {
            want(raw, 1)?;
            Dispose { layer: int(raw, "layer", 0)? }
        },
        "distort" => {
            want(raw, 7)?;
            Distort {
                layer: int(raw, "layer", 0)?,
                a: f64_field(raw, "a", 1)?,
                b: f64_field(raw, "b", 2)?,
                c: f64_field(raw, "c", 3)?,
                d: f64_field(raw, "d", 4)?,
                e: f64_field(raw, "e", 5)?,
                f: f64_field(raw, "f", 6)?,
            }
        },
        "identity" => {
            want(raw, 1)?;
            Identity { layer: int(raw, "layer", 0)? }
        },
        "jpeg" => {
            want(raw, 4)?;
            Jpeg {
                layer: int(raw, "layer", 0)?,
                x: int(raw, "x", 1)?,
                y: int(raw, "y", 2)?,
                base64_data: text(raw, 3),
            }
        },
        "lfill" => {
            want(raw, 2)?;
            Lfill { layer: int(raw, "layer", 0)?, src_layer: int(raw, "src_layer", 1)? }
        },
        "line" => {
            want(raw, 3)?;
            Line { layer: int(raw, "layer", 0)?, x: int(raw, "x", 1)?, y: int(raw, "y", 2)? }
        },
        "lstroke" => {
            want(raw, 2)?;
            Lstroke { layer: int(raw, "layer", 0)?, src_layer: int(raw, "src_layer", 1)? }
        },
        "move" => {
            want(raw, 5)?;
            Move {
                layer: int(raw, "layer", 0)?,
                parent: int(raw, "parent", 1)?,
                x: int(raw, "x", 2)?,
                y: int(raw, "y", 3)?,
                z: int(raw, "z", 4)?,
            }
        },
        "png" => {
            want(raw, 4)?;
            Png {
                layer: int(raw, "layer", 0)?,
                x: int(raw, "x", 1)?,
                y: int(raw, "y", 2)?,
                base64_data: text(raw, 3),
            }
        },
        "pop" => {
            want(raw, 1)?;
            Pop { layer: int(raw, "layer", 0)? }
        },
        "push" => {
            want(raw, 1)?;
            Push { layer: int(raw, "layer", 0)? }
        },
        "rect" => {
            want(raw, 5)?;
            Rect {
                layer: int(raw, "layer", 0)?,
                x: int(raw, "x", 1)?,
                y: int(raw, "y", 2)?,
                width: int(raw, "width", 3)?,
                height: int(raw, "height", 4)?,
            }
        },
        "reset" => {
            want(raw, 1)?;
            Reset { layer: int(raw, "layer", 0)? }
        },
        "set" => {
            want(raw, 3)?;
            Set { layer: int(raw, "layer", 0)?, name: text(raw, 1), value: text(raw, 2) }
        },
        "shade" => {
            want(raw, 2)?;
            Shade { layer: int(raw, "layer", 0)?, alpha: u8_field(raw, "alpha", 1)? }
        },
        "size" => {
            want(raw, 3)?;
            SizeLayer {
                layer: int(raw, "layer", 0)?,
                width: int(raw, "width", 1)?,
                height: int(raw, "height", 2)?,
            }
        },
        "start" => {
            want(raw, 3)?;
            Start { layer: int(raw, "layer", 0)?, x: int(raw, "x", 1)?, y: int(raw, "y", 2)? }
        },
        "transfer" => {
            want(raw, 9)?;
            Transfer {
                src_layer: int(raw, "src_layer", 0)?,
                src_x: int(raw, "src_x", 1)?,
                src_y: int(raw, "src_y", 2)?,
                width: int(raw, "width", 3)?,
                height: int(raw, "height", 4)?,
                op: RasterOp::from_code(int(raw, "op", 5)?).ok_or_else(|| CatalogError::BadEnum {
                    opcode: raw.opcode.clone(),
                    field: "op",
                })?,
                dst_layer: int(raw, "dst_layer", 6)?,
                dst_x: int(raw, "dst_x", 7)?,
                dst_y: int(raw, "dst_y", 8)?,
            }
        },
        "transform" => {
            want(raw, 7)?;
            Transform {
                layer: int(raw, "layer", 0)?,
                a: f64_field(raw, "a", 1)?,
                b: f64_field(raw, "b", 2)?,
                c: f64_field(raw, "c", 3)?,
                d: f64_field(raw, "d", 4)?,
                e: f64_field(raw, "e", 5)?,
                f: f64_field(raw, "f", 6)?,
            }
        },

        _ => return Ok(None),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(opcode: &str, params: &[&str]) -> RawInstruction {
        RawInstruction {
            opcode: opcode.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn parses_img_in_canonical_order() {
        let got = parse(&raw("img", &["1", "14", "0", "image/png", "35", "76"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            got,
            ServerInstruction::Img {
                stream: 1,
                channel_mask: 14,
                layer: 0,
                mimetype: "image/png".to_string(),
                x: 35,
                y: 76,
            }
        );
    }

    #[test]
    fn parses_numeric_ack_status() {
        let got = parse(&raw("ack", &["3", "done", "0"])).unwrap().unwrap();
        assert_eq!(
            got,
            ServerInstruction::Ack { stream: 3, message: "done".to_string(), code: 0 }
        );
    }

    #[test]
    fn unknown_opcode_parses_to_none() {
        assert_eq!(parse(&raw("frobnicate", &["1"])).unwrap(), None);
    }

    #[test]
    fn short_arity_is_an_error() {
        let err = parse(&raw("sync", &[])).unwrap_err();
        assert!(matches!(err, CatalogError::Arity { .. }));
    }

    #[test]
    fn writes_mouse_event() {
        let (opcode, params) = write::mouse(100, 200, 5);
        assert_eq!(opcode, "mouse");
        assert_eq!(
            params,
            vec![Value::from(100i64), Value::from(200i64), Value::from(5i64)]
        );
    }

    #[test]
    fn writes_key_event_with_canonical_bool() {
        let (_, params) = write::key(0xffe1, true);
        assert_eq!(params[1].render(), "1");
    }

    #[test]
    fn rejects_out_of_range_raster_op() {
        let err = parse(&raw(
            "transfer",
            &["0", "0", "0", "1", "1", "16", "1", "0", "0"],
        ))
        .unwrap_err();
        assert!(matches!(err, CatalogError::BadEnum { .. }));
    }
}

//! Typed readers and writers layered over raw blob/end traffic on a
//! stream, matching the library's stance that the stream managers treat
//! blob payloads as opaque text — decoding happens here, not in
//! `InputManager`/`OutputManager`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;

/// Accumulates a sequence of base64 blobs and UTF-8-decodes the
/// concatenated payload once the stream ends.
#[derive(Default)]
pub struct TextReader {
    encoded: String,
}

impl TextReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_blob(&mut self, base64_data: &str) {
        self.encoded.push_str(base64_data);
    }

    /// Decodes everything received so far. Returns `None` on malformed
    /// base64 or non-UTF-8 bytes.
    pub fn finish(self) -> Option<String> {
        let bytes = BASE64.decode(self.encoded).ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Fragments UTF-8 text into base64 blobs suitable for `wire::instructions::write::blob`.
pub struct TextWriter {
    chunk_size: usize,
}

impl TextWriter {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Splits `text`'s UTF-8 bytes into base64-encoded chunks, each
    /// decoding back to at most `chunk_size` raw bytes.
    pub fn chunks(&self, text: &str) -> Vec<String> {
        text.as_bytes()
            .chunks(self.chunk_size.max(1))
            .map(|c| BASE64.encode(c))
            .collect()
    }
}

/// Yields raw decoded bytes per blob, without buffering across blobs.
#[derive(Default)]
pub struct BlobReader;

impl BlobReader {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, base64_data: &str) -> Result<Bytes, base64::DecodeError> {
        BASE64.decode(base64_data).map(Bytes::from)
    }
}

/// Chunks an in-memory byte buffer into base64 blob elements of a bounded
/// pre-encoding size.
pub struct ArrayBufferWriter {
    chunk_size: usize,
}

impl ArrayBufferWriter {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn chunks(&self, data: &[u8]) -> Vec<String> {
        data.chunks(self.chunk_size.max(1))
            .map(|chunk| BASE64.encode(chunk))
            .collect()
    }
}

/// Alias matching the naming a subsystem expects when it frames raw
/// binary data rather than an in-memory array buffer — the chunking
/// logic is identical.
pub type BlobWriter = ArrayBufferWriter;

/// Accumulates base64 blobs and parses the assembled text as JSON once
/// the stream ends.
#[derive(Default)]
pub struct JsonReader {
    text: TextReader,
}

impl JsonReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_blob(&mut self, base64_data: &str) {
        self.text.on_blob(base64_data);
    }

    pub fn finish(self) -> Result<serde_json::Value, JsonReaderError> {
        let text = self.text.finish().ok_or(JsonReaderError::Encoding)?;
        serde_json::from_str(&text).map_err(JsonReaderError::Parse)
    }
}

#[derive(Debug)]
pub enum JsonReaderError {
    Encoding,
    Parse(serde_json::Error),
}

impl std::fmt::Display for JsonReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonReaderError::Encoding => write!(f, "blob stream was not valid base64/UTF-8"),
            JsonReaderError::Parse(e) => write!(f, "invalid JSON: {e}"),
        }
    }
}

impl std::error::Error for JsonReaderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_reader_reassembles_across_blobs() {
        let mut r = TextReader::new();
        r.on_blob(&BASE64.encode(b"hello "));
        r.on_blob(&BASE64.encode(b"world"));
        assert_eq!(r.finish().unwrap(), "hello world");
    }

    #[test]
    fn text_writer_round_trips_through_blob_reader() {
        let writer = TextWriter::new(4);
        let chunks = writer.chunks("hello world");
        assert!(chunks.len() > 1);

        let reader = BlobReader::new();
        let mut reassembled = Vec::new();
        for chunk in &chunks {
            reassembled.extend_from_slice(&reader.decode(chunk).unwrap());
        }
        assert_eq!(reassembled, b"hello world");
    }

    #[test]
    fn array_buffer_writer_respects_chunk_size() {
        let writer = ArrayBufferWriter::new(2);
        let chunks = writer.chunks(&[1, 2, 3, 4, 5]);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn json_reader_parses_assembled_payload() {
        let mut r = JsonReader::new();
        for blob in TextWriter::new(4096).chunks(r#"{"a":1}"#) {
            r.on_blob(&blob);
        }
        let value = r.finish().unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn json_reader_reports_parse_errors() {
        let mut r = JsonReader::new();
        r.on_blob(&BASE64.encode(b"not json"));
        assert!(matches!(r.finish(), Err(JsonReaderError::Parse(_))));
    }
}

//! Incremental decoder for the Guacamole wire format.
//!
//! Lengths in the wire format count Unicode code points, not UTF-16 code
//! units or UTF-8 bytes, so the decoder's buffer is code-point addressed
//! (`Vec<char>`) rather than the `BytesMut` a byte-oriented codec would
//! use.

use std::{error, fmt};

/// An instruction as it comes off the wire: an opcode and its raw,
/// still-textual parameters. Typed parsing into instruction-specific
/// arguments happens one layer up, in [`crate::wire::instructions`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawInstruction {
    pub opcode: String,
    pub params: Vec<String>,
}

/// Buffer compaction threshold: once the consumed prefix grows past
/// this, it is dropped instead of retained indefinitely.
const COMPACT_THRESHOLD: usize = 4096;

/// A decoder for a stream of Guacamole protocol instructions.
///
/// Mirrors the state a single connection's inbound decode needs: the
/// accumulated unconsumed characters, the position of the terminator of
/// the element currently being scanned (`-1` while scanning a length),
/// the position the next length/value starts at, and the elements
/// collected for the instruction in progress.
#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<char>,
    /// `-1` (represented as `None`) while scanning for a length; otherwise
    /// the index of the element's terminator byte.
    element_end: Option<usize>,
    start_index: usize,
    elements: Vec<String>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `chunk` to the decoder, returning every instruction that
    /// became fully framed as a result, in wire order.
    ///
    /// On a framing error the decoder has already dispatched whatever
    /// instructions preceded the bad element; the error is fatal to the
    /// connection and the decoder must not be fed further data
    /// afterwards.
    pub fn receive(&mut self, chunk: &str) -> Result<Vec<RawInstruction>, Error> {
        self.compact_if_needed();
        self.buffer.extend(chunk.chars());

        let mut out = Vec::new();
        loop {
            let Some(ee) = self.element_end else {
                if !self.scan_length()? {
                    break; // awaiting more data
                }
                continue;
            };

            if ee >= self.buffer.len() {
                break; // awaiting more data for the element's value
            }

            if ee < self.start_index {
                // terminator position trails the current scan origin: this
                // only happens transiently right after a comma-terminated
                // element, and scan_length() will re-derive it.
                if !self.scan_length()? {
                    break;
                }
                continue;
            }

            let element: String = self.buffer[self.start_index..ee].iter().collect();
            let terminator = self.buffer[ee];
            self.elements.push(element);

            match terminator {
                ';' => {
                    let mut elems = std::mem::take(&mut self.elements);
                    let opcode = elems.remove(0);
                    out.push(RawInstruction {
                        opcode,
                        params: elems,
                    });
                    self.buffer.drain(0..=ee);
                    self.start_index = 0;
                    self.element_end = None;
                },
                ',' => {
                    self.start_index = ee + 1;
                    // element_end deliberately left at `ee`: the next loop
                    // iteration sees `ee < start_index` and re-scans a
                    // fresh length on the next iteration.
                },
                _ => return Err(Error::IllegalTerminator),
            }
        }

        Ok(out)
    }

    fn compact_if_needed(&mut self) {
        if self.start_index > COMPACT_THRESHOLD
            && self.element_end.is_some_and(|ee| ee >= self.start_index)
        {
            self.buffer.drain(0..self.start_index);
            self.element_end = self.element_end.map(|ee| ee - self.start_index);
            self.start_index = 0;
        }
    }

    /// Attempts to locate the `.` separating a length from its value,
    /// starting at `start_index`. Returns `Ok(true)` if a length was
    /// parsed and `element_end` advanced, `Ok(false)` if more data is
    /// needed, `Err` if the digits aren't a valid length.
    fn scan_length(&mut self) -> Result<bool, Error> {
        let Some(rel_dot) = self.buffer[self.start_index..].iter().position(|&c| c == '.') else {
            self.start_index = self.buffer.len();
            return Ok(false);
        };
        let dot_index = self.start_index + rel_dot;

        let digits: String = self.buffer[self.start_index..dot_index].iter().collect();
        let length: usize = digits.parse().map_err(|_| Error::NonNumericLength)?;

        self.start_index = dot_index + 1;
        self.element_end = Some(self.start_index + length);
        Ok(true)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    IllegalTerminator,
    NonNumericLength,
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(opcode: &str, params: &[&str]) -> RawInstruction {
        RawInstruction {
            opcode: opcode.to_owned(),
            params: params.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn decodes_a_single_instruction() {
        let mut d = Decoder::new();
        let got = d.receive("4.sync,8.53463888;").unwrap();
        assert_eq!(got, vec![raw("sync", &["53463888"])]);
    }

    #[test]
    fn decodes_empty_opcode() {
        let mut d = Decoder::new();
        let got = d.receive("0.,1.8;").unwrap();
        assert_eq!(got, vec![raw("", &["8"])]);
    }

    #[test]
    fn decodes_img_blob_end_sequence() {
        let mut d = Decoder::new();
        let input = "3.img,1.1,2.14,1.0,9.image/png,2.35,2.76;\
                      4.blob,1.1,4.YWJj;\
                      3.end,1.1;";
        let got = d.receive(input).unwrap();
        assert_eq!(
            got,
            vec![
                raw("img", &["1", "14", "0", "image/png", "35", "76"]),
                raw("blob", &["1", "YWJj"]),
                raw("end", &["1"]),
            ]
        );
    }

    #[test]
    fn chunking_is_invariant_over_arbitrary_splits() {
        let whole = "5.mouse,3.100,3.200,1.5;4.sync,1.7;0.,0.;";
        let mut baseline = Decoder::new();
        let expect = baseline.receive(whole).unwrap();

        // Split the input at every character boundary and confirm the
        // dispatched sequence never changes regardless of how chunks
        // are cut.
        for split in 0..=whole.chars().count() {
            let chars: Vec<char> = whole.chars().collect();
            let (a, b): (String, String) = (
                chars[..split].iter().collect(),
                chars[split..].iter().collect(),
            );
            let mut d = Decoder::new();
            let mut got = d.receive(&a).unwrap();
            got.extend(d.receive(&b).unwrap());
            assert_eq!(got, expect, "split at {split} produced different output");
        }
    }

    #[test]
    fn tolerates_byte_at_a_time_feeding() {
        let whole = "3.img,1.1,2.14,1.0,9.image/png,2.35,2.76;";
        let mut d = Decoder::new();
        let mut got = Vec::new();
        for ch in whole.chars() {
            got.extend(d.receive(&ch.to_string()).unwrap());
        }
        assert_eq!(got, vec![raw("img", &["1", "14", "0", "image/png", "35", "76"])]);
    }

    #[test]
    fn counts_code_points_not_bytes() {
        // "héllo" is 5 code points but 6 UTF-8 bytes; the length prefix must
        // use the code-point count.
        let mut d = Decoder::new();
        let got = d.receive("5.héllo;").unwrap();
        assert_eq!(got, vec![raw("héllo", &[])]);
    }

    #[test]
    fn illegal_terminator_is_fatal() {
        let mut d = Decoder::new();
        let err = d.receive("3.foo!").unwrap_err();
        assert_eq!(err, Error::IllegalTerminator);
    }

    #[test]
    fn non_numeric_length_is_fatal() {
        let mut d = Decoder::new();
        let err = d.receive("x.foo;").unwrap_err();
        assert_eq!(err, Error::NonNumericLength);
    }

    #[test]
    fn buffer_compaction_bounds_retained_length() {
        let mut d = Decoder::new();
        // Feed many small terminated instructions; none should accumulate.
        for i in 0..10_000 {
            let body = i.to_string();
            let instr = format!("{}.{body};", body.len());
            d.receive(&instr).unwrap();
        }
        assert!(d.buffer.len() <= COMPACT_THRESHOLD.max(64));
    }
}

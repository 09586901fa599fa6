// Reference aPLib decoder.
//
// Follows the same state machine as the classic aPLib depacker: raw first
// byte, then tag-bit commands until the `110` + 0x00 end marker.  Output goes
// through the `OutputSink` trait so the same walk can either rebuild the data
// or only measure it.

use thiserror::Error;

use super::bits::BitReader;
use super::command::{REP_MATCH_MARKER, length_adjust};

// ---------------------------------------------------------------------------
// Decoder error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("compressed stream truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("match offset {offset} reaches before the start of the output at position {position}")]
    InvalidOffset { offset: u32, position: usize },
    #[error("repeat match at position {position} before any match set an offset")]
    MissingRepeatOffset { position: usize },
    #[error("gamma code overflows 32 bits at byte {offset}")]
    GammaOverflow { offset: usize },
    #[error("match length overflows at position {position}")]
    LengthOverflow { position: usize },
    #[error("decompressed output exceeds the {limit} byte limit")]
    OutputLimit { limit: usize },
}

// ---------------------------------------------------------------------------
// Output sink trait
// ---------------------------------------------------------------------------

/// Receives decoded bytes.
pub trait OutputSink {
    /// Bytes available for back-references (dictionary plus output so far).
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn push(&mut self, byte: u8);
    /// Copy `length` bytes from `offset` back. The caller has checked
    /// `1 <= offset <= len()`.
    fn copy_back(&mut self, offset: usize, length: usize);
}

/// Rebuilds the data in memory.
impl OutputSink for Vec<u8> {
    fn len(&self) -> usize {
        <Vec<u8>>::len(self)
    }

    fn push(&mut self, byte: u8) {
        <Vec<u8>>::push(self, byte);
    }

    fn copy_back(&mut self, offset: usize, length: usize) {
        let start = <Vec<u8>>::len(self) - offset;
        if offset >= length {
            self.extend_from_within(start..start + length);
        } else {
            // Overlapping copy: the source runs into bytes produced by this copy.
            self.reserve(length);
            for i in 0..length {
                let byte = self[start + i];
                <Vec<u8>>::push(self, byte);
            }
        }
    }
}

/// Counts bytes without storing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingSink {
    pub len: usize,
}

impl OutputSink for CountingSink {
    fn len(&self) -> usize {
        self.len
    }

    fn push(&mut self, _byte: u8) {
        self.len += 1;
    }

    fn copy_back(&mut self, _offset: usize, length: usize) {
        self.len += length;
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decompress a complete stream.
///
/// An empty stream decodes to empty output.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    decompress_with_dictionary(&[], data)
}

/// Decompress a stream produced with a dictionary prefix.
///
/// `dictionary` must be the exact prefix given to the compressor. Only the
/// bytes after it are returned.
pub fn decompress_with_dictionary(dictionary: &[u8], data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(dictionary.len() + data.len() * 2);
    out.extend_from_slice(dictionary);
    decode_into(data, &mut out)?;
    Ok(out.split_off(dictionary.len()))
}

/// Decompress a stream of untrusted origin, producing at most `max_output`
/// bytes.
///
/// A few bytes of stream can describe gigabytes of output; this fails with
/// [`DecodeError::OutputLimit`] before allocating past the limit.
pub fn decompress_with_limit(data: &[u8], max_output: usize) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(max_output.min(data.len().saturating_mul(2)));
    decode_limited(data, &mut out, max_output)?;
    Ok(out)
}

/// Size of the data a stream decodes to, without producing it.
pub fn decompressed_size(data: &[u8]) -> Result<usize, DecodeError> {
    let mut sink = CountingSink::default();
    decode_into(data, &mut sink)?;
    Ok(sink.len)
}

/// Run the command loop, appending to `sink`. Returns the number of stream
/// bytes consumed.
pub fn decode_into<S: OutputSink>(data: &[u8], sink: &mut S) -> Result<usize, DecodeError> {
    decode_limited(data, sink, usize::MAX)
}

/// [`decode_into`], failing once more than `max_output` bytes would be
/// appended to `sink`.
pub fn decode_limited<S: OutputSink>(
    data: &[u8],
    sink: &mut S,
    max_output: usize,
) -> Result<usize, DecodeError> {
    if data.is_empty() {
        return Ok(0);
    }

    let mut out = LimitedSink {
        sink,
        remaining: max_output,
        limit: max_output,
    };
    let sink = &mut out;

    let mut reader = BitReader::new(data);
    sink.push(reader.read_byte()?)?;

    let mut follows_literal = true;
    let mut rep_offset: Option<u32> = None;

    loop {
        if !reader.read_bit()? {
            // 0: literal
            sink.push(reader.read_byte()?)?;
            follows_literal = true;
        } else if !reader.read_bit()? {
            // 10: repeat or gamma-coded match
            let code = reader.read_gamma()?;
            if follows_literal && code == REP_MATCH_MARKER {
                let offset = rep_offset.ok_or(DecodeError::MissingRepeatOffset {
                    position: sink.len(),
                })?;
                let length = reader.read_gamma()?;
                copy_match(sink, offset, length)?;
            } else {
                let bias = if follows_literal { 3 } else { 2 };
                let high = code - bias;
                if high > u32::MAX >> 8 {
                    return Err(DecodeError::InvalidOffset {
                        offset: u32::MAX,
                        position: sink.len(),
                    });
                }
                let offset = (high << 8) | u32::from(reader.read_byte()?);
                let length = reader
                    .read_gamma()?
                    .checked_add(length_adjust(offset))
                    .ok_or(DecodeError::LengthOverflow {
                        position: sink.len(),
                    })?;
                copy_match(sink, offset, length)?;
                rep_offset = Some(offset);
            }
            follows_literal = false;
        } else if !reader.read_bit()? {
            // 110: short match or end of stream
            let byte = reader.read_byte()?;
            let offset = u32::from(byte >> 1);
            if offset == 0 {
                break;
            }
            copy_match(sink, offset, 2 + u32::from(byte & 1))?;
            rep_offset = Some(offset);
            follows_literal = false;
        } else {
            // 111: single byte
            let offset = reader.read_bits(4)?;
            if offset == 0 {
                sink.push(0)?;
            } else {
                copy_match(sink, offset, 1)?;
            }
            follows_literal = true;
        }
    }

    Ok(reader.position())
}

/// Output sink that refuses to grow past a byte budget.
struct LimitedSink<'a, S: OutputSink> {
    sink: &'a mut S,
    remaining: usize,
    limit: usize,
}

impl<S: OutputSink> LimitedSink<'_, S> {
    fn len(&self) -> usize {
        self.sink.len()
    }

    fn reserve(&mut self, length: usize) -> Result<(), DecodeError> {
        self.remaining = self
            .remaining
            .checked_sub(length)
            .ok_or(DecodeError::OutputLimit { limit: self.limit })?;
        Ok(())
    }

    fn push(&mut self, byte: u8) -> Result<(), DecodeError> {
        self.reserve(1)?;
        self.sink.push(byte);
        Ok(())
    }
}

fn copy_match<S: OutputSink>(
    sink: &mut LimitedSink<'_, S>,
    offset: u32,
    length: u32,
) -> Result<(), DecodeError> {
    let position = sink.len();
    if offset == 0 || offset as usize > position {
        return Err(DecodeError::InvalidOffset { offset, position });
    }
    sink.reserve(length as usize)?;
    sink.sink.copy_back(offset as usize, length as usize);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aplib::bits::BitWriter;

    fn assemble(build: impl FnOnce(&mut BitWriter<'_>)) -> Vec<u8> {
        let mut buf = vec![0u8; 256];
        let mut w = BitWriter::new(&mut buf);
        build(&mut w);
        let len = w.len();
        buf.truncate(len);
        buf
    }

    fn end_marker(w: &mut BitWriter<'_>) {
        w.write_bits(0b110, 3);
        w.write_byte(0);
    }

    #[test]
    fn empty_stream_is_empty_output() {
        assert_eq!(decompress(&[]).unwrap(), Vec::<u8>::new());
        assert_eq!(decompressed_size(&[]).unwrap(), 0);
    }

    #[test]
    fn literals_then_end() {
        let stream = assemble(|w| {
            w.write_byte(b'h');
            w.write_bit(false);
            w.write_byte(b'i');
            end_marker(w);
        });
        assert_eq!(decompress(&stream).unwrap(), b"hi");
    }

    #[test]
    fn short_match_then_repeat() {
        // "ab", short(2, 2) -> "abab", 'x', then repeat offset 2 for 3 bytes.
        let stream = assemble(|w| {
            w.write_byte(b'a');
            w.write_bit(false);
            w.write_byte(b'b');
            w.write_bits(0b110, 3);
            w.write_byte(2 << 1);
            w.write_bit(false);
            w.write_byte(b'x');
            w.write_bits(0b10, 2);
            w.write_gamma(2);
            w.write_gamma(3);
            end_marker(w);
        });
        assert_eq!(decompress(&stream).unwrap(), b"ababxbxb");
    }

    #[test]
    fn gamma_match_applies_length_adjust() {
        // Offset 4 < 128 adds 2 to the coded length.
        let stream = assemble(|w| {
            w.write_byte(b'w');
            for &b in b"xyz" {
                w.write_bit(false);
                w.write_byte(b);
            }
            w.write_bits(0b10, 2);
            w.write_gamma(3); // after a literal: high = 3 - 3 = 0
            w.write_byte(4);
            w.write_gamma(2); // length 2 + 2
            end_marker(w);
        });
        assert_eq!(decompress(&stream).unwrap(), b"wxyzwxyz");
    }

    #[test]
    fn nibble_forms() {
        let stream = assemble(|w| {
            w.write_byte(b'q');
            w.write_bits(0b111, 3);
            w.write_bits(0, 4);
            w.write_bits(0b111, 3);
            w.write_bits(2, 4);
            end_marker(w);
        });
        assert_eq!(decompress(&stream).unwrap(), b"q\0q");
    }

    #[test]
    fn repeat_without_offset_is_rejected() {
        let stream = assemble(|w| {
            w.write_byte(b'a');
            w.write_bits(0b10, 2);
            w.write_gamma(2);
            w.write_gamma(2);
            end_marker(w);
        });
        assert_eq!(
            decompress(&stream),
            Err(DecodeError::MissingRepeatOffset { position: 1 })
        );
    }

    #[test]
    fn offset_before_start_is_rejected() {
        let stream = assemble(|w| {
            w.write_byte(b'a');
            w.write_bits(0b110, 3);
            w.write_byte(5 << 1);
            end_marker(w);
        });
        assert_eq!(
            decompress(&stream),
            Err(DecodeError::InvalidOffset {
                offset: 5,
                position: 1
            })
        );
    }

    #[test]
    fn dictionary_bytes_are_referenced_but_not_returned() {
        let stream = assemble(|w| {
            w.write_byte(b'!');
            w.write_bits(0b110, 3);
            w.write_byte((4 << 1) | 1);
            end_marker(w);
        });
        assert_eq!(decompress_with_dictionary(b"abc", &stream).unwrap(), b"!abc");
    }

    #[test]
    fn missing_end_marker_is_truncation() {
        let stream = assemble(|w| {
            w.write_byte(b'a');
            w.write_bit(false);
            w.write_byte(b'b');
        });
        assert!(matches!(decompress(&stream), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn size_walk_matches_decoded_length() {
        let stream = assemble(|w| {
            w.write_byte(b'z');
            w.write_bits(0b110, 3);
            w.write_byte((1 << 1) | 1);
            w.write_bit(false);
            w.write_byte(b'y');
            end_marker(w);
        });
        let decoded = decompress(&stream).unwrap();
        assert_eq!(decoded, b"zzzzy");
        assert_eq!(decompressed_size(&stream).unwrap(), decoded.len());
    }

    /// Five output bytes, then a repeat match claiming `length` more.
    fn forged_repeat(length: u32) -> Vec<u8> {
        assemble(|w| {
            w.write_byte(b'a');
            w.write_bits(0b110, 3);
            w.write_byte(1 << 1);
            w.write_bit(false);
            w.write_byte(b'b');
            w.write_bits(0b10, 2);
            w.write_gamma(2);
            w.write_gamma(length);
            end_marker(w);
        })
    }

    #[test]
    fn tiny_stream_cannot_force_a_huge_allocation() {
        let stream = forged_repeat(1 << 30);
        assert!(stream.len() <= 16);
        assert_eq!(decompressed_size(&stream).unwrap(), 4 + (1 << 30));
        assert_eq!(
            decompress_with_limit(&stream, 1 << 20),
            Err(DecodeError::OutputLimit { limit: 1 << 20 })
        );
    }

    #[test]
    fn limit_is_inclusive() {
        let stream = forged_repeat(6);
        assert_eq!(decompress(&stream).unwrap(), b"aaabbbbbbb");
        assert_eq!(decompress_with_limit(&stream, 10).unwrap(), b"aaabbbbbbb");
        assert_eq!(
            decompress_with_limit(&stream, 9),
            Err(DecodeError::OutputLimit { limit: 9 })
        );
    }

    #[test]
    fn limit_applies_to_literals_too() {
        let stream = assemble(|w| {
            w.write_byte(b'h');
            w.write_bit(false);
            w.write_byte(b'i');
            end_marker(w);
        });
        assert_eq!(
            decompress_with_limit(&stream, 1),
            Err(DecodeError::OutputLimit { limit: 1 })
        );
        assert_eq!(
            decompress_with_limit(&stream, 0),
            Err(DecodeError::OutputLimit { limit: 0 })
        );
        assert_eq!(decompress_with_limit(&[], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn limited_walk_leaves_the_dictionary_alone() {
        let stream = assemble(|w| {
            w.write_byte(b'!');
            w.write_bits(0b110, 3);
            w.write_byte((4 << 1) | 1);
            end_marker(w);
        });
        let mut out = b"abc".to_vec();
        assert_eq!(
            decode_limited(&stream, &mut out, 3),
            Err(DecodeError::OutputLimit { limit: 3 })
        );
        let mut out = b"abc".to_vec();
        decode_limited(&stream, &mut out, 4).unwrap();
        assert_eq!(out, b"abc!abc");
    }
}

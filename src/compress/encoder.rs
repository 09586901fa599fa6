// Stream encoder: serializes a resolved path as an aPLib stream.
//
// Writes straight into the caller's buffer, one resolved path after the
// other.  The bit writer keeps counting past the end of the buffer, so a
// short buffer is reported with the exact size the stream needs rather than
// a truncated stream.

use crate::aplib::bits::BitWriter;
use crate::aplib::command::{Command, REP_MATCH_MARKER, high_offset_code, length_adjust};
use crate::error::CompressError;
use crate::optimal::resolve::{PlacedCommand, ResolvedPath};

/// Encode `path` (a parse of `input`) into `out`. Returns the stream size.
pub fn encode(input: &[u8], path: &ResolvedPath, out: &mut [u8]) -> Result<usize, CompressError> {
    if path.is_empty() {
        return Ok(0);
    }
    let mut stream = StreamEncoder::new(out);
    stream.write_path(input, path);
    stream.finish()
}

/// Writes a stream one resolved path at a time.
///
/// Each path is a parse of its own slice of the input; paths must follow
/// each other in stream order and only the first may carry the raw byte.
pub struct StreamEncoder<'a> {
    writer: BitWriter<'a>,
    commands: usize,
}

impl<'a> StreamEncoder<'a> {
    pub fn new(out: &'a mut [u8]) -> Self {
        Self {
            writer: BitWriter::new(out),
            commands: 0,
        }
    }

    /// Append `path`, whose positions index `input`.
    pub fn write_path(&mut self, input: &[u8], path: &ResolvedPath) {
        if path.is_empty() {
            return;
        }
        if path.raw_first {
            self.writer.write_byte(input[path.start]);
        }
        for placed in &path.commands {
            write_command(&mut self.writer, input, placed);
        }
        self.commands += path.commands.len();
    }

    /// Bytes produced so far, including any that did not fit.
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    /// Write the end marker. Returns the stream size.
    pub fn finish(mut self) -> Result<usize, CompressError> {
        write_end_marker(&mut self.writer);
        if !self.writer.fits() {
            return Err(CompressError::OutputTooSmall {
                required: self.writer.len(),
                capacity: self.writer.capacity(),
            });
        }
        log::trace!(
            "encoded {} commands into {} bytes",
            self.commands,
            self.writer.len()
        );
        Ok(self.writer.len())
    }
}

fn write_command(writer: &mut BitWriter<'_>, input: &[u8], placed: &PlacedCommand) {
    match placed.command {
        Command::Literal => {
            writer.write_bit(false);
            writer.write_byte(input[placed.pos]);
        }
        Command::Nibble { offset } => {
            writer.write_bits(0b111, 3);
            writer.write_bits(u32::from(offset), 4);
        }
        Command::ShortMatch { offset, length } => {
            writer.write_bits(0b110, 3);
            writer.write_byte(((offset << 1) | (length - 2)) as u8);
        }
        Command::Match { offset, length } => {
            writer.write_bits(0b10, 2);
            writer.write_gamma(high_offset_code(offset, placed.context.follows_literal));
            writer.write_byte((offset & 0xFF) as u8);
            writer.write_gamma(length - length_adjust(offset));
        }
        Command::RepMatch { length, .. } => {
            writer.write_bits(0b10, 2);
            writer.write_gamma(REP_MATCH_MARKER);
            writer.write_gamma(length);
        }
    }
}

fn write_end_marker(writer: &mut BitWriter<'_>) {
    writer.write_bits(0b110, 3);
    writer.write_byte(0);
}

// Compression statistics gathered from the resolved path.

use crate::aplib::command::Command;
use crate::optimal::resolve::ResolvedPath;

/// Count, range and sum of a series of values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub count: u64,
    /// 0 while `count` is 0.
    pub min: u64,
    pub max: u64,
    pub total: u64,
}

impl Summary {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.total += value;
    }

    /// `total / divisor`, or 0 when the divisor is 0.
    pub fn mean_over(&self, divisor: u64) -> f64 {
        if divisor == 0 {
            0.0
        } else {
            self.total as f64 / divisor as f64
        }
    }
}

/// Statistics of one compression run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressionStats {
    /// Bytes emitted (the input minus any dictionary prefix).
    pub input_size: usize,
    pub compressed_size: usize,

    /// Raw literals, including the first byte of the stream.
    pub num_literals: u64,
    /// `111` single-byte commands (back-copies and zero bytes).
    pub num_4bit_matches: u64,
    /// `110` short matches.
    pub num_7bit_matches: u64,
    /// Gamma-coded matches with an explicit offset.
    pub num_variable_matches: u64,
    pub num_rep_matches: u64,

    /// Offsets of every command that copies (zero-byte commands excluded).
    pub offsets: Summary,
    /// Lengths of the same commands.
    pub match_lengths: Summary,
    /// Matches at offset 1 (runs of one byte).
    pub rle1: Summary,
    /// Matches at offset 2 (runs of a byte pair).
    pub rle2: Summary,

    /// Averaging denominators, see [`CompressionStats::select_divisors`].
    pub commands_divisor: u64,
    pub match_divisor: u64,
    pub rle1_divisor: u64,
    pub rle2_divisor: u64,
}

impl CompressionStats {
    /// Statistics of a stream made of `path` alone.
    pub fn collect(path: &ResolvedPath) -> Self {
        let mut stats = Self::default();
        stats.record(path);
        stats.select_divisors();
        stats
    }

    /// Add the commands of one more path of the stream.  Call
    /// [`select_divisors`](Self::select_divisors) once all paths are in.
    pub fn record(&mut self, path: &ResolvedPath) {
        self.input_size += path.emitted;
        if path.is_empty() {
            return;
        }
        if path.raw_first {
            self.num_literals += 1;
        }

        for placed in &path.commands {
            let command = placed.command;
            match command {
                Command::Literal => self.num_literals += 1,
                Command::Nibble { .. } => self.num_4bit_matches += 1,
                Command::ShortMatch { .. } => self.num_7bit_matches += 1,
                Command::Match { .. } => self.num_variable_matches += 1,
                Command::RepMatch { .. } => self.num_rep_matches += 1,
            }

            let offset = command.offset();
            if offset == 0 {
                continue;
            }
            let length = u64::from(command.length());
            self.offsets.record(u64::from(offset));
            self.match_lengths.record(length);
            if command.is_match() {
                match offset {
                    1 => self.rle1.record(length),
                    2 => self.rle2.record(length),
                    _ => {}
                }
            }
        }
    }

    /// Pick the averaging denominators.
    ///
    /// The aPLib field widths are fixed, so there is nothing to tune: each
    /// divisor is the size of the population its average is taken over.
    pub fn select_divisors(&mut self) {
        self.commands_divisor = self.num_commands();
        self.match_divisor = self.offsets.count;
        self.rle1_divisor = self.rle1.count;
        self.rle2_divisor = self.rle2.count;
    }

    /// Commands in the stream, the raw first byte included.
    pub fn num_commands(&self) -> u64 {
        self.num_literals
            + self.num_4bit_matches
            + self.num_7bit_matches
            + self.num_variable_matches
            + self.num_rep_matches
    }

    /// Bytes produced by all commands together; equals `input_size`.
    pub fn covered_bytes(&self) -> u64 {
        let back_copies =
            self.offsets.count - (self.num_7bit_matches + self.num_variable_matches + self.num_rep_matches);
        self.num_literals + self.num_4bit_matches + self.match_lengths.total - back_copies
    }

    pub fn average_offset(&self) -> f64 {
        self.offsets.mean_over(self.match_divisor)
    }

    pub fn average_match_length(&self) -> f64 {
        self.match_lengths.mean_over(self.match_divisor)
    }

    pub fn average_rle1_length(&self) -> f64 {
        self.rle1.mean_over(self.rle1_divisor)
    }

    pub fn average_rle2_length(&self) -> f64 {
        self.rle2.mean_over(self.rle2_divisor)
    }

    /// Input bytes per output byte; 0 for empty input.
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            0.0
        } else {
            self.input_size as f64 / self.compressed_size as f64
        }
    }
}

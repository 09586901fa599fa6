// aPLib command set and bit-exact cost model.
//
// Every command after the raw first byte is one of:
//
//   0   + byte                      literal
//   111 + 4 bits                    single byte from offset 1..15, or a zero byte
//   110 + byte                      offset 1..127, length 2..3 (byte 0 = end)
//   10  + gamma(2) + gamma(len)     repeat of the last match offset (after a literal)
//   10  + gamma(hi) + byte + gamma  any other match
//
// The parser, the resolver, the statistics and the encoder all go through
// `Command::classify_match` / `Command::single_byte` so they agree on which
// form a (offset, length) pair takes and what it costs.

use super::bits::gamma_bits;

/// Bits for the raw first byte of the stream.
pub const HEADER_BITS: u32 = 8;
/// `0` + byte.
pub const LITERAL_BITS: u32 = 9;
/// `111` + nibble.
pub const NIBBLE_BITS: u32 = 7;
/// `110` + byte.
pub const SHORT_MATCH_BITS: u32 = 11;
/// `110` + zero byte.
pub const END_MARKER_BITS: u32 = 11;

/// Largest offset of a `111` single-byte copy.
pub const MAX_NIBBLE_OFFSET: u32 = 15;
/// Largest offset of a `110` short match.
pub const MAX_SHORT_OFFSET: u32 = 127;
pub const MIN_SHORT_LEN: u32 = 2;
pub const MAX_SHORT_LEN: u32 = 3;
/// Gamma value that marks a repeat match when the previous command was not a match.
pub const REP_MATCH_MARKER: u32 = 2;

/// Decoder state that influences how the next command is coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Previous command was a literal or single-byte command (aPLib `LWM == 0`).
    pub follows_literal: bool,
    /// Offset of the most recent multi-byte match, 0 before the first one.
    pub rep_offset: u32,
}

impl Context {
    /// State right after the raw first byte.
    pub const START: Context = Context {
        follows_literal: true,
        rep_offset: 0,
    };

    /// State after `command` has been executed.
    pub fn after(self, command: &Command) -> Context {
        match *command {
            Command::Literal | Command::Nibble { .. } => Context {
                follows_literal: true,
                rep_offset: self.rep_offset,
            },
            Command::ShortMatch { offset, .. }
            | Command::Match { offset, .. }
            | Command::RepMatch { offset, .. } => Context {
                follows_literal: false,
                rep_offset: offset,
            },
        }
    }

    /// Whether a repeat match is available in this state.
    pub fn can_repeat(&self) -> bool {
        self.follows_literal && self.rep_offset != 0
    }
}

/// One command of the stream (the end marker is written separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Raw literal byte.
    Literal,
    /// Single byte copied from `offset` back; offset 0 emits a zero byte.
    Nibble { offset: u8 },
    /// 7-bit offset, 2-3 byte match.
    ShortMatch { offset: u32, length: u32 },
    /// Gamma-coded offset and length.
    Match { offset: u32, length: u32 },
    /// Match reusing the last offset.
    RepMatch { offset: u32, length: u32 },
}

/// Amount the decoder adds to the coded length of a `Match` with this offset.
#[inline]
pub fn length_adjust(offset: u32) -> u32 {
    if offset < 128 {
        2
    } else if offset < 1280 {
        0
    } else if offset < 32000 {
        1
    } else {
        2
    }
}

/// Gamma value carrying the high part of a `Match` offset.
#[inline]
pub fn high_offset_code(offset: u32, follows_literal: bool) -> u32 {
    (offset >> 8) + if follows_literal { 3 } else { 2 }
}

impl Command {
    /// Pick the command for a match of `length` bytes at `offset` in `ctx`.
    ///
    /// Returns `None` if the grammar cannot express it (e.g. a 2-byte match
    /// at offset 2000).
    pub fn classify_match(offset: u32, length: u32, ctx: Context) -> Option<Command> {
        if offset == 0 || length < 2 {
            return None;
        }
        if ctx.can_repeat() && offset == ctx.rep_offset {
            return Some(Command::RepMatch { offset, length });
        }
        if offset <= MAX_SHORT_OFFSET && (MIN_SHORT_LEN..=MAX_SHORT_LEN).contains(&length) {
            return Some(Command::ShortMatch { offset, length });
        }
        let adjust = length_adjust(offset);
        if length >= adjust + 2 {
            return Some(Command::Match { offset, length });
        }
        None
    }

    /// Cheapest single-byte command for `data[pos]`.
    ///
    /// A zero byte and a byte seen again within 15 positions both cost 7 bits
    /// instead of 9; neither affects the repeat offset.
    pub fn single_byte(data: &[u8], pos: usize, max_offset: usize) -> Command {
        let byte = data[pos];
        if byte == 0 {
            return Command::Nibble { offset: 0 };
        }
        let reach = pos.min(max_offset).min(MAX_NIBBLE_OFFSET as usize);
        (1..=reach)
            .find(|&offset| data[pos - offset] == byte)
            .map_or(Command::Literal, |offset| Command::Nibble {
                offset: offset as u8,
            })
    }

    /// Exact number of stream bits this command takes in `ctx`.
    pub fn cost_bits(&self, ctx: Context) -> u32 {
        match *self {
            Command::Literal => LITERAL_BITS,
            Command::Nibble { .. } => NIBBLE_BITS,
            Command::ShortMatch { .. } => SHORT_MATCH_BITS,
            Command::Match { offset, length } => {
                2 + gamma_bits(high_offset_code(offset, ctx.follows_literal))
                    + 8
                    + gamma_bits(length - length_adjust(offset))
            }
            Command::RepMatch { length, .. } => 2 + gamma_bits(REP_MATCH_MARKER) + gamma_bits(length),
        }
    }

    /// Number of input bytes covered.
    pub fn length(&self) -> u32 {
        match *self {
            Command::Literal | Command::Nibble { .. } => 1,
            Command::ShortMatch { length, .. }
            | Command::Match { length, .. }
            | Command::RepMatch { length, .. } => length,
        }
    }

    /// Back-reference distance (0 for literals and zero-byte nibbles).
    pub fn offset(&self) -> u32 {
        match *self {
            Command::Literal => 0,
            Command::Nibble { offset } => u32::from(offset),
            Command::ShortMatch { offset, .. }
            | Command::Match { offset, .. }
            | Command::RepMatch { offset, .. } => offset,
        }
    }

    /// True for the multi-byte match forms.
    pub fn is_match(&self) -> bool {
        matches!(
            self,
            Command::ShortMatch { .. } | Command::Match { .. } | Command::RepMatch { .. }
        )
    }
}

// Back-pointer walk from the best terminal arrival to the seed, then
// clean-up passes over the resulting command list.

use crate::aplib::command::{Command, Context, END_MARKER_BITS, HEADER_BITS, MAX_NIBBLE_OFFSET};
use crate::error::CompressError;

use super::arrival::{ArrivalRef, ArrivalTable};
use super::parser::ParseOrigin;

/// Token chosen at one position.
///
/// `length` 0 is a literal, 1 a single-byte command (`offset` 0 meaning a
/// zero byte).  Only entries at token starts are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalMatch {
    pub length: u32,
    pub offset: u32,
}

impl FinalMatch {
    /// The entry standing for `command`.
    pub fn of(command: &Command) -> Self {
        match *command {
            Command::Literal => Self::default(),
            Command::Nibble { offset } => Self {
                length: 1,
                offset: u32::from(offset),
            },
            Command::ShortMatch { offset, length }
            | Command::Match { offset, length }
            | Command::RepMatch { offset, length } => Self { length, offset },
        }
    }
}

/// A command together with where it starts and the state it is coded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedCommand {
    pub pos: usize,
    pub command: Command,
    pub context: Context,
}

impl PlacedCommand {
    pub fn cost_bits(&self) -> u32 {
        self.command.cost_bits(self.context)
    }
}

/// The winning parse of `input[start..]`.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// First byte covered.
    pub start: usize,
    /// `input[start]` opens the stream and is written raw.
    pub raw_first: bool,
    /// Bytes covered, including a raw first byte.
    pub emitted: usize,
    /// Indexed by `pos - start`.
    pub final_matches: Vec<FinalMatch>,
    /// Commands after any raw first byte, in stream order.
    pub commands: Vec<PlacedCommand>,
    /// Decoder state after the last command.
    pub end_context: Context,
}

impl ResolvedPath {
    /// Path for an input with nothing to emit.
    pub fn empty(start: usize) -> Self {
        Self {
            start,
            raw_first: false,
            emitted: 0,
            final_matches: Vec::new(),
            commands: Vec::new(),
            end_context: Context::START,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.emitted == 0
    }

    /// Entry for the token starting at `pos`.
    pub fn final_match(&self, pos: usize) -> Option<FinalMatch> {
        pos.checked_sub(self.start)
            .and_then(|i| self.final_matches.get(i))
            .copied()
    }

    /// Bits of the commands alone.
    pub fn payload_bits(&self) -> u64 {
        self.commands.iter().map(|c| u64::from(c.cost_bits())).sum()
    }

    /// Bits of this path written as the tail of a stream: any raw first
    /// byte, the commands and the end marker.
    pub fn total_bits(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let header = if self.raw_first { HEADER_BITS } else { 0 };
        u64::from(header) + self.payload_bits() + u64::from(END_MARKER_BITS)
    }

    /// Exact size in bytes of a stream consisting of this path alone.
    pub fn encoded_size(&self) -> usize {
        self.total_bits().div_ceil(8) as usize
    }
}

fn inconsistency(message: String) -> CompressError {
    CompressError::InternalInconsistency(message)
}

/// Follow the best path back from the end of `input` to `origin` and turn it
/// into commands.
pub fn resolve(
    input: &[u8],
    origin: ParseOrigin,
    arrivals: &ArrivalTable,
    max_offset: usize,
) -> Result<ResolvedPath, CompressError> {
    let n = input.len();
    let start = origin.start;
    if n <= start {
        return Ok(ResolvedPath::empty(start));
    }

    let seed_pos = origin.first_command();
    let mut final_matches = vec![FinalMatch::default(); n - start];
    let mut token_starts = Vec::new();

    let mut cur = ArrivalRef { pos: n, slot: 0 };
    let mut arrival = *arrivals
        .get(cur)
        .ok_or_else(|| inconsistency(format!("no arrival at end position {n}")))?;
    let expected_bits = arrival.cost;

    while let Some(prev) = arrival.from() {
        if prev.pos >= cur.pos || prev.pos < seed_pos {
            return Err(inconsistency(format!(
                "back-pointer from {} to {} leaves the parse",
                cur.pos, prev.pos
            )));
        }
        let span = cur.pos - prev.pos;
        let length = match arrival.match_len {
            0 | 1 if span == 1 => u32::from(arrival.match_len),
            len if usize::from(len) == span && len >= 2 => u32::from(len),
            len => {
                return Err(inconsistency(format!(
                    "token of length {len} spans {span} bytes at {}",
                    prev.pos
                )));
            }
        };
        final_matches[prev.pos - start] = FinalMatch {
            length,
            offset: arrival.match_offset,
        };
        token_starts.push(prev.pos);

        cur = prev;
        arrival = *arrivals
            .get(cur)
            .ok_or_else(|| inconsistency(format!("dangling arrival {}:{}", cur.pos, cur.slot)))?;
    }
    if cur.pos != seed_pos {
        return Err(inconsistency(format!(
            "path ends at {} instead of {seed_pos}",
            cur.pos
        )));
    }

    let mut commands = Vec::with_capacity(token_starts.len());
    let mut ctx = origin.context;
    let mut demoted = false;
    for &pos in token_starts.iter().rev() {
        let fm = final_matches[pos - start];
        match token_command(input, pos, fm, ctx, max_offset) {
            Some(command) => {
                final_matches[pos - start] = FinalMatch::of(&command);
                commands.push(PlacedCommand {
                    pos,
                    command,
                    context: ctx,
                });
                ctx = ctx.after(&command);
            }
            None => {
                log::debug!(
                    "demoting unencodable match at {pos} (offset {}, length {})",
                    fm.offset,
                    fm.length
                );
                demoted = true;
                for p in pos..pos + fm.length as usize {
                    let command = Command::single_byte(input, p, max_offset);
                    final_matches[p - start] = FinalMatch::of(&command);
                    commands.push(PlacedCommand {
                        pos: p,
                        command,
                        context: ctx,
                    });
                    ctx = ctx.after(&command);
                }
            }
        }
    }

    let mut path = ResolvedPath {
        start,
        raw_first: origin.raw_first,
        emitted: n - start,
        final_matches,
        commands,
        end_context: ctx,
    };

    let parsed_bits = path.payload_bits();
    if !demoted && parsed_bits != expected_bits {
        return Err(inconsistency(format!(
            "resolved path costs {parsed_bits} bits, parse promised {expected_bits}"
        )));
    }

    merge_same_offset_runs(&mut path);
    log::trace!(
        "resolved {} commands, {} bits ({} before merging)",
        path.commands.len(),
        path.payload_bits(),
        parsed_bits
    );
    Ok(path)
}

/// The command a parsed token stands for, or `None` if it cannot be coded
/// in `ctx`.
fn token_command(
    input: &[u8],
    pos: usize,
    fm: FinalMatch,
    ctx: Context,
    max_offset: usize,
) -> Option<Command> {
    match fm.length {
        0 => Some(Command::Literal),
        1 => {
            let offset = fm.offset as usize;
            let reach = pos.min(max_offset).min(MAX_NIBBLE_OFFSET as usize);
            let valid = if offset == 0 {
                input[pos] == 0
            } else {
                offset <= reach && input[pos - offset] == input[pos]
            };
            Some(if valid {
                Command::Nibble {
                    offset: offset as u8,
                }
            } else {
                Command::Literal
            })
        }
        length => {
            let offset = fm.offset as usize;
            if offset == 0 || offset > pos || pos + length as usize > input.len() {
                return None;
            }
            Command::classify_match(fm.offset, length, ctx)
        }
    }
}

/// Join runs of commands that all copy from the same offset into one match
/// when that is cheaper.  A run is cut after its last multi-byte match, so
/// the state after it and the cost of everything later stay the same.
fn merge_same_offset_runs(path: &mut ResolvedPath) {
    let commands = std::mem::take(&mut path.commands);
    let mut merged = Vec::with_capacity(commands.len());

    let mut i = 0;
    while i < commands.len() {
        let first = commands[i];
        let offset = first.command.offset();

        let mut end = i;
        if offset != 0 {
            let mut j = i;
            while let Some(c) = commands.get(j).filter(|c| c.command.offset() == offset) {
                j += 1;
                if c.command.is_match() {
                    end = j;
                }
            }
        }

        if end > i + 1 {
            let run = &commands[i..end];
            let length: u32 = run.iter().map(|c| c.command.length()).sum();
            let separate: u64 = run.iter().map(|c| u64::from(c.cost_bits())).sum();
            if let Some(joined) = Command::classify_match(offset, length, first.context) {
                if u64::from(joined.cost_bits(first.context)) < separate {
                    for c in &run[1..] {
                        path.final_matches[c.pos - path.start] = FinalMatch::default();
                    }
                    path.final_matches[first.pos - path.start] = FinalMatch::of(&joined);
                    merged.push(PlacedCommand {
                        command: joined,
                        ..first
                    });
                    i = end;
                    continue;
                }
            }
        }

        merged.push(first);
        i += 1;
    }
    path.commands = merged;
}

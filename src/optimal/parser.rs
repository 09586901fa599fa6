// Forward arrival-based parse.
//
// Positions are processed left to right.  Every live arrival at a position
// is extended by a single-byte command, by a repeat of its own last offset,
// and by every length of every candidate match; the results are offered to
// the destination positions.  All arrivals at a position are final before it
// is processed, since transitions only move forward.
//
// A parse may start mid-stream: the origin carries the decoder state left by
// the commands before it.

use crate::aplib::command::{Command, Context};
use crate::matchfinder::candidates::{CandidateTable, MatchCandidate};
use crate::matchfinder::config::{LEAVE_ALONE_MATCH_SIZE, MAX_MATCH_LEN, MIN_MATCH};

use super::arrival::{
    ARRIVALS_PER_POSITION, Arrival, ArrivalRef, ArrivalTable, EXHAUSTIVE_ARRIVALS_PER_POSITION,
    EXHAUSTIVE_PARSE_LIMIT,
};

/// Positions between progress reports.
pub const PROGRESS_INTERVAL: usize = 1 << 16;

/// Spans cached by [`RepSpanCache`].
const REP_SPAN_SLOTS: usize = 8;

// ---------------------------------------------------------------------------
// Repeat-offset run cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct RepSpan {
    offset: usize,
    start: usize,
    /// First position past `start` where `input[q] != input[q - offset]`, or
    /// the input length.
    end: usize,
}

/// Remembers how far the input keeps matching itself at a few offsets.
///
/// Inside a long run every arrival asks the same question at neighbouring
/// positions, so one forward scan answers all of them.
#[derive(Debug, Default)]
pub struct RepSpanCache {
    spans: [RepSpan; REP_SPAN_SLOTS],
    next: usize,
}

impl RepSpanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the match at `pos` against `pos - offset` (`1 <= offset <= pos`).
    pub fn match_len(&mut self, input: &[u8], pos: usize, offset: usize) -> usize {
        if let Some(span) = self
            .spans
            .iter()
            .find(|s| s.offset == offset && s.start <= pos && pos <= s.end)
        {
            return span.end - pos;
        }

        let mut end = pos;
        while end < input.len() && input[end] == input[end - offset] {
            end += 1;
        }
        self.spans[self.next] = RepSpan {
            offset,
            start: pos,
            end,
        };
        self.next = (self.next + 1) % REP_SPAN_SLOTS;
        end - pos
    }
}

// ---------------------------------------------------------------------------
// Parse origin
// ---------------------------------------------------------------------------

/// Where a parse begins and what the decoder looks like there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOrigin {
    /// First byte the parse covers.
    pub start: usize,
    /// `input[start]` opens the stream and is written raw.
    pub raw_first: bool,
    /// Decoder state before the first command.
    pub context: Context,
}

impl ParseOrigin {
    /// Beginning of a stream.
    pub fn stream(start: usize) -> Self {
        Self {
            start,
            raw_first: true,
            context: Context::START,
        }
    }

    /// Continuation of a stream whose earlier commands left the decoder in
    /// `context`.
    pub fn resume(start: usize, context: Context) -> Self {
        Self {
            start,
            raw_first: false,
            context,
        }
    }

    /// First position a command is chosen for.
    pub fn first_command(&self) -> usize {
        self.start + usize::from(self.raw_first)
    }
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Match lengths `first..=last` at one offset.
#[derive(Debug, Clone, Copy)]
struct LengthRange {
    offset: u32,
    first: usize,
    last: usize,
}

/// Lengths worth trying for the candidates at one position: each candidate
/// adds the lengths above the previous (shorter) one.
fn candidate_ranges(matches: &[MatchCandidate], out: &mut Vec<LengthRange>) {
    let mut covered = MIN_MATCH - 1;
    for candidate in matches {
        let len = candidate.length();
        let first = if len >= LEAVE_ALONE_MATCH_SIZE {
            len
        } else {
            (covered + 1).max(MIN_MATCH)
        };
        out.push(LengthRange {
            offset: candidate.offset() as u32,
            first,
            last: len,
        });
        covered = len;
    }
}

/// Every length at every offset that matches at `pos`.
fn every_offset_ranges(input: &[u8], pos: usize, max_offset: usize, out: &mut Vec<LengthRange>) {
    let limit = (input.len() - pos).min(MAX_MATCH_LEN);
    for offset in 1..=pos.min(max_offset) {
        let len = (pos..pos + limit)
            .take_while(|&q| input[q] == input[q - offset])
            .count();
        if len >= MIN_MATCH {
            out.push(LengthRange {
                offset: offset as u32,
                first: MIN_MATCH,
                last: len,
            });
        }
    }
}

/// Run the parse over `input[origin.start..]`.
///
/// `input` includes any dictionary or history prefix; `candidates` must cover
/// it.  `progress` receives `(bytes parsed, estimated output bytes)` every
/// [`PROGRESS_INTERVAL`] positions.  Returns the arrival table for positions
/// `origin.first_command() ..= input.len()`; the optimum is slot 0 of the
/// last position.
///
/// Inputs of at most [`EXHAUSTIVE_PARSE_LIMIT`] bytes are parsed over every
/// offset and every decoder state, so no cheaper stream exists for them.
pub fn parse(
    input: &[u8],
    origin: ParseOrigin,
    candidates: &CandidateTable,
    max_offset: usize,
    progress: &mut dyn FnMut(u64, u64),
) -> ArrivalTable {
    let n = input.len();
    let base = origin.first_command();
    debug_assert!(base <= n);

    let exhaustive = n <= EXHAUSTIVE_PARSE_LIMIT;
    let width = if exhaustive {
        EXHAUSTIVE_ARRIVALS_PER_POSITION
    } else {
        ARRIVALS_PER_POSITION
    };
    let mut arrivals = ArrivalTable::with_width(base, n, width);
    arrivals.insert(base, Arrival::seed(origin.context));

    let mut rep_cache = RepSpanCache::new();
    let mut ranges: Vec<LengthRange> = Vec::with_capacity(64);
    let mut pending: Vec<(usize, Arrival)> = Vec::with_capacity(256);

    for pos in base..n {
        let done = pos - base;
        if done > 0 && done % PROGRESS_INTERVAL == 0 {
            if let Some(best) = arrivals.at(pos).first() {
                progress(done as u64, best.cost / 8);
            }
        }

        let remaining = n - pos;
        let single = Command::single_byte(input, pos, max_offset);
        let (single_offset, single_len) = match single {
            Command::Nibble { offset } => (u32::from(offset), 1),
            _ => (0, 0),
        };

        ranges.clear();
        if exhaustive {
            every_offset_ranges(input, pos, max_offset, &mut ranges);
        } else {
            candidate_ranges(candidates.at(pos), &mut ranges);
        }

        pending.clear();
        for (slot, arrival) in arrivals.at(pos).iter().enumerate() {
            let from = ArrivalRef { pos, slot };
            let ctx = arrival.context();

            // Single byte.
            pending.push((
                pos + 1,
                Arrival::new(
                    arrival.cost + u64::from(single.cost_bits(ctx)),
                    from,
                    ctx.after(&single),
                    single_offset,
                    single_len,
                ),
            ));

            // Repeat of the last offset.
            if ctx.can_repeat() && ctx.rep_offset as usize <= pos {
                let rep = ctx.rep_offset as usize;
                let len = rep_cache
                    .match_len(input, pos, rep)
                    .min(MAX_MATCH_LEN)
                    .min(remaining);
                if len >= MIN_MATCH {
                    let first = if len >= LEAVE_ALONE_MATCH_SIZE { len } else { MIN_MATCH };
                    for length in first..=len {
                        let command = Command::RepMatch {
                            offset: ctx.rep_offset,
                            length: length as u32,
                        };
                        pending.push((
                            pos + length,
                            Arrival::new(
                                arrival.cost + u64::from(command.cost_bits(ctx)),
                                from,
                                ctx.after(&command),
                                ctx.rep_offset,
                                length as u16,
                            ),
                        ));
                    }
                }
            }

            // Fresh matches.
            for range in &ranges {
                for length in range.first..=range.last {
                    let Some(command) = Command::classify_match(range.offset, length as u32, ctx)
                    else {
                        continue;
                    };
                    pending.push((
                        pos + length,
                        Arrival::new(
                            arrival.cost + u64::from(command.cost_bits(ctx)),
                            from,
                            ctx.after(&command),
                            range.offset,
                            length as u16,
                        ),
                    ));
                }
            }
        }

        for &(dest, arrival) in &pending {
            arrivals.insert(dest, arrival);
        }
    }

    if let Some(best) = arrivals.at(n).first() {
        log::trace!(
            "parse: {} positions, best path {} bits{}",
            n - base,
            best.cost,
            if exhaustive { " (exhaustive)" } else { "" }
        );
    }
    arrivals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aplib::command::{END_MARKER_BITS, HEADER_BITS};
    use crate::matchfinder::config::MAX_OFFSET;
    use crate::matchfinder::{LcpIntervals, SuffixIndex};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    fn candidates_for(input: &[u8]) -> CandidateTable {
        let index = SuffixIndex::build(input);
        let mut intervals = LcpIntervals::new(&index, MAX_OFFSET);
        CandidateTable::collect(&mut intervals, 0)
    }

    fn best_cost(input: &[u8]) -> u64 {
        let candidates = candidates_for(input);
        let arrivals = parse(
            input,
            ParseOrigin::stream(0),
            &candidates,
            MAX_OFFSET,
            &mut |_, _| {},
        );
        arrivals.at(input.len())[0].cost
    }

    /// Cheapest stream over every valid command sequence: each single-byte
    /// form and every length at every offset, memoized on the decoder state.
    fn brute_force(input: &[u8]) -> u64 {
        fn go(
            input: &[u8],
            pos: usize,
            ctx: Context,
            memo: &mut HashMap<(usize, bool, u32), u64>,
        ) -> u64 {
            if pos == input.len() {
                return 0;
            }
            if let Some(&cost) = memo.get(&(pos, ctx.follows_literal, ctx.rep_offset)) {
                return cost;
            }

            let mut moves = vec![Command::Literal, Command::single_byte(input, pos, MAX_OFFSET)];
            for offset in 1..=pos {
                let len = (pos..input.len())
                    .take_while(|&q| input[q] == input[q - offset])
                    .count();
                for length in MIN_MATCH..=len {
                    if let Some(cmd) = Command::classify_match(offset as u32, length as u32, ctx) {
                        moves.push(cmd);
                    }
                }
            }

            let best = moves
                .into_iter()
                .map(|cmd| {
                    u64::from(cmd.cost_bits(ctx))
                        + go(input, pos + cmd.length() as usize, ctx.after(&cmd), memo)
                })
                .min()
                .unwrap_or(u64::MAX);
            memo.insert((pos, ctx.follows_literal, ctx.rep_offset), best);
            best
        }

        go(input, 1, Context::START, &mut HashMap::new())
    }

    fn small_alphabet_inputs(count: usize) -> Vec<Vec<u8>> {
        let mut rng = StdRng::seed_from_u64(0xa91b);
        (0..count)
            .map(|_| {
                let len = rng.random_range(4..=32);
                let alphabet = rng.random_range(2..=4u8);
                (0..len).map(|_| b'a' + rng.random_range(0..alphabet)).collect()
            })
            .collect()
    }

    #[test]
    fn no_cheaper_parse_exists_for_small_inputs() {
        let mut inputs: Vec<Vec<u8>> = [
            &b"aaaaabbababaaaaaabbbaa"[..],
            b"abcabcabcabc",
            b"aaaaaaaaaaaaaaaaaaaa",
            b"abababababab",
            b"hello hello hello",
            b"abracadabra",
            b"\0\0a\0\0a\0",
        ]
        .iter()
        .map(|s| s.to_vec())
        .collect();
        inputs.extend(small_alphabet_inputs(500));

        for input in &inputs {
            assert_eq!(
                best_cost(input),
                brute_force(input),
                "input {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn non_recent_offset_feeding_a_repeat_is_found() {
        // The cheapest parse copies "aaa" at 2 from offset 2 instead of the
        // nearer offset 1, so that offset 2 can be repeated for "baba" at 8.
        let input = b"aaaaabbababaaaaaabbbaa";
        assert_eq!(brute_force(input), 76);
        assert_eq!(best_cost(input), 76);
    }

    #[test]
    fn large_inputs_use_the_candidate_beam() {
        let input = b"beam beam beam beam beam beam beam beam beam beam beam beam beam!";
        assert!(input.len() > EXHAUSTIVE_PARSE_LIMIT);
        let candidates = candidates_for(input);
        let arrivals = parse(
            input,
            ParseOrigin::stream(0),
            &candidates,
            MAX_OFFSET,
            &mut |_, _| {},
        );
        assert_eq!(arrivals.width(), ARRIVALS_PER_POSITION);
        assert!(arrivals.at(input.len())[0].cost < 9 * 16);
    }

    #[test]
    fn never_worse_than_literals() {
        let input = b"the quick brown fox jumps over the lazy dog";
        let all_literals = 9 * (input.len() as u64 - 1);
        assert!(best_cost(input) <= all_literals);
    }

    #[test]
    fn single_byte_input_is_just_the_seed() {
        let candidates = candidates_for(b"z");
        let arrivals = parse(
            b"z",
            ParseOrigin::stream(0),
            &candidates,
            MAX_OFFSET,
            &mut |_, _| {},
        );
        assert_eq!(arrivals.at(1), &[Arrival::seed(Context::START)]);
    }

    #[test]
    fn resumed_parse_starts_from_the_carried_state() {
        // "xy" was emitted by an earlier part of the stream that ended on a
        // literal after a match at offset 2, so "xy" repeats for 6 bits.
        let input = b"xyxy";
        let carried = Context {
            follows_literal: true,
            rep_offset: 2,
        };
        let candidates = candidates_for(input);
        let origin = ParseOrigin::resume(2, carried);
        assert_eq!(origin.first_command(), 2);
        let arrivals = parse(input, origin, &candidates, MAX_OFFSET, &mut |_, _| {});
        assert_eq!(arrivals.base(), 2);
        let best = arrivals.at(4)[0];
        assert_eq!(best.cost, 6);
        assert_eq!((best.match_offset, best.match_len), (2, 2));
    }

    #[test]
    fn progress_is_reported_per_interval() {
        let input: Vec<u8> = (0..PROGRESS_INTERVAL * 2 + 10)
            .map(|i| (i % 251) as u8)
            .collect();
        let candidates = candidates_for(&input);
        let mut calls = Vec::new();
        parse(
            &input,
            ParseOrigin::stream(0),
            &candidates,
            MAX_OFFSET,
            &mut |done, size| calls.push((done, size)),
        );
        let done: Vec<u64> = calls.iter().map(|c| c.0).collect();
        assert_eq!(
            done,
            vec![PROGRESS_INTERVAL as u64, 2 * PROGRESS_INTERVAL as u64]
        );
    }

    #[test]
    fn repeat_offsets_are_used() {
        let input = b"ABABABABxABABABAB";
        let best = best_cost(input);
        // Header + the parse + end marker fits well under all-literal size.
        let total = HEADER_BITS as u64 + best + END_MARKER_BITS as u64;
        assert!(total < 8 + 9 * 16 + 11);
    }

    #[test]
    fn rep_span_cache_reuses_scans() {
        let input = b"aaaaaaaab";
        let mut cache = RepSpanCache::new();
        assert_eq!(cache.match_len(input, 1, 1), 7);
        assert_eq!(cache.match_len(input, 4, 1), 4);
        assert_eq!(cache.match_len(input, 8, 1), 0);
        assert_eq!(cache.match_len(b"abcabd", 3, 3), 2);
    }
}

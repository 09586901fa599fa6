// Per-position match candidates.
//
// The interval walk produces candidates longest first.  The table stores them
// shortest first because the parser expands each candidate into the lengths
// between it and the previous (shorter) one.

use super::config::{MAX_MATCH_LEN, MAX_OFFSET, MIN_MATCH};
use super::intervals::LcpIntervals;

/// A match usable at some position: the `length` bytes there also occur
/// `offset` bytes earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidate {
    length: u16,
    offset: u32,
}

impl MatchCandidate {
    /// Returns `None` outside `MIN_MATCH..=MAX_MATCH_LEN` or `1..=MAX_OFFSET`.
    pub fn new(length: usize, offset: usize) -> Option<Self> {
        if !(MIN_MATCH..=MAX_MATCH_LEN).contains(&length) || !(1..=MAX_OFFSET).contains(&offset) {
            return None;
        }
        Some(Self {
            length: length as u16,
            offset: offset as u32,
        })
    }

    #[inline]
    pub fn length(&self) -> usize {
        usize::from(self.length)
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset as usize
    }
}

/// Candidates for every position, in one flat arena.
#[derive(Debug, Clone, Default)]
pub struct CandidateTable {
    /// `starts[p]..starts[p + 1]` indexes `entries` for position `p`.
    starts: Vec<usize>,
    entries: Vec<MatchCandidate>,
}

impl CandidateTable {
    /// Walk every position of the input.  Positions before `first` (the
    /// dictionary) are walked so they can serve as match sources, but get no
    /// candidates of their own.
    pub fn collect(intervals: &mut LcpIntervals, first: usize) -> Self {
        let n = intervals.len();
        let mut starts = Vec::with_capacity(n + 1);
        let mut entries = Vec::with_capacity(n);
        let mut scratch = Vec::with_capacity(super::config::MAX_CANDIDATES_PER_POSITION);

        starts.push(0);
        for pos in 0..n {
            if pos < first {
                intervals.skip_matches_at(pos);
            } else {
                scratch.clear();
                intervals.find_matches_at(pos, &mut scratch);
                entries.extend(scratch.iter().rev());
            }
            starts.push(entries.len());
        }

        log::trace!(
            "collected {} match candidates over {} positions",
            entries.len(),
            n.saturating_sub(first)
        );
        Self { starts, entries }
    }

    /// Candidates at `pos`, shortest first.  Empty past the end.
    pub fn at(&self, pos: usize) -> &[MatchCandidate] {
        match (self.starts.get(pos), self.starts.get(pos + 1)) {
            (Some(&start), Some(&end)) => &self.entries[start..end],
            _ => &[],
        }
    }

    /// Number of positions covered.
    pub fn positions(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    /// Total candidates stored.
    pub fn total(&self) -> usize {
        self.entries.len()
    }
}

// LCP-interval tree and the incremental match walk over it.
//
// Every LCP interval (a maximal run of suffixes sharing a prefix of some
// length) becomes a node.  Nodes are referenced by `NodeRef { lcp, idx }`,
// ordered by `(lcp, idx)`, so deeper intervals compare greater than their
// ancestors.  Each node stores an `IntervalLink`: before any suffix has
// walked through it, the link is its parent; afterwards it is the position
// of the last suffix that did.  `pos_data[p]` starts as the deepest interval
// containing suffix `p` and is reused during the walk as a back-link that
// records how far up the tree a later suffix matched `p`.
//
// Positions must be advanced in increasing order, each exactly once.
// Intervals are visited an amortized constant number of times, so a full
// pass is O(n).

use super::candidates::MatchCandidate;
use super::config::MAX_CANDIDATES_PER_POSITION;
use super::suffix::SuffixIndex;

/// Reference to an interval node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
    pub lcp: u32,
    pub idx: u32,
}

impl NodeRef {
    /// The whole suffix array (LCP 0).
    pub const ROOT: NodeRef = NodeRef { lcp: 0, idx: 0 };

    #[inline]
    fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

/// State of an interval node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalLink {
    /// Not yet walked: link to the enclosing interval.
    Parent(NodeRef),
    /// Last suffix position that walked through this interval.
    Visited(u32),
}

impl IntervalLink {
    #[inline]
    fn visitor(self) -> Option<u32> {
        match self {
            IntervalLink::Visited(pos) => Some(pos),
            IntervalLink::Parent(_) => None,
        }
    }
}

/// Interval tree plus per-position links, consumed by a single forward walk.
pub struct LcpIntervals {
    intervals: Vec<IntervalLink>,
    pos_data: Vec<NodeRef>,
    max_offset: usize,
    /// Next position the walk expects.
    next_pos: usize,
}

impl LcpIntervals {
    /// Build the interval tree from a suffix index.
    ///
    /// Matches farther back than `max_offset` are walked but not reported.
    pub fn new(index: &SuffixIndex, max_offset: usize) -> Self {
        let sa = index.suffix_array();
        let lcp = index.lcp();
        let n = sa.len();

        let mut intervals = Vec::with_capacity(n.max(1));
        intervals.push(IntervalLink::Parent(NodeRef::ROOT));
        let mut pos_data = vec![NodeRef::ROOT; n];

        if n > 0 {
            // Open intervals, innermost last.  The root is never closed.
            let mut open: Vec<NodeRef> = Vec::with_capacity(64);
            open.push(NodeRef::ROOT);
            let mut prev_pos = sa[0] as usize;

            for r in 1..n {
                let next_pos = sa[r] as usize;
                let next_lcp = lcp[r];
                let top = innermost(&open);

                if next_lcp == top.lcp {
                    pos_data[prev_pos] = top;
                } else if next_lcp > top.lcp {
                    let node = open_interval(&mut intervals, next_lcp);
                    open.push(node);
                    pos_data[prev_pos] = node;
                } else {
                    pos_data[prev_pos] = top;
                    while let Some(closed) = open.pop() {
                        let sup = innermost(&open);
                        if next_lcp == sup.lcp {
                            intervals[closed.idx as usize] = IntervalLink::Parent(sup);
                            break;
                        } else if next_lcp > sup.lcp {
                            // A new interval between the closed one and its
                            // enclosing interval.
                            let node = open_interval(&mut intervals, next_lcp);
                            open.push(node);
                            intervals[closed.idx as usize] = IntervalLink::Parent(node);
                            break;
                        }
                        intervals[closed.idx as usize] = IntervalLink::Parent(sup);
                    }
                }
                prev_pos = next_pos;
            }

            pos_data[prev_pos] = innermost(&open);
            while open.len() > 1 {
                if let Some(closed) = open.pop() {
                    intervals[closed.idx as usize] = IntervalLink::Parent(innermost(&open));
                }
            }
        }

        log::trace!("lcp intervals: {} nodes for {} positions", intervals.len(), n);

        Self {
            intervals,
            pos_data,
            max_offset,
            next_pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pos_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos_data.is_empty()
    }

    /// Advance to `cur` and append its matches to `out`, longest first.
    pub fn find_matches_at(&mut self, cur: usize, out: &mut Vec<MatchCandidate>) {
        self.advance(cur, Some(out));
    }

    /// Advance past `cur` without reporting matches.
    pub fn skip_matches_at(&mut self, cur: usize) {
        self.advance(cur, None);
    }

    fn advance(&mut self, cur: usize, mut out: Option<&mut Vec<MatchCandidate>>) {
        debug_assert_eq!(cur, self.next_pos, "positions must be walked in order");
        self.next_pos = cur + 1;

        let cur_u32 = cur as u32;
        let mut node = self.pos_data[cur];
        // No later suffix has matched this one yet.
        self.pos_data[cur] = NodeRef::ROOT;

        // Climb through intervals no earlier suffix has reached, claiming them.
        let mut match_pos = loop {
            match self.intervals[node.idx as usize] {
                IntervalLink::Parent(sup) if sup.lcp > 0 => {
                    self.intervals[node.idx as usize] = IntervalLink::Visited(cur_u32);
                    node = sup;
                }
                IntervalLink::Parent(_) => {
                    if !node.is_root() {
                        self.intervals[node.idx as usize] = IntervalLink::Visited(cur_u32);
                    }
                    return;
                }
                IntervalLink::Visited(pos) => break pos,
            }
        };

        // Climb the rest of the way through the per-position back-links,
        // reporting the most recent occurrence at each level.
        let mut reported = 0usize;
        loop {
            let mut sup = self.pos_data[match_pos as usize];
            while sup > node {
                match self.intervals[sup.idx as usize].visitor() {
                    Some(pos) => match_pos = pos,
                    None => return,
                }
                sup = self.pos_data[match_pos as usize];
            }

            self.intervals[node.idx as usize] = IntervalLink::Visited(cur_u32);
            self.pos_data[match_pos as usize] = node;

            if let Some(out) = out.as_deref_mut() {
                let offset = cur - match_pos as usize;
                if reported < MAX_CANDIDATES_PER_POSITION && offset <= self.max_offset {
                    if let Some(candidate) = MatchCandidate::new(node.lcp as usize, offset) {
                        out.push(candidate);
                        reported += 1;
                    }
                }
            }

            if sup.is_root() {
                return;
            }
            node = sup;
            match self.intervals[node.idx as usize].visitor() {
                Some(pos) => match_pos = pos,
                None => return,
            }
        }
    }
}

#[inline]
fn innermost(open: &[NodeRef]) -> NodeRef {
    open.last().copied().unwrap_or(NodeRef::ROOT)
}

fn open_interval(intervals: &mut Vec<IntervalLink>, lcp: u32) -> NodeRef {
    let node = NodeRef {
        lcp,
        idx: intervals.len() as u32,
    };
    // Overwritten with the real parent when the interval closes.
    intervals.push(IntervalLink::Parent(NodeRef::ROOT));
    node
}

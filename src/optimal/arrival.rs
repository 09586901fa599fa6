// Ranked DP states ("arrivals") for the optimal parser.
//
// Each position keeps up to ARRIVALS_PER_POSITION ways of reaching it, best
// first.  Ways that leave the decoder in the same state (same
// follows-literal flag and repeat offset) compete for one slot, so the table
// holds distinct states rather than near-duplicates.  Tiny inputs get a table
// wide enough for every state they can reach, which makes their parse exact.

use crate::aplib::command::Context;

/// Arrivals kept per position.
pub const ARRIVALS_PER_POSITION: usize = 8;

/// Inputs up to this size (dictionary included) are parsed exhaustively.
pub const EXHAUSTIVE_PARSE_LIMIT: usize = 64;

/// One slot per decoder state reachable within `EXHAUSTIVE_PARSE_LIMIT`
/// bytes: a follows-literal flag times a repeat offset below the limit.
pub const EXHAUSTIVE_ARRIVALS_PER_POSITION: usize = 2 * EXHAUSTIVE_PARSE_LIMIT;

const NO_SOURCE: u32 = u32::MAX;

/// Position and slot of an arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalRef {
    pub pos: usize,
    pub slot: usize,
}

/// One way of reaching a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    /// Stream bits spent from the seed up to here.
    pub cost: u64,
    from_pos: u32,
    from_slot: u8,
    pub follows_literal: bool,
    /// Offset of the last match on this path, 0 before the first.
    pub rep_offset: u32,
    /// Offset of the token ending here (nibble offset for single bytes).
    pub match_offset: u32,
    /// Length of the token ending here; 0 = literal, 1 = nibble command.
    pub match_len: u16,
}

impl Arrival {
    /// The zero-cost starting state of a parse, in decoder state `context`.
    pub fn seed(context: Context) -> Self {
        Self {
            cost: 0,
            from_pos: NO_SOURCE,
            from_slot: 0,
            follows_literal: context.follows_literal,
            rep_offset: context.rep_offset,
            match_offset: 0,
            match_len: 0,
        }
    }

    /// Arrival reached from `from` by a token.
    pub fn new(
        cost: u64,
        from: ArrivalRef,
        context: Context,
        match_offset: u32,
        match_len: u16,
    ) -> Self {
        Self {
            cost,
            from_pos: from.pos as u32,
            from_slot: from.slot as u8,
            follows_literal: context.follows_literal,
            rep_offset: context.rep_offset,
            match_offset,
            match_len,
        }
    }

    /// Back-pointer, `None` for the seed.
    pub fn from(&self) -> Option<ArrivalRef> {
        (self.from_pos != NO_SOURCE).then_some(ArrivalRef {
            pos: self.from_pos as usize,
            slot: usize::from(self.from_slot),
        })
    }

    /// Decoder state after this arrival.
    pub fn context(&self) -> Context {
        Context {
            follows_literal: self.follows_literal,
            rep_offset: self.rep_offset,
        }
    }

    #[inline]
    fn same_state(&self, other: &Arrival) -> bool {
        self.follows_literal == other.follows_literal && self.rep_offset == other.rep_offset
    }

    /// Strict ordering: cheaper, then shorter token, then nearer offset.
    #[inline]
    pub fn ranks_before(&self, other: &Arrival) -> bool {
        (self.cost, self.match_len, self.match_offset)
            < (other.cost, other.match_len, other.match_offset)
    }
}

/// Arrivals for positions `base..=last`, `width` per position.
#[derive(Debug, Clone)]
pub struct ArrivalTable {
    base: usize,
    width: usize,
    slots: Vec<Arrival>,
    counts: Vec<u8>,
}

impl ArrivalTable {
    pub fn new(base: usize, last: usize) -> Self {
        Self::with_width(base, last, ARRIVALS_PER_POSITION)
    }

    /// Table keeping `width` arrivals per position (at most 255).
    pub fn with_width(base: usize, last: usize, width: usize) -> Self {
        let width = width.clamp(1, usize::from(u8::MAX));
        let positions = last + 1 - base;
        Self {
            base,
            width,
            slots: vec![Arrival::seed(Context::START); positions * width],
            counts: vec![0; positions],
        }
    }

    /// Arrivals kept per position.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Last position covered.
    pub fn last(&self) -> usize {
        self.base + self.counts.len() - 1
    }

    /// Live arrivals at `pos`, best first.
    pub fn at(&self, pos: usize) -> &[Arrival] {
        let Some(index) = pos.checked_sub(self.base).filter(|&i| i < self.counts.len()) else {
            return &[];
        };
        let first = index * self.width;
        &self.slots[first..first + usize::from(self.counts[index])]
    }

    pub fn get(&self, r: ArrivalRef) -> Option<&Arrival> {
        self.at(r.pos).get(r.slot)
    }

    /// Offer `arrival` to position `pos`. Returns whether it was kept.
    ///
    /// An arrival in the same decoder state is replaced only by a strictly
    /// better one.  Otherwise the arrival takes a free slot, or evicts the
    /// worst entry if it is strictly cheaper.  Equal-ranked arrivals keep
    /// insertion order.
    pub fn insert(&mut self, pos: usize, arrival: Arrival) -> bool {
        let Some(index) = pos.checked_sub(self.base).filter(|&i| i < self.counts.len()) else {
            return false;
        };
        let width = self.width;
        let first = index * width;
        let slots = &mut self.slots[first..first + width];
        let mut count = usize::from(self.counts[index]);

        if let Some(i) = slots[..count].iter().position(|a| a.same_state(&arrival)) {
            if !arrival.ranks_before(&slots[i]) {
                return false;
            }
            slots.copy_within(i + 1..count, i);
            count -= 1;
        } else if count == width {
            if arrival.cost >= slots[count - 1].cost {
                return false;
            }
            count -= 1;
        }

        let at = slots[..count]
            .iter()
            .position(|a| arrival.ranks_before(a))
            .unwrap_or(count);
        slots.copy_within(at..count, at + 1);
        slots[at] = arrival;
        self.counts[index] = (count + 1) as u8;
        true
    }
}

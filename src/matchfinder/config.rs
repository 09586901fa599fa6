// Match finder limits.
//
// These bound what the suffix-array walk reports.  They follow from the aPLib
// command set and from the memory layout of the interval tree.

/// Shortest match the parser can use (7-bit and repeat forms start at 2).
pub const MIN_MATCH: usize = 2;

/// LCP values are clamped to this, so no candidate is longer.
pub const MAX_MATCH_LEN: usize = 1023;

/// Largest back-reference distance reported.
pub const MAX_OFFSET: usize = 0x1F_FFFF;

/// Candidates kept per position, longest first.
pub const MAX_CANDIDATES_PER_POSITION: usize = 64;

/// Matches at least this long are only tried at their full length.
pub const LEAVE_ALONE_MATCH_SIZE: usize = 120;

/// Suffix array indices are `i32`.
pub const MAX_INPUT_SIZE: usize = i32::MAX as usize;

/// Bytes parsed at a time.  Each block is indexed together with the window
/// before it, so matches still reach back across block boundaries.
pub const BLOCK_SIZE: usize = 1 << 20;

/// Default sliding window: every representable offset.
pub const DEFAULT_WINDOW_SIZE: usize = MAX_OFFSET;

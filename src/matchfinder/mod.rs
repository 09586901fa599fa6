// Suffix-array based match finder.
//
// Build order: `SuffixIndex` (suffix array + LCP), `LcpIntervals` (interval
// tree), then `CandidateTable` (one forward walk over every position).

pub mod candidates;
pub mod config;
pub mod intervals;
pub mod suffix;

pub use candidates::{CandidateTable, MatchCandidate};
pub use intervals::LcpIntervals;
pub use suffix::SuffixIndex;

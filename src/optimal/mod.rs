// Optimal parsing: arrival table, forward parse and path resolution.

pub mod arrival;
pub mod parser;
pub mod resolve;

pub use arrival::{
    ARRIVALS_PER_POSITION, Arrival, ArrivalRef, ArrivalTable, EXHAUSTIVE_PARSE_LIMIT,
};
pub use parser::{PROGRESS_INTERVAL, ParseOrigin, RepSpanCache, parse};
pub use resolve::{FinalMatch, PlacedCommand, ResolvedPath, resolve};

// Back end of the compressor:
//
// - `stats`    command counts, summaries and divisors of a resolved path
// - `encoder`  serialization of resolved paths into an aPLib stream

pub mod encoder;
pub mod stats;

pub use encoder::{StreamEncoder, encode};
pub use stats::{CompressionStats, Summary};

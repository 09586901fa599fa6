// aPLib stream format: bit I/O, command set with its cost model, and a
// reference decoder.

pub mod bits;
pub mod command;
pub mod decoder;

pub use command::{Command, Context};
pub use decoder::{
    DecodeError, decompress, decompress_with_dictionary, decompress_with_limit, decompressed_size,
};

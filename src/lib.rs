//! aplopt: an optimal-parse compressor for the aPLib stream format.
//!
//! The crate provides:
//! - A suffix-array match finder (`matchfinder`)
//! - An arrival-based optimal parser and path resolver (`optimal`)
//! - Statistics and the aPLib stream encoder (`compress`)
//! - The aPLib command set, bit I/O and a reference decoder (`aplib`)
//!
//! Streams are bit-exact aPLib and can be unpacked by any aPLib depacker.
//!
//! # Quick Start
//!
//! ```
//! use aplopt::{CompressOptions, compress_to_vec, decompress};
//!
//! let input = b"hello hello hello hello";
//! let packed = compress_to_vec(input, &CompressOptions::default()).unwrap();
//! assert!(packed.len() < input.len());
//! assert_eq!(decompress(&packed).unwrap(), input);
//! ```

pub mod aplib;
pub mod compress;
pub mod engine;
pub mod error;
pub mod matchfinder;
pub mod optimal;

pub use aplib::decoder::{
    DecodeError, decompress, decompress_with_dictionary, decompress_with_limit, decompressed_size,
};
pub use compress::stats::{CompressionStats, Summary};
pub use engine::{
    CompressFlags, CompressOptions, ProgressFn, compress, compress_to_vec, max_compressed_size,
};
pub use error::CompressError;

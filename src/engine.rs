// Compression engine: ties the match finder, the optimal parser and the
// stream encoder together.
//
// The input is compressed in blocks of BLOCK_SIZE bytes.  For each block:
//   - suffix array, LCP and interval tree over the block and the window
//     before it (matchfinder)
//   - candidate collection for the block's positions
//   - the forward arrival parse and path resolution (optimal), starting
//     from the decoder state the previous block left behind
//   - statistics, then encoding into the caller's buffer (compress)
// Working memory is bounded by the block and window size, not the input.

use bitflags::bitflags;

use crate::compress::encoder::StreamEncoder;
use crate::compress::stats::CompressionStats;
use crate::error::CompressError;
use crate::matchfinder::config::{BLOCK_SIZE, DEFAULT_WINDOW_SIZE, MAX_INPUT_SIZE, MAX_OFFSET};
use crate::matchfinder::{CandidateTable, LcpIntervals, SuffixIndex};
use crate::optimal::{self, ParseOrigin, ResolvedPath};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

bitflags! {
    /// Compression flags.  No flag is defined yet; any value is accepted
    /// and ignored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompressFlags: u32 {
        const _ = !0;
    }
}

/// Configuration for one compression call.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Reserved, pass `CompressFlags::empty()`.
    pub flags: CompressFlags,
    /// Largest match offset to use. Clamped to the format maximum.
    pub max_window_size: usize,
    /// Leading input bytes that matches may refer to but that are not
    /// emitted.  The decoder needs the same prefix.
    pub dictionary_size: usize,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            flags: CompressFlags::empty(),
            max_window_size: DEFAULT_WINDOW_SIZE,
            dictionary_size: 0,
        }
    }
}

/// Progress callback: `(bytes processed, estimated compressed bytes)`.
pub type ProgressFn<'a> = dyn FnMut(u64, u64) + 'a;

// ---------------------------------------------------------------------------
// Size bound
// ---------------------------------------------------------------------------

/// Largest stream `compress` can produce for `input_size` emitted bytes.
///
/// The first byte is stored raw, every other byte costs at most 9 bits, and
/// the end marker takes 11.
pub fn max_compressed_size(input_size: usize) -> usize {
    if input_size == 0 {
        return 0;
    }
    (9 * input_size + 10).div_ceil(8)
}

// ---------------------------------------------------------------------------
// Compressor context
// ---------------------------------------------------------------------------

/// Working state of one compression call.
struct Compressor<'a> {
    input: &'a [u8],
    /// Position of the first emitted byte.
    start: usize,
    max_offset: usize,
    block_size: usize,
}

impl<'a> Compressor<'a> {
    fn new(input: &'a [u8], options: &CompressOptions) -> Result<Self, CompressError> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(CompressError::InvalidInput(format!(
                "input of {} bytes exceeds the {} byte limit",
                input.len(),
                MAX_INPUT_SIZE
            )));
        }
        if options.dictionary_size > input.len() {
            return Err(CompressError::InvalidInput(format!(
                "dictionary of {} bytes is larger than the {} byte input",
                options.dictionary_size,
                input.len()
            )));
        }
        if !options.flags.is_empty() {
            log::debug!("ignoring reserved compression flags {:#x}", options.flags.bits());
        }

        Ok(Self {
            input,
            start: options.dictionary_size,
            max_offset: options.max_window_size.clamp(1, MAX_OFFSET),
            block_size: BLOCK_SIZE,
        })
    }

    #[cfg(test)]
    fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    fn emitted(&self) -> usize {
        self.input.len() - self.start
    }

    /// Match finding, parse and resolution of the block at the end of
    /// `window`.  `origin.start` is relative to `window`.
    fn plan_block(
        &self,
        window: &[u8],
        origin: ParseOrigin,
        progress: &mut ProgressFn<'_>,
    ) -> Result<ResolvedPath, CompressError> {
        let index = SuffixIndex::build(window);
        let mut intervals = LcpIntervals::new(&index, self.max_offset);
        drop(index);
        let candidates = CandidateTable::collect(&mut intervals, origin.start);
        drop(intervals);
        log::debug!(
            "match finder: {} candidates for {} positions ({} bytes of history)",
            candidates.total(),
            window.len() - origin.start,
            origin.start
        );

        let arrivals = optimal::parse(window, origin, &candidates, self.max_offset, progress);
        drop(candidates);

        optimal::resolve(window, origin, &arrivals, self.max_offset)
    }

    /// Compress block by block into `output`.  Returns the stream size and
    /// the statistics of the whole stream.
    fn run(
        &self,
        output: &mut [u8],
        progress: &mut ProgressFn<'_>,
    ) -> Result<(usize, CompressionStats), CompressError> {
        let mut stats = CompressionStats::default();
        if self.emitted() == 0 {
            progress(0, 0);
            return Ok((0, stats));
        }

        let n = self.input.len();
        let blocks = self.emitted().div_ceil(self.block_size);
        let mut stream = StreamEncoder::new(output);
        let mut origin = ParseOrigin::stream(self.start);
        let mut block = 0usize;

        while origin.start < n {
            let block_end = n.min(origin.start.saturating_add(self.block_size));
            let window_start = origin.start.saturating_sub(self.max_offset);
            let window = &self.input[window_start..block_end];
            let local = ParseOrigin {
                start: origin.start - window_start,
                ..origin
            };

            let done = (origin.start - self.start) as u64;
            let written = stream.len() as u64;
            let path = self.plan_block(window, local, &mut |parsed, size| {
                progress(done + parsed, written + size)
            })?;

            stats.record(&path);
            stream.write_path(window, &path);
            block += 1;
            log::debug!(
                "block {block}/{blocks}: {} bytes, {} commands, stream at {} bytes",
                path.emitted,
                path.commands.len(),
                stream.len()
            );
            if block_end < n {
                progress((block_end - self.start) as u64, stream.len() as u64);
            }

            origin = ParseOrigin::resume(block_end, path.end_context);
        }

        stats.select_divisors();
        let written = stream.finish()?;
        stats.compressed_size = written;
        progress(self.emitted() as u64, written as u64);
        Ok((written, stats))
    }
}

// ---------------------------------------------------------------------------
// High-level compress
// ---------------------------------------------------------------------------

/// Compress `input` into `output`, returning the number of bytes written.
///
/// With a dictionary, the first `options.dictionary_size` bytes of `input`
/// are only referenced; the stream starts at the byte after them.  Empty
/// output is returned for empty input.  `progress` is called during the
/// parse, after each block and once at the end with the final sizes;
/// `stats` is filled only on success.
pub fn compress(
    input: &[u8],
    output: &mut [u8],
    options: &CompressOptions,
    mut progress: Option<&mut ProgressFn<'_>>,
    stats: Option<&mut CompressionStats>,
) -> Result<usize, CompressError> {
    let compressor = Compressor::new(input, options)?;

    let mut report = |done: u64, size: u64| {
        if let Some(callback) = progress.as_deref_mut() {
            callback(done, size);
        }
    };

    let (written, collected) = compressor.run(output, &mut report)?;
    log::debug!(
        "compressed {} bytes to {}: {} literals, {} 4-bit, {} 7-bit, {} variable, {} repeat",
        collected.input_size,
        written,
        collected.num_literals,
        collected.num_4bit_matches,
        collected.num_7bit_matches,
        collected.num_variable_matches,
        collected.num_rep_matches
    );

    if let Some(stats) = stats {
        *stats = collected;
    }
    Ok(written)
}

/// Compress into a freshly allocated buffer of exactly the stream size.
pub fn compress_to_vec(input: &[u8], options: &CompressOptions) -> Result<Vec<u8>, CompressError> {
    let emitted = input.len().saturating_sub(options.dictionary_size);
    let mut output = vec![0u8; max_compressed_size(emitted)];
    let written = compress(input, &mut output, options, None, None)?;
    output.truncate(written);
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aplib::decoder::{decompress, decompress_with_dictionary};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn compress_in_blocks(
        input: &[u8],
        options: &CompressOptions,
        block_size: usize,
    ) -> (Vec<u8>, CompressionStats, Vec<(u64, u64)>) {
        let compressor = Compressor::new(input, options)
            .unwrap()
            .with_block_size(block_size);
        let mut output = vec![0u8; max_compressed_size(compressor.emitted())];
        let mut calls = Vec::new();
        let (written, stats) = compressor
            .run(&mut output, &mut |done, size| calls.push((done, size)))
            .unwrap();
        output.truncate(written);
        (output, stats, calls)
    }

    fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random()).collect()
    }

    fn roundtrip(input: &[u8]) -> Vec<u8> {
        let packed = compress_to_vec(input, &CompressOptions::default()).unwrap();
        assert_eq!(decompress(&packed).unwrap(), input);
        packed
    }

    #[test]
    fn bound_formula() {
        assert_eq!(max_compressed_size(0), 0);
        assert_eq!(max_compressed_size(1), 3);
        assert_eq!(max_compressed_size(2), 4);
        assert_eq!(max_compressed_size(100), 114);
    }

    #[test]
    fn roundtrip_basic() {
        roundtrip(b"a");
        roundtrip(b"hello hello hello hello");
        roundtrip(&[0u8; 1000]);
        roundtrip(b"abracadabra, abracadabra!");
    }

    #[test]
    fn empty_input() {
        let mut stats = CompressionStats {
            num_literals: 7,
            ..CompressionStats::default()
        };
        let mut out = [0u8; 4];
        let written = compress(b"", &mut out, &CompressOptions::default(), None, Some(&mut stats));
        assert_eq!(written, Ok(0));
        assert_eq!(stats, CompressionStats::default());
    }

    #[test]
    fn dictionary_larger_than_input_is_rejected() {
        let options = CompressOptions {
            dictionary_size: 10,
            ..CompressOptions::default()
        };
        assert!(matches!(
            compress_to_vec(b"short", &options),
            Err(CompressError::InvalidInput(_))
        ));
    }

    #[test]
    fn dictionary_covering_whole_input_emits_nothing() {
        let options = CompressOptions {
            dictionary_size: 5,
            ..CompressOptions::default()
        };
        assert_eq!(compress_to_vec(b"exact", &options), Ok(Vec::new()));
    }

    #[test]
    fn dictionary_roundtrip() {
        let dictionary = b"the quick brown fox ";
        let mut input = dictionary.to_vec();
        input.extend_from_slice(b"the quick brown fox jumps");
        let options = CompressOptions {
            dictionary_size: dictionary.len(),
            ..CompressOptions::default()
        };
        let packed = compress_to_vec(&input, &options).unwrap();
        assert!(packed.len() < 15);
        assert_eq!(
            decompress_with_dictionary(dictionary, &packed).unwrap(),
            &input[dictionary.len()..]
        );
    }

    #[test]
    fn small_window_still_roundtrips() {
        let mut input = b"0123456789abcdef".repeat(4);
        input.extend_from_slice(&b"0123456789abcdef".repeat(4));
        let options = CompressOptions {
            max_window_size: 8,
            ..CompressOptions::default()
        };
        let packed = compress_to_vec(&input, &options).unwrap();
        assert_eq!(decompress(&packed).unwrap(), input);
    }

    #[test]
    fn reserved_flags_are_ignored() {
        let input = b"flags flags flags";
        let options = CompressOptions {
            flags: CompressFlags::from_bits_retain(0x8000_0001),
            ..CompressOptions::default()
        };
        assert_eq!(
            compress_to_vec(input, &options).unwrap(),
            compress_to_vec(input, &CompressOptions::default()).unwrap()
        );
    }

    #[test]
    fn progress_ends_with_final_sizes() {
        let input = b"progress progress progress".repeat(10);
        let mut calls = Vec::new();
        let mut output = vec![0u8; max_compressed_size(input.len())];
        let written = compress(
            &input,
            &mut output,
            &CompressOptions::default(),
            Some(&mut |done: u64, size: u64| calls.push((done, size))),
            None,
        )
        .unwrap();
        assert_eq!(calls.last(), Some(&(input.len() as u64, written as u64)));
    }

    #[test]
    fn blocks_reach_back_across_boundaries() {
        // Four copies of 3000 random bytes in 1 KiB blocks: every copy after
        // the first is found in earlier blocks.
        let chunk = random_bytes(3000, 11);
        let input = chunk.repeat(4);
        let (packed, stats, _) = compress_in_blocks(&input, &CompressOptions::default(), 1024);
        assert_eq!(decompress(&packed).unwrap(), input);
        assert!(packed.len() < 2 * chunk.len(), "packed {}", packed.len());
        assert_eq!(stats.input_size, input.len());
        assert_eq!(stats.covered_bytes(), input.len() as u64);
        assert_eq!(stats.compressed_size, packed.len());
    }

    #[test]
    fn progress_is_reported_after_each_block() {
        let input = b"block after block after block, ".repeat(200);
        let (packed, _, calls) = compress_in_blocks(&input, &CompressOptions::default(), 2048);
        let boundaries: Vec<u64> = (1..input.len().div_ceil(2048))
            .map(|b| (b * 2048) as u64)
            .collect();
        for boundary in &boundaries {
            assert!(
                calls.iter().any(|&(done, _)| done == *boundary),
                "no report at {boundary}: {calls:?}"
            );
        }
        assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(calls.last(), Some(&(input.len() as u64, packed.len() as u64)));
    }

    #[test]
    fn block_size_does_not_change_the_stream_format() {
        let mut input = b"header ".to_vec();
        input.extend(random_bytes(700, 5));
        input.extend_from_slice(&input.clone());
        input.extend(std::iter::repeat_n(0u8, 900));
        for block_size in [1, 7, 64, 500, 4096] {
            let (packed, stats, _) =
                compress_in_blocks(&input, &CompressOptions::default(), block_size);
            assert_eq!(decompress(&packed).unwrap(), input, "block size {block_size}");
            assert_eq!(stats.covered_bytes(), input.len() as u64);
            assert!(packed.len() <= max_compressed_size(input.len()));
        }
    }

    #[test]
    fn blocks_with_dictionary_and_small_window() {
        let dictionary = random_bytes(600, 21);
        let mut input = dictionary.clone();
        for i in 0..5 {
            input.extend_from_slice(&dictionary[i * 100..i * 100 + 300]);
            input.extend(random_bytes(50, i as u64));
        }
        let options = CompressOptions {
            dictionary_size: dictionary.len(),
            max_window_size: 900,
            ..CompressOptions::default()
        };
        let (packed, stats, _) = compress_in_blocks(&input, &options, 256);
        assert_eq!(
            decompress_with_dictionary(&dictionary, &packed).unwrap(),
            &input[dictionary.len()..]
        );
        assert_eq!(stats.input_size, input.len() - dictionary.len());
        assert_eq!(stats.covered_bytes(), stats.input_size as u64);
    }

    #[test]
    fn single_block_matches_the_public_entry_point() {
        let input = b"one block is enough for this one".repeat(8);
        let (packed, _, _) = compress_in_blocks(&input, &CompressOptions::default(), BLOCK_SIZE);
        assert_eq!(
            packed,
            compress_to_vec(&input, &CompressOptions::default()).unwrap()
        );
    }
}

#![no_main]
use aplopt::{CompressOptions, CompressionStats, compress, decompress, max_compressed_size};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut output = vec![0u8; max_compressed_size(data.len())];
    let mut stats = CompressionStats::default();
    let written = compress(
        data,
        &mut output,
        &CompressOptions::default(),
        None,
        Some(&mut stats),
    )
    .unwrap();

    assert_eq!(stats.compressed_size, written);
    assert_eq!(stats.covered_bytes(), data.len() as u64);

    let decoded = decompress(&output[..written]).unwrap();
    assert_eq!(decoded, data);
});

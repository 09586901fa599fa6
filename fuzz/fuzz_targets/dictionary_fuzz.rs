#![no_main]
use aplopt::{CompressOptions, compress_to_vec, decompress_with_dictionary, max_compressed_size};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First two bytes pick the dictionary split and the window.
    let payload = &data[2..];
    let dictionary_size = usize::from(data[0]) * payload.len() / 256;
    let max_window_size = 1usize << (data[1] % 22);

    let options = CompressOptions {
        dictionary_size,
        max_window_size,
        ..CompressOptions::default()
    };
    let packed = compress_to_vec(payload, &options).unwrap();
    let (dictionary, body) = payload.split_at(dictionary_size);
    assert!(packed.len() <= max_compressed_size(body.len()));

    let decoded = decompress_with_dictionary(dictionary, &packed).unwrap();
    assert_eq!(decoded, body);
});

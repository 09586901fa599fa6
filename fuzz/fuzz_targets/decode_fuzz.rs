#![no_main]
use libfuzzer_sys::fuzz_target;

// Forged streams can ask for multi-gigabyte matches; only rebuild small ones.
const MAX_OUTPUT: usize = 16 << 20;

fuzz_target!(|data: &[u8]| {
    // The decoder must never panic, only return errors.
    match aplopt::decompress_with_limit(data, MAX_OUTPUT) {
        Ok(out) => assert_eq!(aplopt::decompressed_size(data), Ok(out.len())),
        Err(aplopt::DecodeError::OutputLimit { .. }) => {
            assert!(!matches!(aplopt::decompressed_size(data), Ok(size) if size <= MAX_OUTPUT));
        }
        Err(err) => assert_eq!(aplopt::decompressed_size(data), Err(err)),
    }

    // Also fuzz with a dictionary in front.
    if data.len() >= 2 {
        let (dictionary, stream) = data.split_at(data.len() / 2);
        if aplopt::decompressed_size(stream).is_ok_and(|size| size <= MAX_OUTPUT) {
            let _ = aplopt::decompress_with_dictionary(dictionary, stream);
        }
    }
});

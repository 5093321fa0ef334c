#![no_main]
use cryptoki_core::certcodec::compress::unpack;
use cryptoki_core::certcodec::der::parse_length;
use libfuzzer_sys::fuzz_target;

// unpack and parse_length both read attacker-controlled device/command-frame
// bytes; neither should panic on malformed input.
fuzz_target!(|data: &[u8]| {
    let _ = unpack(data);

    for pos in 0..data.len().min(16) {
        let _ = parse_length(data, pos);
    }
});

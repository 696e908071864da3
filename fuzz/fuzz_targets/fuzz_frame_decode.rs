#![no_main]

use libfuzzer_sys::fuzz_target;
use datagram_protocol::{decode, encode};

fuzz_target!(|data: &[u8]| {
    // any datagram: decode must return, and a decoded frame must re-encode to its prefix
    if let Ok(frame) = decode(data) {
        let bytes = encode(&frame);
        assert_eq!(&data[..bytes.len()], &bytes[..]);
    }
});

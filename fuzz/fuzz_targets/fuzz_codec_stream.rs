#![no_main]

use bytes::BytesMut;
use datagram_protocol::FrameCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // the codec must consume every datagram, valid or not
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::from(data);
    let _ = codec.decode(&mut buf);
    assert!(buf.is_empty());
});

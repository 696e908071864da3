#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use bytes::BytesMut;
use common::{config, loopback_any, wait_until, Recorder, WAIT};
use datagram_protocol::{create_data_packet, decode, encode, ClientEngine, FrameCodec, ServerEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::codec::Encoder;

#[test]
fn stress_frame_encode_decode_large_series() {
    // heavy burst of frames, ensure no panics
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::new();

    for size in [0usize, 1, 64, 512, 1480, 16_384, 65_487] {
        for seq in 0..2_000u32 {
            codec
                .encode(create_data_packet(seq, &vec![0u8; size]), &mut buf)
                .unwrap();
            let decoded = decode(&buf).unwrap();
            assert_eq!(decoded.payload().len(), size);
            buf.clear();
        }
    }
}

#[test]
fn stress_decode_garbage_series() {
    let mut garbage = encode(&create_data_packet(0, &[0xAA; 128]));
    for i in 0..10_000usize {
        let idx = i % garbage.len();
        garbage[idx] = garbage[idx].wrapping_add(i as u8);
        let _ = decode(&garbage[..i % (garbage.len() + 1)]);
    }
}

#[test]
fn stress_client_burst_to_server() {
    let server_log = Arc::new(Recorder::default());
    let mut server = ServerEngine::new(config());
    server.register_plugin(server_log.clone()).unwrap();
    let addr = server.start_on(loopback_any()).unwrap();

    let mut client = ClientEngine::new(config());
    client.start(&addr.ip().to_string(), addr.port()).unwrap();

    let total = 1_000u32;
    for seq in 0..total {
        client
            .send_packet(&create_data_packet(seq, &[seq as u8; 256]))
            .unwrap();
        if seq % 100 == 99 {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    // loopback rarely drops, but allow it: every frame that arrives is intact
    assert!(wait_until(WAIT, || server_log.received_count() as u32 >= total * 9 / 10));
    for event in server_log.received() {
        assert_eq!(event.payload, vec![event.seq_id as u8; 256]);
    }
    assert_eq!(server.metrics().snapshot().decode_errors, 0);
    assert_eq!(client.metrics().snapshot().frames_sent, u64::from(total));

    client.stop();
    server.stop();
}

//! Property-based tests using proptest
//!
//! These tests validate framing invariants across a wide range of randomly
//! generated inputs, including arbitrary and truncated datagrams.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use datagram_protocol::config::HEADER_SIZE;
use datagram_protocol::{decode, encode, Frame, FrameCodec, PacketType, ProtocolError};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

fn arb_frame() -> impl Strategy<Value = Frame> {
    (
        any::<u8>(),
        any::<u16>(),
        any::<u32>(),
        any::<u32>(),
        prop::collection::vec(any::<u8>(), 0..2048),
    )
        .prop_map(|(ty, flags, seq, ack, payload)| {
            Frame::new(PacketType::from(ty), seq, payload)
                .with_flags(flags)
                .with_ack_id(ack)
        })
}

// Property: every field survives encode then decode
proptest! {
    #[test]
    fn prop_frame_fields_survive(frame in arb_frame()) {
        let bytes = encode(&frame);
        prop_assert_eq!(bytes.len(), HEADER_SIZE + frame.payload().len());

        let decoded = decode(&bytes).expect("Decoding an encoded frame should not fail");
        prop_assert_eq!(decoded, frame);
    }
}

// Property: the length field always matches the payload
proptest! {
    #[test]
    fn prop_length_tracks_payload(
        first in prop::collection::vec(any::<u8>(), 0..512),
        second in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut frame = Frame::data(1, first);
        frame.set_payload(second.clone());

        prop_assert_eq!(frame.header().length as usize, second.len());
        let bytes = encode(&frame);
        let declared = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        prop_assert_eq!(declared as usize, second.len());
    }
}

// Property: decode never panics on arbitrary input
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
        match decode(&data) {
            Ok(frame) => prop_assert!(frame.encoded_len() <= data.len()),
            Err(e) => prop_assert!(e.is_decode_error()),
        }
    }
}

// Property: any strict prefix of a valid frame is rejected with a size error
proptest! {
    #[test]
    fn prop_truncation_is_detected(
        frame in arb_frame(),
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = encode(&frame);
        let len = cut.index(bytes.len());

        match decode(&bytes[..len]) {
            Err(ProtocolError::FrameTooShort { len: got }) => {
                prop_assert!(len < HEADER_SIZE);
                prop_assert_eq!(got, len);
            }
            Err(ProtocolError::IncompletePayload { declared, available }) => {
                prop_assert!(len >= HEADER_SIZE);
                prop_assert_eq!(declared, frame.payload().len());
                prop_assert_eq!(available, len - HEADER_SIZE);
            }
            other => prop_assert!(false, "unexpected result for prefix {}: {:?}", len, other),
        }
    }
}

// Property: trailing bytes after the payload never change the decoded frame
proptest! {
    #[test]
    fn prop_trailing_bytes_ignored(
        frame in arb_frame(),
        tail in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let mut bytes = encode(&frame);
        bytes.extend_from_slice(&tail);
        prop_assert_eq!(decode(&bytes).unwrap(), frame);
    }
}

// Property: FrameCodec and the free functions agree on the wire format
proptest! {
    #[test]
    fn prop_codec_matches_free_functions(frame in arb_frame()) {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(&frame, &mut buf).unwrap();
        prop_assert_eq!(&buf[..], &encode(&frame)[..]);

        let decoded = codec.decode(&mut buf).unwrap();
        prop_assert_eq!(decoded, Some(frame));
        prop_assert!(buf.is_empty());
    }
}

// Property: encoding is deterministic
proptest! {
    #[test]
    fn prop_encoding_deterministic(frame in arb_frame()) {
        prop_assert_eq!(encode(&frame), encode(&frame.clone()));
    }
}

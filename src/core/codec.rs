//! # Frame Codec
//!
//! Converts a [`Frame`] to and from its contiguous wire representation.
//!
//! [`encode`] and [`decode`] are the synchronous primitives the engines use.
//! [`FrameCodec`] wraps them in the `tokio_util` codec traits with
//! one-datagram-per-frame semantics, so the same format can be driven through
//! `tokio_util::udp::UdpFramed`.
//!
//! ## Decode checks, in order
//! 1. at least [`HEADER_SIZE`] bytes, else `FrameTooShort`
//! 2. magic, else `BadMagic`
//! 3. version, else `UnsupportedVersion`
//! 4. `length` payload bytes present, else `IncompletePayload`
//!
//! Bytes after the declared payload are ignored.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{HEADER_SIZE, MAGIC, MAX_UDP_PAYLOAD, PROTOCOL_VERSION};
use crate::core::frame::{Frame, Header, PacketType};
use crate::error::{ProtocolError, Result};

/// Write `frame` into `dst`: header in field order, then the payload.
pub fn encode_into<B: BufMut>(frame: &Frame, dst: &mut B) {
    let header = frame.header();
    dst.put_u32_le(header.magic);
    dst.put_u8(header.version);
    dst.put_u8(header.packet_type.into());
    dst.put_u16_le(header.flags);
    dst.put_u32_le(header.seq_id);
    dst.put_u32_le(header.ack_id);
    dst.put_u32_le(frame.payload().len() as u32);
    dst.put_slice(frame.payload());
}

/// Encode `frame` into a freshly allocated buffer.
#[inline]
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.encoded_len());
    encode_into(frame, &mut out);
    out
}

/// Parse the fixed header without looking at the payload.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::FrameTooShort { len: bytes.len() });
    }

    let mut buf = &bytes[..HEADER_SIZE];
    let header = Header {
        magic: buf.get_u32_le(),
        version: buf.get_u8(),
        packet_type: PacketType::from(buf.get_u8()),
        flags: buf.get_u16_le(),
        seq_id: buf.get_u32_le(),
        ack_id: buf.get_u32_le(),
        length: buf.get_u32_le(),
    };

    if header.magic != MAGIC {
        return Err(ProtocolError::BadMagic(header.magic));
    }
    if header.version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(header.version));
    }

    Ok(header)
}

/// Decode one frame from the start of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    let header = decode_header(bytes)?;

    let declared = header.length as usize;
    let available = bytes.len() - HEADER_SIZE;
    if declared > available {
        return Err(ProtocolError::IncompletePayload {
            declared,
            available,
        });
    }

    let payload = bytes[HEADER_SIZE..HEADER_SIZE + declared].to_vec();
    Ok(Frame::from_parts(header, payload))
}

/// `tokio_util` codec where every buffer handed to `decode` is one datagram.
///
/// The buffer is always consumed, whether the frame decodes or not, so a
/// framed stream reports a malformed datagram once and moves on.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload_size: usize,
}

impl FrameCodec {
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_UDP_PAYLOAD - HEADER_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.is_empty() {
            return Ok(None);
        }

        let result = decode(&src[..]);
        src.clear();
        result.map(Some)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&Frame>>::encode(self, &item, dst)
    }
}

impl<'a> Encoder<&'a Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &'a Frame, dst: &mut BytesMut) -> Result<()> {
        if item.payload().len() > self.max_payload_size {
            return Err(ProtocolError::OversizedFrame(item.payload().len()));
        }
        dst.reserve(item.encoded_len());
        encode_into(item, dst);
        Ok(())
    }
}

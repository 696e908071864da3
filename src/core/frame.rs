//! # Frame
//!
//! One protocol message: a fixed 20-byte header followed by payload bytes.
//!
//! ## Wire Layout
//! ```text
//! offset  size  field
//!      0     4  magic     0xABCD1234
//!      4     1  version   1
//!      5     1  type      DATA | ACK | SYN | SYN_ACK | FIN | HEARTBEAT | other
//!      6     2  flags     reserved
//!      8     4  seq_id
//!     12     4  ack_id
//!     16     4  length    payload byte count
//!     20     N  payload
//! ```
//! Multi-byte fields are little-endian.
//!
//! `length` is never stored independently of the payload: it is derived from
//! the payload on construction and on every payload update, so a `Frame` always
//! satisfies `header().length as usize == payload().len()`.
//!
//! The length field is a `u32`, so payloads are limited to `u32::MAX` bytes.
//! [`Frame::try_new`] checks that limit; the infallible constructors assume it,
//! which always holds for anything that fits in a UDP datagram.

use crate::config::{HEADER_SIZE, MAGIC, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};

/// Packet type byte.
///
/// The engines never interpret it; unknown values survive a round trip as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Data,
    Ack,
    Syn,
    SynAck,
    Fin,
    Heartbeat,
    Other(u8),
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        match value {
            0 => PacketType::Data,
            1 => PacketType::Ack,
            2 => PacketType::Syn,
            3 => PacketType::SynAck,
            4 => PacketType::Fin,
            5 => PacketType::Heartbeat,
            other => PacketType::Other(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        match value {
            PacketType::Data => 0,
            PacketType::Ack => 1,
            PacketType::Syn => 2,
            PacketType::SynAck => 3,
            PacketType::Fin => 4,
            PacketType::Heartbeat => 5,
            PacketType::Other(other) => other,
        }
    }
}

/// Fixed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u8,
    pub packet_type: PacketType,
    pub flags: u16,
    pub seq_id: u32,
    pub ack_id: u32,
    pub length: u32,
}

/// Header plus payload; see the module docs for the length invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: Header,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame with the protocol magic and version.
    ///
    /// `payload` must be at most `u32::MAX` bytes; use [`Frame::try_new`] when
    /// that is not already guaranteed.
    pub fn new(packet_type: PacketType, seq_id: u32, payload: Vec<u8>) -> Self {
        Self {
            header: Header {
                magic: MAGIC,
                version: PROTOCOL_VERSION,
                packet_type,
                flags: 0,
                seq_id,
                ack_id: 0,
                length: payload.len() as u32,
            },
            payload,
        }
    }

    /// Like [`Frame::new`], but rejects a payload whose size does not fit the
    /// `u32` length field.
    pub fn try_new(packet_type: PacketType, seq_id: u32, payload: Vec<u8>) -> Result<Self> {
        wire_length(payload.len())?;
        Ok(Self::new(packet_type, seq_id, payload))
    }

    /// A DATA frame with zero flags and ack id.
    pub fn data(seq_id: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(PacketType::Data, seq_id, payload.into())
    }

    /// Reassemble a decoded header and payload. `length` is taken from the payload.
    pub(crate) fn from_parts(mut header: Header, payload: Vec<u8>) -> Self {
        header.length = payload.len() as u32;
        Self { header, payload }
    }

    pub fn with_type(mut self, packet_type: PacketType) -> Self {
        self.header.packet_type = packet_type;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.header.flags = flags;
        self
    }

    pub fn with_ack_id(mut self, ack_id: u32) -> Self {
        self.header.ack_id = ack_id;
        self
    }

    pub fn with_seq_id(mut self, seq_id: u32) -> Self {
        self.header.seq_id = seq_id;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    pub fn seq_id(&self) -> u32 {
        self.header.seq_id
    }

    pub fn ack_id(&self) -> u32 {
        self.header.ack_id
    }

    pub fn flags(&self) -> u16 {
        self.header.flags
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replace the payload, keeping `length` in step. Same size limit as [`Frame::new`].
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.header.length = payload.len() as u32;
        self.payload = payload;
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Payload size as written to the `length` field.
pub(crate) fn wire_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ProtocolError::OversizedFrame(len))
}

/// Build a DATA frame for `seq_id` carrying `payload`.
pub fn create_data_packet(seq_id: u32, payload: &[u8]) -> Frame {
    Frame::data(seq_id, payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_sets_constants() {
        let frame = create_data_packet(5, &[1, 2, 3, 4]);
        let header = frame.header();
        assert_eq!(header.magic, 0xABCD_1234);
        assert_eq!(header.version, 1);
        assert_eq!(header.packet_type, PacketType::Data);
        assert_eq!(header.flags, 0);
        assert_eq!(header.seq_id, 5);
        assert_eq!(header.ack_id, 0);
        assert_eq!(header.length, 4);
        assert_eq!(frame.encoded_len(), 24);
    }

    #[test]
    fn set_payload_updates_length() {
        let mut frame = Frame::data(1, vec![0u8; 8]);
        frame.set_payload(vec![9; 3]);
        assert_eq!(frame.header().length, 3);
        assert_eq!(frame.payload(), &[9, 9, 9]);

        frame.set_payload(Vec::new());
        assert_eq!(frame.header().length, 0);
    }

    #[test]
    fn packet_type_byte_mapping() {
        for byte in 0u8..=255 {
            let ty = PacketType::from(byte);
            assert_eq!(u8::from(ty), byte);
        }
        assert_eq!(PacketType::from(3), PacketType::SynAck);
        assert_eq!(PacketType::from(42), PacketType::Other(42));
    }

    #[test]
    fn length_field_limit() {
        assert_eq!(wire_length(0).unwrap(), 0);
        assert_eq!(wire_length(u32::MAX as usize).unwrap(), u32::MAX);

        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            wire_length(u32::MAX as usize + 1),
            Err(ProtocolError::OversizedFrame(len)) if len == u32::MAX as usize + 1
        ));

        let frame = Frame::try_new(PacketType::Ack, 2, vec![1; 16]).unwrap();
        assert_eq!(frame.header().length, 16);
    }

    #[test]
    fn builders_touch_only_their_field() {
        let frame = Frame::data(7, b"hi".to_vec())
            .with_type(PacketType::Heartbeat)
            .with_flags(0x8001)
            .with_ack_id(6);
        assert_eq!(frame.packet_type(), PacketType::Heartbeat);
        assert_eq!(frame.flags(), 0x8001);
        assert_eq!(frame.ack_id(), 6);
        assert_eq!(frame.seq_id(), 7);
        assert_eq!(frame.header().length, 2);
    }
}

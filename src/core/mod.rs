//! # Core Protocol Components
//!
//! Frame model and the binary codec.
//!
//! ## Components
//! - **Frame**: header fields plus payload, with `length` tied to the payload
//! - **Codec**: pure encode/decode functions and a `tokio_util` datagram codec
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version(1)] [Type(1)] [Flags(2)] [SeqId(4)] [AckId(4)] [Length(4)] [Payload(N)]
//! ```
//!
//! One frame per UDP datagram; there is no fragmentation, so payloads must fit
//! in a datagram alongside the 20-byte header.

pub mod codec;
pub mod frame;

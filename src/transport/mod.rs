//! # Transport Layer
//!
//! Owner of the OS UDP socket used by an engine, with raw open/close,
//! send-bytes and bounded receive-bytes primitives. No framing, no retries.

pub mod udp;

pub use udp::Transport;

//! # Error Types
//!
//! Error handling for the datagram protocol.
//!
//! This module defines every error variant that can occur while framing,
//! sending, receiving or configuring, from raw socket failures up to
//! malformed frames.
//!
//! ## Error Categories
//! - **Decode Errors**: truncated header, truncated payload, bad magic, unknown version.
//!   These are local to a single datagram; the receive loop logs and drops them.
//! - **Socket Errors**: socket creation and bind failures, fatal to `start()`.
//! - **Send Errors**: the OS refused the datagram or accepted only part of it.
//! - **Lifecycle Errors**: starting a running engine, sending on a stopped one.
//!
//! ## Example Usage
//! ```rust
//! use datagram_protocol::core::codec::decode;
//! use datagram_protocol::error::ProtocolError;
//!
//! match decode(&[0u8; 10]) {
//!     Err(ProtocolError::FrameTooShort { len }) => assert_eq!(len, 10),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Error message constants for the lock-related paths.
pub mod constants {
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on plugin registry";
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on plugin registry";
    pub const ERR_PEER_TABLE_LOCK: &str = "Failed to acquire lock on peer table";
    pub const ERR_TRANSPORT_LOCK: &str = "Failed to acquire lock on transport socket";
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame too short: {len} bytes (header is 20 bytes)")]
    FrameTooShort { len: usize },

    #[error("Incomplete payload: header declares {declared} bytes, {available} available")]
    IncompletePayload { declared: usize, available: usize },

    #[error("Bad magic: 0x{0:08X}")]
    BadMagic(u32),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Failed to create socket: {0}")]
    SocketCreateFailure(#[source] io::Error),

    #[error("Failed to bind {addr}: {source}")]
    BindFailure {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to send to {addr}: {source}")]
    SendFailure {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Partial send: {sent} of {expected} bytes accepted")]
    PartialSend { sent: usize, expected: usize },

    #[error("Transport is closed")]
    TransportClosed,

    #[error("Engine already running")]
    AlreadyRunning,

    #[error("Engine not running")]
    NotRunning,

    #[error("Address resolution failed: {0}")]
    AddressResolution(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Synchronization primitive poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl ProtocolError {
    /// True for failures that concern a single inbound datagram.
    ///
    /// The receive loop drops the datagram and keeps running on these.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::FrameTooShort { .. }
                | ProtocolError::IncompletePayload { .. }
                | ProtocolError::BadMagic(_)
                | ProtocolError::UnsupportedVersion(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_classified() {
        assert!(ProtocolError::FrameTooShort { len: 3 }.is_decode_error());
        assert!(ProtocolError::IncompletePayload {
            declared: 100,
            available: 0
        }
        .is_decode_error());
        assert!(ProtocolError::BadMagic(0).is_decode_error());
        assert!(ProtocolError::UnsupportedVersion(9).is_decode_error());
        assert!(!ProtocolError::NotRunning.is_decode_error());
        assert!(!ProtocolError::TransportClosed.is_decode_error());
    }

    #[test]
    fn bad_magic_renders_hex() {
        let msg = ProtocolError::BadMagic(0xDEADBEEF).to_string();
        assert_eq!(msg, "Bad magic: 0xDEADBEEF");
    }
}

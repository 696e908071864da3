//! # Datagram Protocol
//!
//! Binary packet framing over UDP and a dual-role socket engine that reports
//! every send and receive to pluggable observers.
//!
//! ## Layers
//! - [`core`]: the [`Frame`] model and its fixed 20-byte header codec
//! - [`protocol`]: the [`Plugin`] trait and the [`PluginRegistry`] fan-out
//! - [`transport`]: the owner of one OS UDP socket
//! - [`service`]: [`ServerEngine`] and [`ClientEngine`]
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics
//!
//! This crate does framing and dispatch only. Packet types such as SYN, ACK or
//! HEARTBEAT are carried on the wire but never interpreted: there is no
//! retransmission, ordering, acknowledgement or fragmentation.
//!
//! ## Example
//! ```rust,no_run
//! use datagram_protocol::{create_data_packet, ClientEngine, Frame, Plugin, ServerEngine};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl Plugin for Printer {
//!     fn on_send(&self, frame: &Frame, peer: &SocketAddr) {
//!         println!("sent #{} to {peer}", frame.seq_id());
//!     }
//!     fn on_receive(&self, frame: &Frame, peer: &SocketAddr) {
//!         println!("got #{} from {peer}", frame.seq_id());
//!     }
//! }
//!
//! # fn main() -> datagram_protocol::Result<()> {
//! let mut server = ServerEngine::default();
//! server.register_plugin(Arc::new(Printer))?;
//! server.start(9000)?;
//!
//! let mut client = ClientEngine::default();
//! client.start("127.0.0.1", 9000)?;
//! client.send_packet(&create_data_packet(1, b"hello"))?;
//!
//! client.stop();
//! server.stop();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::codec::{decode, encode, FrameCodec};
pub use crate::core::frame::{create_data_packet, Frame, Header, PacketType};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::registry::{Plugin, PluginRegistry};
pub use crate::service::client::ClientEngine;
pub use crate::service::server::{PeerRecord, ServerEngine};
pub use crate::transport::Transport;

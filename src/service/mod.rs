//! # Socket Engines
//!
//! The two engine roles built from a [`Transport`], a background receive loop
//! and a [`PluginRegistry`]:
//!
//! - [`ServerEngine`](server::ServerEngine): binds a port, serves many peers,
//!   keeps a last-seen table per peer address.
//! - [`ClientEngine`](client::ClientEngine): resolves one peer at start and
//!   attributes everything it receives to that peer.
//!
//! Both run exactly one receive thread between `start` and `stop`. `stop`
//! joins that thread before closing the socket, so once it returns no plugin
//! hook fires for that engine again.

pub mod client;
mod receiver;
pub mod server;

use std::net::SocketAddr;
use tracing::warn;

use crate::core::codec::encode;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::PluginRegistry;
use crate::transport::Transport;
use crate::utils::metrics::Metrics;

/// Outbound path shared by both roles: encode, send, then notify on success.
pub(crate) fn send_frame(
    transport: &Transport,
    registry: &PluginRegistry,
    metrics: &Metrics,
    max_payload_size: usize,
    frame: &Frame,
    peer: &SocketAddr,
) -> Result<()> {
    if frame.payload().len() > max_payload_size {
        metrics.send_error();
        return Err(ProtocolError::OversizedFrame(frame.payload().len()));
    }

    let bytes = encode(frame);
    if let Err(e) = transport.send(peer, &bytes) {
        metrics.send_error();
        warn!(peer = %peer, seq_id = frame.seq_id(), error = %e, "Failed to send frame");
        return Err(e);
    }
    metrics.frame_sent(bytes.len() as u64);

    let panicked = registry.notify_send(frame, peer)?;
    if panicked > 0 {
        metrics.plugin_panicked(panicked as u64);
    }
    Ok(())
}

//! Background receive loop shared by both engine roles.
//!
//! One thread per engine polls the transport for at most `poll_interval`,
//! decodes whatever arrived and fans the frame out to the plugins. The stop
//! flag is checked once per poll cycle; the owning engine joins the thread
//! before closing the transport.
//!
//! Every failure inside an iteration (malformed datagram, socket error,
//! poisoned lock) is logged, counted and dropped. Nothing ends the loop except
//! the stop flag.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::codec::decode;
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::PluginRegistry;
use crate::transport::Transport;
use crate::utils::metrics::Metrics;

pub(crate) struct ReceiveLoop {
    pub role: &'static str,
    pub transport: Arc<Transport>,
    pub registry: PluginRegistry,
    pub metrics: Arc<Metrics>,
    pub running: Arc<AtomicBool>,
    pub poll_interval: Duration,
    pub buffer_size: usize,
}

impl ReceiveLoop {
    /// Start the loop thread. `attribute` maps the OS-reported sender of a
    /// decoded frame to the peer address plugins see.
    pub fn spawn<F>(self, attribute: F) -> Result<JoinHandle<()>>
    where
        F: FnMut(SocketAddr) -> Result<SocketAddr> + Send + 'static,
    {
        thread::Builder::new()
            .name(format!("{}-recv", self.role))
            .spawn(move || self.run(attribute))
            .map_err(ProtocolError::Io)
    }

    fn run<F>(self, mut attribute: F)
    where
        F: FnMut(SocketAddr) -> Result<SocketAddr>,
    {
        let mut buffer = vec![0u8; self.buffer_size];
        debug!(role = self.role, "Receive loop started");

        while self.running.load(Ordering::Acquire) {
            if let Err(e) = self.poll_once(&mut buffer, &mut attribute) {
                self.metrics.receive_error();
                warn!(role = self.role, error = %e, "Receive loop iteration failed");
                // keep a persistent socket error from spinning the thread
                thread::sleep(self.poll_interval);
            }
        }

        debug!(role = self.role, "Receive loop exited");
    }

    fn poll_once<F>(&self, buffer: &mut [u8], attribute: &mut F) -> Result<()>
    where
        F: FnMut(SocketAddr) -> Result<SocketAddr>,
    {
        let Some((len, from)) = self
            .transport
            .receive_nonblocking(buffer, self.poll_interval)?
        else {
            return Ok(());
        };
        self.metrics.datagram_received(len as u64);

        let frame = match decode(&buffer[..len]) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.decode_error();
                warn!(role = self.role, peer = %from, bytes = len, error = %e, "Dropping malformed datagram");
                return Ok(());
            }
        };

        let peer = attribute(from)?;
        self.metrics.frame_received();

        let panicked = self.registry.notify_receive(&frame, &peer)?;
        if panicked > 0 {
            self.metrics.plugin_panicked(panicked as u64);
        }
        Ok(())
    }
}

//! Client engine
//!
//! Talks to exactly one peer, resolved once at start. Inbound frames are
//! attributed to that peer regardless of the source address the OS reports,
//! and outbound frames always go to it; a stray datagram from elsewhere can
//! never retarget the client.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, instrument};

use super::receiver::ReceiveLoop;
use super::send_frame;
use crate::config::NetworkConfig;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::{Plugin, PluginRegistry};
use crate::transport::udp::domain_for;
use crate::transport::Transport;
use crate::utils::metrics::Metrics;

/// Single-peer engine: one ephemeral UDP socket, one receive thread.
pub struct ClientEngine {
    config: NetworkConfig,
    transport: Arc<Transport>,
    registry: PluginRegistry,
    metrics: Arc<Metrics>,
    peer: Option<SocketAddr>,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ClientEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEngine")
            .field("running", &self.is_running())
            .field("peer", &self.peer)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Default for ClientEngine {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl ClientEngine {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            transport: Arc::new(Transport::new()),
            registry: PluginRegistry::new(),
            metrics: Arc::new(Metrics::new()),
            peer: None,
            running: Arc::new(AtomicBool::new(false)),
            receiver: None,
        }
    }

    /// Target `ip:port`. Returns the local address the client bound.
    pub fn start(&mut self, ip: &str, port: u16) -> Result<SocketAddr> {
        self.start_addr((ip, port))
    }

    /// Target the address from `config.client`.
    pub fn start_from_config(&mut self) -> Result<SocketAddr> {
        let address = self.config.client.address.clone();
        self.start_addr(address.as_str())
    }

    /// Target the first address `addr` resolves to.
    pub fn start_addr<A: ToSocketAddrs>(&mut self, addr: A) -> Result<SocketAddr> {
        if self.is_running() {
            return Err(ProtocolError::AlreadyRunning);
        }

        let peer = addr
            .to_socket_addrs()
            .map_err(|e| ProtocolError::AddressResolution(e.to_string()))?
            .next()
            .ok_or_else(|| {
                ProtocolError::AddressResolution("no address resolved".to_string())
            })?;

        self.start_peer(peer)
    }

    #[instrument(skip(self), fields(role = "client"))]
    fn start_peer(&mut self, peer: SocketAddr) -> Result<SocketAddr> {
        self.config.validate_strict()?;

        let local = match self.open_ephemeral(peer) {
            Ok(local) => local,
            Err(e) => {
                self.transport.close();
                error!(peer = %peer, error = %e, "Client failed to start");
                return Err(e);
            }
        };

        self.running.store(true, Ordering::Release);
        let receive_loop = ReceiveLoop {
            role: "client",
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            running: self.running.clone(),
            poll_interval: self.config.transport.poll_interval,
            buffer_size: self.config.transport.recv_buffer_size,
        };

        let spawned = receive_loop.spawn(move |from| {
            if from != peer {
                debug!(peer = %peer, source = %from, "Datagram from unexpected source");
            }
            Ok(peer)
        });

        match spawned {
            Ok(handle) => self.receiver = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.transport.close();
                error!(error = %e, "Failed to spawn client receive loop");
                return Err(e);
            }
        }

        self.peer = Some(peer);
        info!(peer = %peer, local = %local, "Client started");
        Ok(local)
    }

    fn open_ephemeral(&self, peer: SocketAddr) -> Result<SocketAddr> {
        let unspecified = match peer.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        self.transport
            .open(domain_for(&peer), &self.config.transport)?;
        self.transport.bind(SocketAddr::new(unspecified, 0))?;
        self.transport.local_addr()
    }

    /// Stop the receive loop, wait for it to exit, then close the socket.
    /// A no-op when already stopped.
    pub fn stop(&mut self) {
        let Some(handle) = self.receiver.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            error!("Client receive loop panicked");
        }
        self.transport.close();
        self.peer = None;
        info!("Client stopped");
        self.metrics.log_metrics();
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    /// The peer resolved at start, while running.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        if !self.is_running() {
            return Err(ProtocolError::NotRunning);
        }
        self.transport.local_addr()
    }

    /// Encode and send `frame` to the peer; plugins see it only if the send succeeded.
    pub fn send_packet(&self, frame: &Frame) -> Result<()> {
        let peer = self.peer.ok_or(ProtocolError::NotRunning)?;
        send_frame(
            &self.transport,
            &self.registry,
            &self.metrics,
            self.config.transport.max_payload_size,
            frame,
            &peer,
        )
    }

    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        self.registry.register(plugin)
    }

    pub fn unregister_plugin(&self, plugin: &Arc<dyn Plugin>) -> Result<bool> {
        self.registry.unregister(plugin)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

impl Drop for ClientEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

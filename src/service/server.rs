//! Server engine
//!
//! Binds a listening port and serves any number of peers. Every successfully
//! decoded datagram refreshes the sender's [`PeerRecord`] before plugins are
//! notified. Records are never evicted by the engine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{error, info, instrument};

use super::receiver::ReceiveLoop;
use super::send_frame;
use crate::config::NetworkConfig;
use crate::core::frame::Frame;
use crate::error::constants::ERR_PEER_TABLE_LOCK;
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::{Plugin, PluginRegistry};
use crate::transport::udp::domain_for;
use crate::transport::Transport;
use crate::utils::metrics::Metrics;
use crate::utils::time::{millis_since, Clock, SystemClock};

type PeerTable = Arc<RwLock<HashMap<SocketAddr, PeerRecord>>>;

/// What the server knows about one remote address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRecord {
    pub address: SocketAddr,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub frames_received: u64,
}

impl PeerRecord {
    fn new(address: SocketAddr, now: Instant) -> Self {
        Self {
            address,
            first_seen: now,
            last_seen: now,
            frames_received: 0,
        }
    }

    fn touch(&mut self, now: Instant) {
        // never move backwards, whatever the clock does
        self.last_seen = self.last_seen.max(now);
        self.frames_received += 1;
    }

    /// Last-seen time as monotonic milliseconds since `epoch`.
    pub fn last_seen_ms(&self, epoch: Instant) -> u64 {
        millis_since(epoch, self.last_seen)
    }
}

/// Many-peer engine: one bound UDP socket, one receive thread, a peer table.
pub struct ServerEngine {
    config: NetworkConfig,
    transport: Arc<Transport>,
    registry: PluginRegistry,
    metrics: Arc<Metrics>,
    peers: PeerTable,
    clock: Arc<dyn Clock>,
    epoch: Instant,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ServerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEngine")
            .field("running", &self.is_running())
            .field("registry", &self.registry)
            .field("peers", &self.peer_count())
            .finish()
    }
}

impl Default for ServerEngine {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl ServerEngine {
    pub fn new(config: NetworkConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a server whose peer timestamps come from `clock`.
    pub fn with_clock(config: NetworkConfig, clock: Arc<dyn Clock>) -> Self {
        let epoch = clock.now();
        Self {
            config,
            transport: Arc::new(Transport::new()),
            registry: PluginRegistry::new(),
            metrics: Arc::new(Metrics::new()),
            peers: Arc::new(RwLock::new(HashMap::new())),
            clock,
            epoch,
            running: Arc::new(AtomicBool::new(false)),
            receiver: None,
        }
    }

    /// Listen on `port` at the configured bind address (default `0.0.0.0`).
    ///
    /// Returns the bound local address.
    pub fn start(&mut self, port: u16) -> Result<SocketAddr> {
        let addr = SocketAddr::new(self.config.server.bind_address, port);
        self.start_on(addr)
    }

    /// Listen on the address from `config.server`.
    pub fn start_from_config(&mut self) -> Result<SocketAddr> {
        let addr = self.config.server.socket_addr();
        self.start_on(addr)
    }

    /// Listen on an explicit address. An invalid config or a failed bind
    /// leaves the engine stopped and holding no socket.
    #[instrument(skip(self), fields(role = "server"))]
    pub fn start_on(&mut self, addr: SocketAddr) -> Result<SocketAddr> {
        if self.is_running() {
            return Err(ProtocolError::AlreadyRunning);
        }
        self.config.validate_strict()?;

        let local = match self.open_and_bind(addr) {
            Ok(local) => local,
            Err(e) => {
                self.transport.close();
                error!(address = %addr, error = %e, "Server failed to start");
                return Err(e);
            }
        };

        self.running.store(true, Ordering::Release);
        let receive_loop = ReceiveLoop {
            role: "server",
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            running: self.running.clone(),
            poll_interval: self.config.transport.poll_interval,
            buffer_size: self.config.transport.recv_buffer_size,
        };

        let peers = self.peers.clone();
        let clock = self.clock.clone();
        let spawned = receive_loop.spawn(move |from| {
            let now = clock.now();
            let mut table = peers
                .write()
                .map_err(|_| ProtocolError::LockPoisoned(ERR_PEER_TABLE_LOCK))?;
            table
                .entry(from)
                .or_insert_with(|| PeerRecord::new(from, now))
                .touch(now);
            Ok(from)
        });

        match spawned {
            Ok(handle) => self.receiver = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.transport.close();
                error!(error = %e, "Failed to spawn server receive loop");
                return Err(e);
            }
        }

        info!(address = %local, "Server started");
        Ok(local)
    }

    fn open_and_bind(&self, addr: SocketAddr) -> Result<SocketAddr> {
        self.transport
            .open(domain_for(&addr), &self.config.transport)?;
        self.transport.bind(addr)?;
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
            error!("Server receive loop panicked");
        }
        self.transport.close();
        info!("Server stopped");
        self.metrics.log_metrics();
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        if !self.is_running() {
            return Err(ProtocolError::NotRunning);
        }
        self.transport.local_addr()
    }

    /// Encode and send `frame` to `peer`; plugins see it only if the send succeeded.
    pub fn send_packet(&self, frame: &Frame, peer: &SocketAddr) -> Result<()> {
        if !self.is_running() {
            return Err(ProtocolError::NotRunning);
        }
        send_frame(
            &self.transport,
            &self.registry,
            &self.metrics,
            self.config.transport.max_payload_size,
            frame,
            peer,
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

    /// Reference point for [`PeerRecord::last_seen_ms`].
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Snapshot of the peer table.
    pub fn peers(&self) -> Result<Vec<PeerRecord>> {
        let table = self
            .peers
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_PEER_TABLE_LOCK))?;
        Ok(table.values().copied().collect())
    }

    pub fn peer(&self, addr: &SocketAddr) -> Result<Option<PeerRecord>> {
        let table = self
            .peers
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_PEER_TABLE_LOCK))?;
        Ok(table.get(addr).copied())
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().map(|t| t.len()).unwrap_or(0)
    }
}

impl Drop for ServerEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Clock that only moves when told to.
    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn peer_record_never_moves_backwards() {
        let start = Instant::now();
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let mut record = PeerRecord::new(addr, start);

        record.touch(start + Duration::from_millis(50));
        record.touch(start + Duration::from_millis(20));

        assert_eq!(record.last_seen_ms(start), 50);
        assert_eq!(record.first_seen, start);
        assert_eq!(record.frames_received, 2);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let mut server = ServerEngine::default();
        server.stop();
        server.stop();
        assert!(!server.is_running());
        assert!(matches!(server.local_addr(), Err(ProtocolError::NotRunning)));
    }

    #[test]
    fn send_requires_running_engine() {
        let server = ServerEngine::default();
        let frame = crate::core::frame::create_data_packet(1, b"x");
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        assert!(matches!(
            server.send_packet(&frame, &peer),
            Err(ProtocolError::NotRunning)
        ));
    }

    #[test]
    fn epoch_comes_from_injected_clock() {
        let clock = Arc::new(ManualClock {
            now: Mutex::new(Instant::now()),
        });
        let server = ServerEngine::with_clock(NetworkConfig::default(), clock.clone());
        clock.advance(Duration::from_millis(5));
        assert_eq!(millis_since(server.epoch(), clock.now()), 5);
    }
}

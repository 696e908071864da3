//! # UDP Transport
//!
//! Thin owner of one OS UDP socket and its raw primitives.
//!
//! The socket lives behind an `RwLock<Option<_>>`: `open`/`close` take the
//! write lock, `send`/`receive_nonblocking` share the read lock. Engines hand
//! an `Arc<Transport>` to their receive thread and only close it after that
//! thread has been joined, so the handle is closed exactly once and never
//! underneath a pending receive.
//!
//! Sockets are created with `socket2` so the transport can exist before it is
//! bound (the server binds explicitly; the client binds an ephemeral port).

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::TransportConfig;
use crate::error::constants::ERR_TRANSPORT_LOCK;
use crate::error::{ProtocolError, Result};

/// Smallest poll window handed to the OS; a zero read timeout means "block forever".
const MIN_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
pub struct Transport {
    socket: RwLock<Option<UdpSocket>>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the socket for `domain` and apply the configured socket options.
    ///
    /// Opening an already open transport keeps the existing handle.
    pub fn open(&self, domain: Domain, config: &TransportConfig) -> Result<()> {
        let mut slot = self
            .socket
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TRANSPORT_LOCK))?;
        if slot.is_some() {
            return Ok(());
        }

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(ProtocolError::SocketCreateFailure)?;
        apply_socket_options(&socket, domain, config).map_err(ProtocolError::SocketCreateFailure)?;

        *slot = Some(socket.into());
        debug!(?domain, "UDP socket opened");
        Ok(())
    }

    /// Bind the open socket to `addr`.
    pub fn bind(&self, addr: SocketAddr) -> Result<()> {
        let slot = self
            .socket
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TRANSPORT_LOCK))?;
        let socket = slot.as_ref().ok_or(ProtocolError::TransportClosed)?;

        SockRef::from(socket)
            .bind(&addr.into())
            .map_err(|source| ProtocolError::BindFailure { addr, source })
    }

    /// Release the socket. Safe to call any number of times.
    pub fn close(&self) {
        let closed = self
            .socket
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if closed.is_some() {
            debug!("UDP socket closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.socket.read().map(|s| s.is_some()).unwrap_or(false)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        let slot = self
            .socket
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TRANSPORT_LOCK))?;
        let socket = slot.as_ref().ok_or(ProtocolError::TransportClosed)?;
        Ok(socket.local_addr()?)
    }

    /// Send `bytes` as one datagram. Succeeds only if the OS took every byte.
    pub fn send(&self, addr: &SocketAddr, bytes: &[u8]) -> Result<()> {
        let slot = self
            .socket
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TRANSPORT_LOCK))?;
        let socket = slot.as_ref().ok_or(ProtocolError::TransportClosed)?;

        let sent = socket
            .send_to(bytes, addr)
            .map_err(|source| ProtocolError::SendFailure {
                addr: *addr,
                source,
            })?;
        if sent != bytes.len() {
            return Err(ProtocolError::PartialSend {
                sent,
                expected: bytes.len(),
            });
        }

        trace!(peer = %addr, bytes = sent, "Datagram sent");
        Ok(())
    }

    /// Wait up to `timeout` for one datagram.
    ///
    /// Returns `Ok(None)` when nothing arrived in the window; that is the
    /// normal idle outcome, not an error.
    pub fn receive_nonblocking(
        &self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>> {
        let slot = self
            .socket
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TRANSPORT_LOCK))?;
        let socket = slot.as_ref().ok_or(ProtocolError::TransportClosed)?;

        socket.set_read_timeout(Some(timeout.max(MIN_POLL)))?;
        match socket.recv_from(buffer) {
            Ok((len, from)) => {
                trace!(peer = %from, bytes = len, "Datagram received");
                Ok(Some((len, from)))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(ProtocolError::Io(e)),
        }
    }
}

/// Applies socket options from configuration before the socket is used.
fn apply_socket_options(
    socket: &Socket,
    domain: Domain,
    config: &TransportConfig,
) -> std::io::Result<()> {
    if let Some(size) = config.socket_recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }

    if let Some(size) = config.socket_send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }

    if let Some(ttl) = config.ttl {
        if domain == Domain::IPV6 {
            socket.set_unicast_hops_v6(ttl)?;
        } else {
            socket.set_ttl(ttl)?;
        }
    }

    Ok(())
}

/// Socket domain matching the address family of `addr`.
pub fn domain_for(addr: &SocketAddr) -> Domain {
    Domain::for_address(*addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn bound() -> Transport {
        let transport = Transport::new();
        transport
            .open(Domain::IPV4, &TransportConfig::default())
            .unwrap();
        transport.bind(loopback()).unwrap();
        transport
    }

    #[test]
    fn close_is_idempotent() {
        let transport = bound();
        assert!(transport.is_open());
        transport.close();
        transport.close();
        assert!(!transport.is_open());
    }

    #[test]
    fn operations_on_closed_transport_fail() {
        let transport = Transport::new();
        let mut buf = [0u8; 32];
        assert!(matches!(
            transport.send(&loopback(), b"x"),
            Err(ProtocolError::TransportClosed)
        ));
        assert!(matches!(
            transport.receive_nonblocking(&mut buf, Duration::from_millis(5)),
            Err(ProtocolError::TransportClosed)
        ));
        assert!(matches!(
            transport.bind(loopback()),
            Err(ProtocolError::TransportClosed)
        ));
    }

    #[test]
    fn idle_poll_returns_none() {
        let transport = bound();
        let mut buf = [0u8; 32];
        let got = transport
            .receive_nonblocking(&mut buf, Duration::from_millis(10))
            .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn datagram_round_trip() {
        let a = bound();
        let b = bound();
        let b_addr = b.local_addr().unwrap();

        a.send(&b_addr, b"hello").unwrap();

        let mut buf = [0u8; 64];
        let mut got = None;
        for _ in 0..100 {
            got = b
                .receive_nonblocking(&mut buf, Duration::from_millis(10))
                .unwrap();
            if got.is_some() {
                break;
            }
        }
        let (len, from) = got.expect("datagram should arrive on loopback");
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[test]
    fn bind_conflict_reports_bind_failure() {
        let first = bound();
        let taken = first.local_addr().unwrap();

        let second = Transport::new();
        second
            .open(Domain::IPV4, &TransportConfig::default())
            .unwrap();
        assert!(matches!(
            second.bind(taken),
            Err(ProtocolError::BindFailure { .. })
        ));
    }
}

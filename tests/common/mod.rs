//! Shared helpers for the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use datagram_protocol::config::NetworkConfig;
use datagram_protocol::{Frame, Plugin};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One observed hook invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub seq_id: u32,
    pub peer: SocketAddr,
    pub payload: Vec<u8>,
}

/// Plugin that records every hook call.
#[derive(Default)]
pub struct Recorder {
    pub sent: Mutex<Vec<Event>>,
    pub received: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn sent(&self) -> Vec<Event> {
        self.sent.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<Event> {
        self.received.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

fn event(frame: &Frame, peer: &SocketAddr) -> Event {
    Event {
        seq_id: frame.seq_id(),
        peer: *peer,
        payload: frame.payload().to_vec(),
    }
}

impl Plugin for Recorder {
    fn on_send(&self, frame: &Frame, peer: &SocketAddr) {
        self.sent.lock().unwrap().push(event(frame, peer));
    }

    fn on_receive(&self, frame: &Frame, peer: &SocketAddr) {
        self.received.lock().unwrap().push(event(frame, peer));
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Loopback address with an OS-assigned port.
pub fn loopback_any() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Default config; the engines only read the transport section here.
pub fn config() -> NetworkConfig {
    NetworkConfig::default()
}

pub const WAIT: Duration = Duration::from_secs(5);

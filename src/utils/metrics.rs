//! Observability and Metrics
//!
//! Per-engine counters for traffic and for the failures the receive loop
//! swallows (decode errors, socket errors, panicking plugins). Those failures
//! never reach an API caller, so these counters and the logs are the only
//! place they show up.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for one engine
#[derive(Debug)]
pub struct Metrics {
    /// Frames fully handed to the OS
    pub frames_sent: AtomicU64,
    /// Bytes of those frames, header included
    pub bytes_sent: AtomicU64,
    /// `send_packet` calls that failed
    pub send_errors: AtomicU64,
    /// Datagrams that decoded into frames
    pub frames_received: AtomicU64,
    /// Bytes of all datagrams read, valid or not
    pub bytes_received: AtomicU64,
    /// Datagrams dropped because they failed to decode
    pub decode_errors: AtomicU64,
    /// Socket errors seen by the receive loop
    pub receive_errors: AtomicU64,
    /// Plugin hooks that panicked
    pub plugin_panics: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            plugin_panics: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a frame sent
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a failed send
    pub fn send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram read from the socket
    pub fn datagram_received(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram that decoded
    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped datagram
    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a socket error in the receive loop
    pub fn receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record panicking plugin hooks
    pub fn plugin_panicked(&self, count: u64) {
        self.plugin_panics.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            plugin_panics: self.plugin_panics.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_sent = snapshot.frames_sent,
            bytes_sent = snapshot.bytes_sent,
            send_errors = snapshot.send_errors,
            frames_received = snapshot.frames_received,
            bytes_received = snapshot.bytes_received,
            decode_errors = snapshot.decode_errors,
            receive_errors = snapshot.receive_errors,
            plugin_panics = snapshot.plugin_panics,
            uptime_seconds = snapshot.uptime_seconds,
            "Engine metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub decode_errors: u64,
    pub receive_errors: u64,
    pub plugin_panics: u64,
    pub uptime_seconds: u64,
}

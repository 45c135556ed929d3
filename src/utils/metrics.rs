//! Observability and Metrics
//!
//! Counters for connection, handshake and dispatch activity.
//!
//! Uses atomic counters so a single [`Metrics`] value can be shared (via
//! `Arc`) between a session factory and every channel it opens.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Total transports opened
    pub connections_total: AtomicU64,
    /// Currently open transports
    pub connections_active: AtomicU64,
    /// Failed transport opens
    pub connection_errors: AtomicU64,
    /// Total handshake attempts
    pub handshakes_total: AtomicU64,
    /// Successful handshakes
    pub handshakes_success: AtomicU64,
    /// Failed handshakes
    pub handshakes_failed: AtomicU64,
    /// Redirects followed
    pub redirects_followed: AtomicU64,
    /// Queries dispatched
    pub queries_sent: AtomicU64,
    /// Control commands dispatched
    pub control_commands: AtomicU64,
    /// Continuation fragments written
    pub fragments_sent: AtomicU64,
    /// Total bytes written (payload only)
    pub bytes_sent: AtomicU64,
    /// Total lines read
    pub lines_received: AtomicU64,
    /// Total bytes read (payload only)
    pub bytes_received: AtomicU64,
    /// Error lines received from the server
    pub server_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            handshakes_total: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            redirects_followed: AtomicU64::new(0),
            queries_sent: AtomicU64::new(0),
            control_commands: AtomicU64::new(0),
            fragments_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn redirect_followed(&self) {
        self.redirects_followed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_sent(&self) {
        self.queries_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn control_sent(&self) {
        self.control_commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one physical write of `byte_count` payload bytes
    pub fn write_recorded(&self, byte_count: u64, continuation: bool) {
        if continuation {
            self.fragments_sent.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn line_received(&self, byte_count: u64) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn server_error(&self) {
        self.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            handshakes_success: self.handshakes_success.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            redirects_followed: self.redirects_followed.load(Ordering::Relaxed),
            queries_sent: self.queries_sent.load(Ordering::Relaxed),
            control_commands: self.control_commands.load(Ordering::Relaxed),
            fragments_sent: self.fragments_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            connection_errors = snapshot.connection_errors,
            handshakes_total = snapshot.handshakes_total,
            handshakes_success = snapshot.handshakes_success,
            handshakes_failed = snapshot.handshakes_failed,
            redirects_followed = snapshot.redirects_followed,
            queries_sent = snapshot.queries_sent,
            control_commands = snapshot.control_commands,
            fragments_sent = snapshot.fragments_sent,
            bytes_sent = snapshot.bytes_sent,
            lines_received = snapshot.lines_received,
            bytes_received = snapshot.bytes_received,
            server_errors = snapshot.server_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "MAPI metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connection_errors: u64,
    pub handshakes_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub redirects_followed: u64,
    pub queries_sent: u64,
    pub control_commands: u64,
    pub fragments_sent: u64,
    pub bytes_sent: u64,
    pub lines_received: u64,
    pub bytes_received: u64,
    pub server_errors: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_recording_counts_fragments() {
        let metrics = Metrics::new();
        metrics.write_recorded(1021, true);
        metrics.write_recorded(10, false);

        let snap = metrics.snapshot();
        assert_eq!(snap.fragments_sent, 1);
        assert_eq!(snap.bytes_sent, 1031);
    }

    #[test]
    fn test_connection_gauge() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.connection_established();
        metrics.connection_closed();

        let snap = metrics.snapshot();
        assert_eq!(snap.connections_total, 2);
        assert_eq!(snap.connections_active, 1);
    }

    #[test]
    fn test_snapshot_after_logging() {
        let metrics = Metrics::new();
        metrics.handshake_attempt();
        metrics.handshake_failed();
        metrics.log_metrics();

        let snap = metrics.snapshot();
        assert_eq!(snap.handshakes_total, 1);
        assert_eq!(snap.handshakes_failed, 1);
        assert_eq!(snap.handshakes_success, 0);
    }
}

//! Observability infrastructure for the connector.
//!
//! Provides metrics, timers, and the per-request log that is handed back
//! to the workflow engine alongside the command response.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::errors::ConnectorErrorKind;

/// Connector metrics collector.
#[derive(Debug, Default)]
pub struct ConnectorMetrics {
    /// Emails delivered.
    pub emails_sent: AtomicU64,
    /// Emails that failed at any stage.
    pub emails_failed: AtomicU64,
    /// Attachments resolved.
    pub attachments_resolved: AtomicU64,
    /// Attachments rejected.
    pub attachments_rejected: AtomicU64,
    /// Total attachment bytes handed to the transport.
    pub attachment_bytes: AtomicU64,
    /// Blocked path traversal attempts.
    pub traversal_attempts: AtomicU64,
}

impl ConnectorMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivered email.
    pub fn record_send_success(&self) {
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed email.
    pub fn record_send_failure(&self) {
        self.emails_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records resolved attachments.
    pub fn record_attachments(&self, count: usize, bytes: u64) {
        self.attachments_resolved.fetch_add(count as u64, Ordering::Relaxed);
        self.attachment_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a rejected attachment.
    pub fn record_attachment_rejected(&self, kind: ConnectorErrorKind) {
        self.attachments_rejected.fetch_add(1, Ordering::Relaxed);
        if kind == ConnectorErrorKind::PathTraversal {
            self.traversal_attempts.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            emails_failed: self.emails_failed.load(Ordering::Relaxed),
            attachments_resolved: self.attachments_resolved.load(Ordering::Relaxed),
            attachments_rejected: self.attachments_rejected.load(Ordering::Relaxed),
            attachment_bytes: self.attachment_bytes.load(Ordering::Relaxed),
            traversal_attempts: self.traversal_attempts.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.emails_sent.store(0, Ordering::Relaxed);
        self.emails_failed.store(0, Ordering::Relaxed);
        self.attachments_resolved.store(0, Ordering::Relaxed);
        self.attachments_rejected.store(0, Ordering::Relaxed);
        self.attachment_bytes.store(0, Ordering::Relaxed);
        self.traversal_attempts.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Emails delivered.
    pub emails_sent: u64,
    /// Emails that failed.
    pub emails_failed: u64,
    /// Attachments resolved.
    pub attachments_resolved: u64,
    /// Attachments rejected.
    pub attachments_rejected: u64,
    /// Total attachment bytes.
    pub attachment_bytes: u64,
    /// Blocked path traversal attempts.
    pub traversal_attempts: u64,
}

impl MetricsSnapshot {
    /// Returns the email success rate.
    pub fn success_rate(&self) -> f64 {
        let total = self.emails_sent + self.emails_failed;
        if total == 0 {
            1.0
        } else {
            self.emails_sent as f64 / total as f64
        }
    }
}

/// Timer for measuring operation duration.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    /// Creates and starts a new timer.
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stops the timer and returns the duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            timer = self.name,
            duration_ms = elapsed.as_millis() as u64,
            "Timer stopped"
        );

        elapsed
    }
}

/// Log lines collected for one request.
///
/// Lines end up in the command response; each is also emitted through
/// `tracing` with the request ID attached.
#[derive(Debug, Clone)]
pub struct SendLog {
    request_id: String,
    lines: Vec<String>,
}

impl SendLog {
    /// Creates a log with a fresh request ID.
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            lines: Vec::new(),
        }
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Appends a line.
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();

        #[cfg(feature = "tracing")]
        tracing::info!(request_id = %self.request_id, "{}", line);

        self.lines.push(line);
    }

    /// Returns the lines so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consumes the log, returning its lines.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl Default for SendLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = ConnectorMetrics::new();

        metrics.record_send_success();
        metrics.record_send_success();
        metrics.record_send_failure();
        metrics.record_attachments(2, 1024);
        metrics.record_attachment_rejected(ConnectorErrorKind::PathTraversal);
        metrics.record_attachment_rejected(ConnectorErrorKind::NotFound);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.emails_sent, 2);
        assert_eq!(snapshot.emails_failed, 1);
        assert_eq!(snapshot.attachments_resolved, 2);
        assert_eq!(snapshot.attachment_bytes, 1024);
        assert_eq!(snapshot.attachments_rejected, 2);
        assert_eq!(snapshot.traversal_attempts, 1);
        assert!((snapshot.success_rate() - 0.666).abs() < 0.01);

        metrics.reset();
        assert_eq!(metrics.snapshot().emails_sent, 0);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("test");
        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration >= Duration::from_millis(10));
    }

    #[test]
    fn test_send_log() {
        let mut log = SendLog::new();
        log.push("will send");
        log.push(String::from("did send"));

        assert_eq!(log.request_id().len(), 36);
        assert_eq!(log.lines(), ["will send", "did send"]);
        assert_eq!(log.into_lines().len(), 2);
    }
}

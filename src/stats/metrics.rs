//! Pipeline and fan-out counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the capture pipeline
///
/// Updated from the stdout pump and decode tasks; read by `GET /stats`.
#[derive(Debug, Default)]
pub struct PipelineStats {
    bytes_read: AtomicU64,
    lines: AtomicU64,
    records: AtomicU64,
    empty_lines: AtomicU64,
    malformed_lines: AtomicU64,
    incomplete_lines: AtomicU64,
    overflows: AtomicU64,
}

impl PipelineStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count bytes read from capture stdout
    pub fn add_bytes_read(&self, n: usize) {
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Count a complete line
    pub fn inc_lines(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a decoded record
    pub fn inc_records(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a whitespace-only line
    pub fn inc_empty(&self) {
        self.empty_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a line that did not decode
    pub fn inc_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a line that ended mid-value
    pub fn inc_incomplete(&self) {
        self.incomplete_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an oversized line
    pub fn inc_overflows(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy for reporting
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            empty_lines: self.empty_lines.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            incomplete_lines: self.incomplete_lines.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSnapshot {
    /// Bytes read from capture stdout
    pub bytes_read: u64,
    /// Complete lines produced by the reframer
    pub lines: u64,
    /// Lines decoded into records
    pub records: u64,
    /// Whitespace-only lines
    pub empty_lines: u64,
    /// Lines that were not valid JSON objects
    pub malformed_lines: u64,
    /// Malformed lines that ended mid-value
    pub incomplete_lines: u64,
    /// Oversized lines discarded by the reframer
    pub overflows: u64,
}

/// Counters for hub delivery
#[derive(Debug, Default)]
pub struct HubStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    total_connections: AtomicU64,
}

impl HubStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count events queued to subscribers
    pub fn add_delivered(&self, n: usize) {
        self.delivered.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Count events dropped on full queues
    pub fn add_dropped(&self, n: usize) {
        self.dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Count an accepted connection
    pub fn inc_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters; the hub fills in the live gauges
    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: 0,
            rooms: 0,
        }
    }
}

/// Point-in-time view of the hub
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubSnapshot {
    /// Events queued to subscribers
    pub delivered: u64,
    /// Events dropped because a subscriber queue was full
    pub dropped: u64,
    /// Connections ever accepted
    pub total_connections: u64,
    /// Currently connected subscribers
    pub active_connections: u64,
    /// Rooms with at least one member
    pub rooms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stats_new() {
        let stats = PipelineStats::new();
        assert_eq!(stats.snapshot(), PipelineSnapshot::default());
    }

    #[test]
    fn test_pipeline_stats_counts() {
        let stats = PipelineStats::new();
        stats.add_bytes_read(128);
        stats.add_bytes_read(64);
        stats.inc_lines();
        stats.inc_lines();
        stats.inc_records();
        stats.inc_malformed();
        stats.inc_incomplete();
        stats.inc_overflows();

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_read, 192);
        assert_eq!(snap.lines, 2);
        assert_eq!(snap.records, 1);
        assert_eq!(snap.empty_lines, 0);
        assert_eq!(snap.malformed_lines, 1);
        assert_eq!(snap.incomplete_lines, 1);
        assert_eq!(snap.overflows, 1);
    }

    #[test]
    fn test_hub_stats_counts() {
        let stats = HubStats::new();
        stats.add_delivered(3);
        stats.add_dropped(1);
        stats.inc_connections();

        let snap = stats.snapshot();
        assert_eq!(snap.delivered, 3);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.total_connections, 1);
    }
}

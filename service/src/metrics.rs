//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Lock-free metrics for the emulation engine

use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free engine metrics
///
/// All metrics are stored as atomics and can be accessed concurrently
/// without locks. Every update is mirrored to the `metrics` facade so an
/// installed recorder sees the same counts.
#[derive(Debug)]
pub struct EngineMetrics {
    // Session counts
    total_sessions: AtomicU64,
    active_sessions: AtomicU64,

    // Throughput
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,

    // Matching
    commands_matched: AtomicU64,
    commands_unmatched: AtomicU64,
    hook_errors: AtomicU64,
    feedback_pushes: AtomicU64,

    // Write failures that were swallowed
    write_errors: AtomicU64,

    started_at: Instant,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_sessions: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            commands_matched: AtomicU64::new(0),
            commands_unmatched: AtomicU64::new(0),
            hook_errors: AtomicU64::new(0),
            feedback_pushes: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Session tracking

    /// Record a session being opened
    pub fn session_opened(&self) {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        counter!("avemu.sessions.total").increment(1);
        gauge!("avemu.sessions.active").increment(1.0);
    }

    /// Record a session being closed
    pub fn session_closed(&self) {
        // Saturating so an aborted worker cannot underflow the gauge
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        gauge!("avemu.sessions.active").decrement(1.0);
    }

    /// Get the current number of open sessions
    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Get the total number of sessions accepted
    pub fn total_sessions(&self) -> u64 {
        self.total_sessions.load(Ordering::Relaxed)
    }

    // Throughput tracking

    /// Record bytes written to a peer
    pub fn bytes_sent(&self, count: usize) {
        self.bytes_sent.fetch_add(count as u64, Ordering::Relaxed);
        counter!("avemu.bytes.sent").increment(count as u64);
    }

    /// Record bytes read from a peer
    pub fn bytes_received(&self, count: usize) {
        self.bytes_received.fetch_add(count as u64, Ordering::Relaxed);
        counter!("avemu.bytes.received").increment(count as u64);
    }

    // Matching

    /// Record an inbound chunk answered from the command table
    pub fn command_matched(&self) {
        self.commands_matched.fetch_add(1, Ordering::Relaxed);
        counter!("avemu.commands.matched").increment(1);
    }

    /// Record an inbound chunk with no table entry
    pub fn command_unmatched(&self) {
        self.commands_unmatched.fetch_add(1, Ordering::Relaxed);
        counter!("avemu.commands.unmatched").increment(1);
    }

    /// Record a failed hook invocation
    pub fn hook_error(&self) {
        self.hook_errors.fetch_add(1, Ordering::Relaxed);
        counter!("avemu.hook.errors").increment(1);
    }

    /// Record a feedback push
    pub fn feedback_push(&self) {
        self.feedback_pushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write that failed and was dropped
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Snapshot

    /// Get a snapshot of all metrics
    ///
    /// Counters are read individually, so a snapshot taken under load is
    /// close to, but not exactly, a single point in time.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            commands_matched: self.commands_matched.load(Ordering::Relaxed),
            commands_unmatched: self.commands_unmatched.load(Ordering::Relaxed),
            hook_errors: self.hook_errors.load(Ordering::Relaxed),
            feedback_pushes: self.feedback_pushes.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// A snapshot of engine metrics at a point in time
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Sessions accepted since the engine was created
    pub total_sessions: u64,
    /// Sessions currently open
    pub active_sessions: u64,
    /// Total bytes written to peers
    pub bytes_sent: u64,
    /// Total bytes read from peers
    pub bytes_received: u64,
    /// Inbound chunks answered from the table
    pub commands_matched: u64,
    /// Inbound chunks with no table entry
    pub commands_unmatched: u64,
    /// Hook invocations that failed
    pub hook_errors: u64,
    /// Feedback pushes delivered to observers
    pub feedback_pushes: u64,
    /// Writes dropped after failing
    pub write_errors: u64,
    /// Time since the engine was created
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Share of inbound chunks that matched a table entry, in percent
    pub fn match_rate(&self) -> f64 {
        let total = self.commands_matched + self.commands_unmatched;
        if total == 0 {
            0.0
        } else {
            (self.commands_matched as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_tracking() {
        let metrics = EngineMetrics::new();

        metrics.session_opened();
        metrics.session_opened();
        assert_eq!(metrics.active_sessions(), 2);
        assert_eq!(metrics.total_sessions(), 2);

        metrics.session_closed();
        assert_eq!(metrics.active_sessions(), 1);
        assert_eq!(metrics.total_sessions(), 2);
    }

    #[test]
    fn test_session_closed_saturates() {
        let metrics = EngineMetrics::new();
        metrics.session_closed();
        assert_eq!(metrics.active_sessions(), 0);
    }

    #[test]
    fn test_snapshot() {
        let metrics = EngineMetrics::new();
        metrics.bytes_sent(4);
        metrics.bytes_received(10);
        metrics.command_matched();
        metrics.command_matched();
        metrics.command_matched();
        metrics.command_unmatched();
        metrics.hook_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bytes_sent, 4);
        assert_eq!(snapshot.bytes_received, 10);
        assert_eq!(snapshot.hook_errors, 1);
        assert_eq!(snapshot.match_rate(), 75.0);
    }

    #[test]
    fn test_match_rate_empty() {
        assert_eq!(MetricsSnapshot::default().match_rate(), 0.0);
    }
}

//! Feed statistics tracking
//!
//! Counts datagrams, bytes, dispatched messages and every class of per-message
//! fault, plus a rolling window of decode latencies.

use crate::decoder::DecodeError;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

const WINDOW_SIZE: usize = 10000;

#[derive(Debug, Clone, Copy)]
pub struct LatencyStats {
    pub min_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
    pub p50_ns: u64,
    pub p99_ns: u64,
}

/// Decode failures split by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeFailures {
    pub truncated: u64,
    pub out_of_bounds: u64,
    pub schema_mismatch: u64,
    pub invalid_utf8: u64,
}

impl DecodeFailures {
    pub fn total(&self) -> u64 {
        self.truncated + self.out_of_bounds + self.schema_mismatch + self.invalid_utf8
    }
}

#[derive(Debug, Clone)]
pub struct FeedStats {
    start_time: Option<Instant>,
    datagrams: u64,
    total_bytes: u64,
    dispatched: u64,

    decode_failures: DecodeFailures,
    oversized: u64,
    handler_failures: u64,
    receive_errors: u64,

    decode_latencies: VecDeque<u64>,

    total_gaps: u64,
    gap_events: u64,
}

impl FeedStats {
    pub fn new() -> Self {
        FeedStats {
            start_time: None,
            datagrams: 0,
            total_bytes: 0,
            dispatched: 0,
            decode_failures: DecodeFailures::default(),
            oversized: 0,
            handler_failures: 0,
            receive_errors: 0,
            decode_latencies: VecDeque::with_capacity(WINDOW_SIZE),
            total_gaps: 0,
            gap_events: 0,
        }
    }

    /// Record a datagram received
    pub fn record_datagram(&mut self, size: usize) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
        self.datagrams += 1;
        self.total_bytes += size as u64;
    }

    pub fn record_dispatch(&mut self) {
        self.dispatched += 1;
    }

    pub fn record_decode_failure(&mut self, error: &DecodeError) {
        let counter = match error {
            DecodeError::Truncated { .. } => &mut self.decode_failures.truncated,
            DecodeError::OutOfBounds { .. } => &mut self.decode_failures.out_of_bounds,
            DecodeError::SchemaMismatch { .. } => &mut self.decode_failures.schema_mismatch,
            DecodeError::InvalidUtf8 { .. } => &mut self.decode_failures.invalid_utf8,
        };
        *counter += 1;
    }

    pub fn record_oversized(&mut self) {
        self.oversized += 1;
    }

    pub fn record_handler_failure(&mut self) {
        self.handler_failures += 1;
    }

    pub fn record_receive_error(&mut self) {
        self.receive_errors += 1;
    }

    /// Record decode latency in nanoseconds
    pub fn record_decode_latency(&mut self, nanos: u64) {
        if self.decode_latencies.len() >= WINDOW_SIZE {
            self.decode_latencies.pop_front();
        }
        self.decode_latencies.push_back(nanos);
    }

    /// Record a sequence gap of `gap_size` missing ids
    pub fn record_gap(&mut self, gap_size: u32) {
        self.total_gaps += u64::from(gap_size);
        self.gap_events += 1;
    }

    /// Get dispatched messages per second
    pub fn messages_per_sec(&self) -> f64 {
        match self.start_time {
            None => 0.0,
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.dispatched as f64 / elapsed
                } else {
                    0.0
                }
            }
        }
    }

    /// Get decode latency statistics
    pub fn decode_latency_stats(&self) -> Option<LatencyStats> {
        if self.decode_latencies.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.decode_latencies.iter().copied().collect();
        sorted.sort_unstable();

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let mean = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        let p50 = sorted[sorted.len() / 2];
        let p99 = sorted[(sorted.len() * 99) / 100];

        Some(LatencyStats {
            min_ns: min,
            max_ns: max,
            mean_ns: mean,
            p50_ns: p50,
            p99_ns: p99,
        })
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| st.elapsed())
    }

    pub fn datagrams(&self) -> u64 {
        self.datagrams
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Messages successfully decoded and handed to the handler
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn decode_failures(&self) -> DecodeFailures {
        self.decode_failures
    }

    pub fn oversized(&self) -> u64 {
        self.oversized
    }

    pub fn handler_failures(&self) -> u64 {
        self.handler_failures
    }

    pub fn receive_errors(&self) -> u64 {
        self.receive_errors
    }

    pub fn total_gaps(&self) -> u64 {
        self.total_gaps
    }

    pub fn gap_events(&self) -> u64 {
        self.gap_events
    }

    pub fn reset(&mut self) {
        *self = FeedStats::new();
    }

    /// Emit a summary at info level
    pub fn log_summary(&self) {
        info!(
            datagrams = self.datagrams,
            bytes = self.total_bytes,
            dispatched = self.dispatched,
            elapsed = ?self.elapsed(),
            msgs_per_sec = self.messages_per_sec(),
            "feed statistics"
        );
        info!(
            truncated = self.decode_failures.truncated,
            out_of_bounds = self.decode_failures.out_of_bounds,
            schema_mismatch = self.decode_failures.schema_mismatch,
            invalid_utf8 = self.decode_failures.invalid_utf8,
            oversized = self.oversized,
            handler_failures = self.handler_failures,
            receive_errors = self.receive_errors,
            "feed faults"
        );

        if let Some(stats) = self.decode_latency_stats() {
            info!(
                min_ns = stats.min_ns,
                max_ns = stats.max_ns,
                mean_ns = stats.mean_ns,
                p50_ns = stats.p50_ns,
                p99_ns = stats.p99_ns,
                "decode latency"
            );
        }

        info!(
            missing = self.total_gaps,
            events = self.gap_events,
            "sequence gaps"
        );
    }
}

impl Default for FeedStats {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use serde::Serialize;

/// Why a well-formed line was left out of the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    /// Host matched an ignored IP / range
    IpRange,
    /// User agent classified as a crawler
    Crawler,
    /// Referring site matched an ignore pattern
    ReferrerSite,
}

/// Line tallies (hottest path - updated per log line)
#[derive(Debug, Default)]
pub struct LineMetrics {
    pub processed: AtomicU64,
    pub invalid: AtomicU64,
}

/// Exclusion counters by reason
#[derive(Debug, Default)]
pub struct ExclusionMetrics {
    pub ip: AtomicU64,
    pub crawler: AtomicU64,
    pub referrer: AtomicU64,
}

/// Run-wide counters for one log source.
///
/// # Concurrency
///
/// The pipeline is the only writer. A progress reporter on another thread
/// may read at any time through `snapshot()`, so every counter is an atomic
/// and nothing here needs a lock.
///
/// # Memory Ordering
///
/// All operations use `Ordering::Relaxed`. The counters are independent
/// tallies; a reader may see `processed` one line ahead of `invalid`.
#[derive(Debug, Default)]
pub struct RunCounters {
    pub lines: LineMetrics,
    pub excluded: ExclusionMetrics,

    /// Sum of response sizes of classified lines
    pub total_bytes: AtomicU64,

    /// Reading from stdin rather than a file
    pub streaming: AtomicBool,

    /// A `%b` field has been seen
    pub has_bandwidth: AtomicBool,

    /// A `%T` / `%D` field has been seen
    pub has_serve_time: AtomicBool,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a line that reached extraction.
    #[inline]
    pub fn record_processed(&self) {
        self.lines.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_invalid(&self) {
        self.lines.invalid.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_excluded(&self, reason: Exclusion) {
        match reason {
            Exclusion::IpRange => self.excluded.ip.fetch_add(1, Ordering::Relaxed),
            Exclusion::Crawler => self.excluded.crawler.fetch_add(1, Ordering::Relaxed),
            Exclusion::ReferrerSite => self.excluded.referrer.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Saturates at `u64::MAX` rather than wrapping.
    #[inline]
    pub fn add_bytes(&self, bytes: u64) {
        let _ = self
            .total_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_add(bytes))
            });
    }

    /// Zero the line and byte tallies before a new pass over a source.
    pub fn reset(&self) {
        self.lines.processed.store(0, Ordering::Relaxed);
        self.lines.invalid.store(0, Ordering::Relaxed);
        self.total_bytes.store(0, Ordering::Relaxed);
    }

    pub fn set_streaming(&self, streaming: bool) {
        self.streaming.store(streaming, Ordering::Relaxed);
    }

    pub fn mark_bandwidth(&self) {
        self.has_bandwidth.store(true, Ordering::Relaxed);
    }

    pub fn mark_serve_time(&self) {
        self.has_serve_time.store(true, Ordering::Relaxed);
    }

    /// Read all counters.
    ///
    /// Individual reads are atomic; the snapshot as a whole is not.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            processed: self.lines.processed.load(Ordering::Relaxed),
            invalid: self.lines.invalid.load(Ordering::Relaxed),
            excluded_ip: self.excluded.ip.load(Ordering::Relaxed),
            excluded_crawler: self.excluded.crawler.load(Ordering::Relaxed),
            excluded_referrer: self.excluded.referrer.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            is_streaming: self.streaming.load(Ordering::Relaxed),
            has_bandwidth: self.has_bandwidth.load(Ordering::Relaxed),
            has_serve_time: self.has_serve_time.load(Ordering::Relaxed),
        }
    }
}

/// A read-only copy of the run counters, for summaries and progress output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    pub processed: u64,
    pub invalid: u64,
    pub excluded_ip: u64,
    pub excluded_crawler: u64,
    pub excluded_referrer: u64,
    pub total_bytes: u64,
    pub is_streaming: bool,
    pub has_bandwidth: bool,
    pub has_serve_time: bool,
}

impl RunSnapshot {
    /// Nothing was processed, or every processed line was invalid.
    pub fn format_likely_invalid(&self) -> bool {
        self.processed == 0 || self.processed == self.invalid
    }

    pub fn valid(&self) -> u64 {
        self.processed.saturating_sub(self.invalid)
    }
}

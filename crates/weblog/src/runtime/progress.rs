//! Progress — background thread that logs the processed-line counter
//! while a run is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::parser::RunCounters;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

pub struct ProgressReporter {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl ProgressReporter {
    /// Report every `interval` until stopped. Nothing is logged while the
    /// counter has not moved.
    pub fn spawn(counters: Arc<RunCounters>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let mut reports = 0u64;
            let mut last = 0u64;
            while !flag.load(Ordering::Relaxed) {
                thread::park_timeout(interval);
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                let snap = counters.snapshot();
                if snap.processed != last {
                    last = snap.processed;
                    reports += 1;
                    info!(
                        "Parsing... {} lines ({} invalid)",
                        snap.processed, snap.invalid
                    );
                }
            }
            reports
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the reporter and wait for it. Returns how many progress lines
    /// it logged.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => {
                handle.thread().unpark();
                handle.join().unwrap_or(0)
            }
            None => 0,
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

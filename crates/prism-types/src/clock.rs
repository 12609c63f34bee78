// SPDX-License-Identifier: Apache-2.0
//! Time seam for activation-delay logic.
//!
//! The dispatcher never reads ambient time directly; it is handed a [`Clock`]
//! at construction so delay boundaries are deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix-seconds time source.
pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now_unix(&self) -> u64;
}

/// Wall-clock [`Clock`] for production embedding.
///
/// Falls back to 0 if the system clock reports a pre-epoch time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Hand-advanced [`Clock`] for tests.
///
/// Clones share the underlying instant, so a test can keep a handle while the
/// dispatcher owns another.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock pinned at `start` seconds.
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Advance the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Pin the clock to an absolute instant.
    pub fn set(&self, unix: u64) {
        self.now.store(unix, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_shared_advance() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();
        handle.advance(42);
        assert_eq!(clock.now_unix(), 142);
        handle.set(7);
        assert_eq!(clock.now_unix(), 7);
    }
}

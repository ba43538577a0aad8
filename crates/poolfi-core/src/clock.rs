//! Clock capability
//!
//! Domain code never reads wall time directly; it receives a `Clock` at
//! construction. Tests drive accrual with `ManualClock`.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" as Unix seconds.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Settable clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clk = ManualClock::new(1_700_000_000);
        assert_eq!(clk.now_unix(), 1_700_000_000);
        clk.advance(3600);
        assert_eq!(clk.now_unix(), 1_700_003_600);
        clk.set(1_800_000_000);
        assert_eq!(clk.now_unix(), 1_800_000_000);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clk = SystemClock;
        let a = clk.now_unix();
        let b = clk.now_unix();
        assert!(b >= a);
    }
}

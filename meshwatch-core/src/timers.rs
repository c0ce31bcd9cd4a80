//! Per-phase diagnostic timing for the aggregation loop.
//!
//! Grounded on the upstream watcher's `dbg.Timer(...)` wrapping of each
//! reconciliation phase: every named phase of an iteration records how long
//! it took, and the debug HTTP surface can report the running totals without
//! the aggregation loop itself taking any lock beyond a brief std mutex.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
pub struct TimerStats {
    pub count: u64,
    pub total: Duration,
    pub last: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct IterationTimers(Arc<Mutex<BTreeMap<&'static str, TimerStats>>>);

impl IterationTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing `name`. The elapsed duration is recorded when the
    /// returned guard drops, so callers just scope a block around the work.
    pub fn start(&self, name: &'static str) -> TimerGuard {
        TimerGuard { timers: self.0.clone(), name, started: Instant::now() }
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, TimerStats> {
        self.0.lock().expect("timer mutex poisoned").clone()
    }
}

pub struct TimerGuard {
    timers: Arc<Mutex<BTreeMap<&'static str, TimerStats>>>,
    name: &'static str,
    started: Instant,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let mut timers = self.timers.lock().expect("timer mutex poisoned");
        let entry = timers.entry(self.name).or_default();
        entry.count += 1;
        entry.total += elapsed;
        entry.last = elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_count_and_last_duration() {
        let timers = IterationTimers::new();
        {
            let _guard = timers.start("phase_a");
        }
        {
            let _guard = timers.start("phase_a");
        }
        let snapshot = timers.snapshot();
        assert_eq!(snapshot.get("phase_a").unwrap().count, 2);
    }
}
